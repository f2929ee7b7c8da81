// Copyright 2024 WOPR Fleet (wopr.network).
//
// This file is part of the WOPR fleet platform.
// WOPR Fleet is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version (see http://www.gnu.org/licenses).
// WOPR Fleet is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

//! The platform error enum.
//!
//! Every fallible operation across the services returns this type.
//! Each variant carries its HTTP status and wire `type`/`code` pair so
//! handlers never map errors ad hoc; the single [`IntoResponse`] impl
//! is the only place a `PlatformError` becomes bytes on the wire.

use axum::{
	http::{header, StatusCode},
	response::{IntoResponse, Response},
	Json,
};
use serde_json::json;

use crate::Capability;

/// Pointer handed to tenants alongside billing denials.
pub const BUY_URL: &str = "/dashboard/credits";

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
	#[error("invalid request: {0}")]
	InvalidRequest(String),

	#[error("missing bearer token")]
	AuthMissing,

	#[error("authentication failed")]
	AuthFailed,

	#[error("forbidden: {0}")]
	Forbidden(String),

	#[error("insufficient credits")]
	InsufficientCredits,

	#[error("spend limit exceeded")]
	SpendLimitExceeded,

	#[error("bot not found")]
	BotNotFound,

	#[error("{0} not found")]
	NotFound(String),

	#[error("conflict: {0}")]
	Conflict(String),

	#[error("snapshot quota exceeded ({current}/{max} for tier {tier})")]
	SnapshotQuotaExceeded { current: u32, max: u32, tier: String },

	#[error("payment method does not belong to tenant")]
	PaymentMethodOwnership,

	#[error("no provider available for {0}")]
	NoProviderAvailable(Capability),

	#[error("service not configured: {0}")]
	ServiceUnavailable(String),

	#[error("upstream unreachable")]
	UpstreamUnreachable,

	#[error("upstream returned {status}")]
	Upstream { status: u16, message: String },

	#[error("webhook rejected: {0}")]
	WebhookRejected(String),

	#[error("too many signature failures, retry after {retry_after_secs}s")]
	IpPenalty { retry_after_secs: u64 },

	#[error("internal error: {0}")]
	Internal(String),
}

impl PlatformError {
	pub fn status(&self) -> StatusCode {
		match self {
			PlatformError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
			PlatformError::AuthMissing | PlatformError::AuthFailed => StatusCode::UNAUTHORIZED,
			PlatformError::Forbidden(_)
			| PlatformError::SnapshotQuotaExceeded { .. }
			| PlatformError::PaymentMethodOwnership => StatusCode::FORBIDDEN,
			PlatformError::InsufficientCredits => StatusCode::PAYMENT_REQUIRED,
			PlatformError::SpendLimitExceeded | PlatformError::IpPenalty { .. } => {
				StatusCode::TOO_MANY_REQUESTS
			},
			PlatformError::BotNotFound | PlatformError::NotFound(_) => StatusCode::NOT_FOUND,
			PlatformError::Conflict(_) => StatusCode::CONFLICT,
			PlatformError::NoProviderAvailable(_) | PlatformError::ServiceUnavailable(_) => {
				StatusCode::SERVICE_UNAVAILABLE
			},
			PlatformError::UpstreamUnreachable => StatusCode::BAD_GATEWAY,
			PlatformError::Upstream { status, .. } => {
				StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
			},
			PlatformError::WebhookRejected(_) => StatusCode::BAD_REQUEST,
			PlatformError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Wire error family, one of the canonical `type` strings.
	pub fn kind(&self) -> &'static str {
		match self {
			PlatformError::InvalidRequest(_) | PlatformError::BotNotFound
			| PlatformError::NotFound(_)
			| PlatformError::Conflict(_) => "invalid_request_error",
			PlatformError::AuthMissing
			| PlatformError::AuthFailed
			| PlatformError::Forbidden(_)
			| PlatformError::PaymentMethodOwnership => "auth_error",
			PlatformError::InsufficientCredits | PlatformError::SpendLimitExceeded => {
				"billing_error"
			},
			PlatformError::SnapshotQuotaExceeded { .. } => "quota_error",
			PlatformError::WebhookRejected(_) | PlatformError::IpPenalty { .. } => "webhook_error",
			PlatformError::NoProviderAvailable(_)
			| PlatformError::ServiceUnavailable(_)
			| PlatformError::UpstreamUnreachable
			| PlatformError::Upstream { .. }
			| PlatformError::Internal(_) => "server_error",
		}
	}

	/// Stable machine-readable code, where one exists.
	pub fn code(&self) -> Option<&'static str> {
		match self {
			PlatformError::InsufficientCredits => Some("insufficient_credits"),
			PlatformError::SpendLimitExceeded => Some("spend_limit_exceeded"),
			PlatformError::BotNotFound => Some("bot_not_found"),
			PlatformError::SnapshotQuotaExceeded { .. } => Some("snapshot_quota_exceeded"),
			PlatformError::NoProviderAvailable(_) => Some("no_provider_available"),
			PlatformError::ServiceUnavailable(_) => Some("service_unavailable"),
			PlatformError::UpstreamUnreachable => Some("upstream_unreachable"),
			_ => None,
		}
	}
}

impl IntoResponse for PlatformError {
	fn into_response(self) -> Response {
		let status = self.status();

		let mut error = json!({
			"type": self.kind(),
			"message": self.to_string(),
		});
		if let Some(code) = self.code() {
			error["code"] = json!(code);
		}
		if let PlatformError::SnapshotQuotaExceeded { current, max, tier } = &self {
			error["current"] = json!(current);
			error["max"] = json!(max);
			error["tier"] = json!(tier);
		}

		let mut body = json!({ "error": error });
		if matches!(
			self,
			PlatformError::InsufficientCredits | PlatformError::SpendLimitExceeded
		) {
			body["buyUrl"] = json!(BUY_URL);
		}

		let mut response = (status, Json(body)).into_response();
		if let PlatformError::IpPenalty { retry_after_secs } = self {
			if let Ok(value) = retry_after_secs.to_string().parse() {
				response.headers_mut().insert(header::RETRY_AFTER, value);
			}
		}
		response
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn billing_errors_carry_statuses_and_codes() {
		assert_eq!(PlatformError::InsufficientCredits.status(), StatusCode::PAYMENT_REQUIRED);
		assert_eq!(PlatformError::InsufficientCredits.code(), Some("insufficient_credits"));
		assert_eq!(PlatformError::SpendLimitExceeded.status(), StatusCode::TOO_MANY_REQUESTS);
		assert_eq!(PlatformError::SpendLimitExceeded.kind(), "billing_error");
	}

	#[test]
	fn upstream_status_is_preserved_when_actionable() {
		let err = PlatformError::Upstream { status: 429, message: "rate limited".into() };
		assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
		assert_eq!(err.kind(), "server_error");
	}

	#[test]
	fn bot_not_found_maps_to_404() {
		assert_eq!(PlatformError::BotNotFound.status(), StatusCode::NOT_FOUND);
	}
}
