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

//! The single provider-error translator.
//!
//! Upstream credentials and tracebacks never reach tenants: status
//! codes that are actionable for the caller (401/403/429 and the
//! remaining 4xx family) are preserved with a genericized message,
//! everything else collapses to a 502.

use fleet_types::PlatformError;

/// Map a transport-level failure (connect, timeout, body read).
pub fn map_transport_error(err: &reqwest::Error) -> PlatformError {
	if err.is_timeout() {
		tracing::warn!(%err, "upstream timeout");
	} else {
		tracing::warn!(%err, "upstream transport failure");
	}
	PlatformError::UpstreamUnreachable
}

/// Map a non-success upstream HTTP status.
pub fn map_upstream_status(status: u16) -> PlatformError {
	match status {
		401 => PlatformError::Upstream { status: 401, message: "upstream rejected credentials".into() },
		403 => PlatformError::Upstream { status: 403, message: "upstream denied access".into() },
		429 => PlatformError::Upstream { status: 429, message: "upstream rate limited".into() },
		400..=499 => PlatformError::Upstream {
			status,
			message: "upstream rejected the request".into(),
		},
		_ => PlatformError::Upstream { status: 502, message: "upstream failure".into() },
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn actionable_statuses_are_preserved() {
		for status in [401u16, 403, 429, 422] {
			match map_upstream_status(status) {
				PlatformError::Upstream { status: mapped, .. } => assert_eq!(mapped, status),
				other => panic!("unexpected mapping: {other}"),
			}
		}
	}

	#[test]
	fn server_errors_collapse_to_502() {
		match map_upstream_status(500) {
			PlatformError::Upstream { status, .. } => assert_eq!(status, 502),
			other => panic!("unexpected mapping: {other}"),
		}
	}

	#[test]
	fn messages_never_echo_upstream_bodies() {
		let err = map_upstream_status(401);
		assert!(!err.to_string().contains("sk-"));
	}
}
