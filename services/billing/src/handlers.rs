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

use std::sync::Arc;

use axum::{
	body::Bytes,
	extract::{Path, Query, State},
	http::{HeaderMap, StatusCode},
	response::{IntoResponse, Response},
	Extension, Json,
};
use chrono::Utc;
use fleet_gateway::AuthContext;
use fleet_primitives::{Cents, TenantId, TokenScope};
use fleet_types::{metering::UsageFilter, Capability, PlatformError};
use serde::Deserialize;

use crate::BillingDeps;

const SIGNATURE_HEADER: &str = "stripe-signature";
const WEBHOOK_SOURCE: &str = "stripe";

fn client_ip(headers: &HeaderMap) -> String {
	headers
		.get("x-forwarded-for")
		.and_then(|v| v.to_str().ok())
		.and_then(|v| v.split(',').next())
		.map(|v| v.trim().to_owned())
		.unwrap_or_else(|| "unknown".to_owned())
}

/// Payment-processor webhook ingest. The raw body is captured before
/// any JSON parsing so the HMAC sees exactly what was signed.
pub async fn webhook(
	State(deps): State<Arc<BillingDeps>>,
	headers: HeaderMap,
	body: Bytes,
) -> Result<Response, PlatformError> {
	let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
	let ip = client_ip(&headers);

	let receipt = deps.ingestor.handle(WEBHOOK_SOURCE, &ip, signature, &body).await?;
	Ok(Json(receipt).into_response())
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
	#[serde(alias = "amountCents")]
	pub amount_cents: i64,
}

pub async fn create_checkout(
	State(deps): State<Arc<BillingDeps>>,
	Extension(auth): Extension<AuthContext>,
	Json(request): Json<CheckoutRequest>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Write)?;
	if request.amount_cents <= 0 {
		return Err(PlatformError::InvalidRequest("amount must be positive".into()));
	}

	let customer = deps.directory.customer_id(&auth.tenant);
	let session = deps
		.processor
		.create_checkout(&auth.tenant, Cents::new(request.amount_cents), customer.as_deref())
		.await?;
	Ok(Json(session).into_response())
}

pub async fn create_portal(
	State(deps): State<Arc<BillingDeps>>,
	Extension(auth): Extension<AuthContext>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Write)?;
	let customer = deps
		.directory
		.customer_id(&auth.tenant)
		.ok_or_else(|| PlatformError::InvalidRequest("tenant has no billing customer".into()))?;
	let session = deps.processor.create_portal(&customer).await?;
	Ok(Json(session).into_response())
}

pub async fn create_setup_intent(
	State(deps): State<Arc<BillingDeps>>,
	Extension(auth): Extension<AuthContext>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Write)?;
	let customer = deps
		.directory
		.customer_id(&auth.tenant)
		.ok_or_else(|| PlatformError::InvalidRequest("tenant has no billing customer".into()))?;
	let intent = deps.processor.create_setup_intent(&customer).await?;
	Ok(Json(intent).into_response())
}

#[derive(Debug, Deserialize)]
pub struct DetachQuery {
	#[serde(default)]
	pub tenant: Option<String>,
}

pub async fn detach_payment_method(
	State(deps): State<Arc<BillingDeps>>,
	Extension(auth): Extension<AuthContext>,
	Path(method_id): Path<String>,
	Query(query): Query<DetachQuery>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Write)?;

	// `?tenant=X` lets platform admins act on behalf of a tenant;
	// everyone else is pinned to their own.
	let tenant = match query.tenant {
		Some(t) if TenantId::from(t.clone()) != auth.tenant => {
			auth.require(TokenScope::Admin)?;
			TenantId::from(t)
		},
		_ => auth.tenant.clone(),
	};

	let owner = deps
		.directory
		.customer_id(&tenant)
		.ok_or(PlatformError::PaymentMethodOwnership)?;
	deps.processor.detach_payment_method(&method_id, &owner).await?;
	Ok(StatusCode::NO_CONTENT.into_response())
}

/// Pin non-admin callers to their own tenant in usage queries.
/// Admins may query any tenant, or all of them by omitting the
/// filter.
fn scoped_filter(auth: &AuthContext, mut filter: UsageFilter) -> UsageFilter {
	if !auth.scope.allows(TokenScope::Admin) {
		filter.tenant = Some(auth.tenant.clone());
	}
	filter
}

pub async fn usage(
	State(deps): State<Arc<BillingDeps>>,
	Extension(auth): Extension<AuthContext>,
	Query(filter): Query<UsageFilter>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Read)?;
	let filter = scoped_filter(&auth, filter);
	Ok(Json(deps.usage.usage_report(&filter)).into_response())
}

pub async fn usage_summary(
	State(deps): State<Arc<BillingDeps>>,
	Extension(auth): Extension<AuthContext>,
	Query(filter): Query<UsageFilter>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Read)?;
	let filter = scoped_filter(&auth, filter);
	let tenant = filter.tenant.unwrap_or_else(|| auth.tenant.clone());
	Ok(Json(deps.usage.summary(&tenant, Utc::now())).into_response())
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
	#[serde(default)]
	pub tenant: Option<String>,
	#[serde(default)]
	pub capability: Option<Capability>,
	#[serde(default)]
	pub provider: Option<String>,
	#[serde(default)]
	pub limit: Option<usize>,
}

pub async fn usage_history(
	State(deps): State<Arc<BillingDeps>>,
	Extension(auth): Extension<AuthContext>,
	Query(query): Query<HistoryQuery>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Read)?;

	let filter = scoped_filter(
		&auth,
		UsageFilter {
			tenant: query.tenant.map(TenantId::from),
			capability: query.capability,
			provider: query.provider,
			start_date: None,
			end_date: None,
		},
	);
	let limit = query.limit.unwrap_or(100).min(1000);
	Ok(Json(deps.usage.history(&filter, limit)).into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateCodeRequest {
	#[serde(default)]
	pub code: Option<String>,
}

pub async fn create_affiliate_code(
	State(deps): State<Arc<BillingDeps>>,
	Extension(auth): Extension<AuthContext>,
	body: Option<Json<CreateCodeRequest>>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Write)?;
	let requested = body.and_then(|Json(b)| b.code);
	let code = deps.affiliates.create_code(&auth.tenant, requested)?;
	Ok((StatusCode::CREATED, Json(serde_json::json!({ "code": code }))).into_response())
}

pub async fn affiliate_stats(
	State(deps): State<Arc<BillingDeps>>,
	Extension(auth): Extension<AuthContext>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Read)?;
	let stats = deps
		.affiliates
		.stats(&auth.tenant)
		.ok_or_else(|| PlatformError::NotFound("affiliate code".into()))?;
	Ok(Json(stats).into_response())
}

#[derive(Debug, Deserialize)]
pub struct ReferralRequest {
	pub code: String,
}

pub async fn record_referral(
	State(deps): State<Arc<BillingDeps>>,
	Extension(auth): Extension<AuthContext>,
	Json(request): Json<ReferralRequest>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Write)?;
	deps.affiliates.record_referral(&request.code, &auth.tenant)?;
	Ok(StatusCode::NO_CONTENT.into_response())
}
