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

//! Telephony: outbound calls, provider callbacks and phone-number
//! lifecycle.
//!
//! Billing model: with `WEBHOOK_BASE_URL` configured, an outbound
//! call is billed from the provider's status callback once the call
//! connected (`duration > 0`). Without it the platform cannot see the
//! callback, so the call flat-bills one minute at submission — this
//! over-charges failed connections and is the documented trade-off.

use std::{
	collections::HashMap,
	sync::{Arc, Mutex},
};

use axum::{
	body::Bytes,
	extract::{Path, State},
	http::{header, HeaderMap, StatusCode},
	response::{IntoResponse, Response},
	Extension, Json,
};
use chrono::{Duration, Utc};
use fleet_primitives::{CostCents, TenantId, TokenScope};
use fleet_types::{Capability, PlatformError};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
	error::{map_transport_error, map_upstream_status},
	AuthContext, GatewayDeps, UPSTREAM_TIMEOUT,
};

const SIGNATURE_HEADER: &str = "x-twilio-signature";

/// A number the platform rents for a tenant.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionedNumber {
	pub id: Uuid,
	pub tenant: TenantId,
	pub number: String,
	/// Provider-side sid, also the recurring-billing reference.
	pub sid: String,
	pub monthly_cost: CostCents,
}

#[derive(Default)]
pub struct NumberStore {
	numbers: Mutex<Vec<ProvisionedNumber>>,
}

impl NumberStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&self, number: ProvisionedNumber) {
		self.numbers.lock().expect("numbers lock poisoned").push(number);
	}

	pub fn list(&self, tenant: &TenantId) -> Vec<ProvisionedNumber> {
		self.numbers
			.lock()
			.expect("numbers lock poisoned")
			.iter()
			.filter(|n| &n.tenant == tenant)
			.cloned()
			.collect()
	}

	pub fn remove(&self, tenant: &TenantId, id: Uuid) -> Option<ProvisionedNumber> {
		let mut numbers = self.numbers.lock().expect("numbers lock poisoned");
		let index = numbers.iter().position(|n| n.id == id && &n.tenant == tenant)?;
		Some(numbers.remove(index))
	}

	/// Which tenant owns an E.164 number, for inbound webhooks.
	pub fn tenant_of(&self, number: &str) -> Option<TenantId> {
		self.numbers
			.lock()
			.expect("numbers lock poisoned")
			.iter()
			.find(|n| n.number == number)
			.map(|n| n.tenant.clone())
	}
}

/// Verify the HMAC-SHA256 signature the platform configures on its
/// telephony callbacks.
pub(crate) fn verify_inbound_signature(
	deps: &GatewayDeps,
	headers: &HeaderMap,
	body: &[u8],
) -> Result<(), PlatformError> {
	let token = deps
		.config
		.twilio_token
		.as_deref()
		.ok_or_else(|| PlatformError::ServiceUnavailable("twilio".into()))?;

	let signature = headers
		.get(SIGNATURE_HEADER)
		.and_then(|v| v.to_str().ok())
		.ok_or_else(|| PlatformError::WebhookRejected("missing signature".into()))?;

	let mut mac = Hmac::<Sha256>::new_from_slice(token.as_bytes())
		.map_err(|_| PlatformError::Internal("hmac key".into()))?;
	mac.update(body);
	let expected = hex::encode(mac.finalize().into_bytes());

	if expected == signature {
		Ok(())
	} else {
		Err(PlatformError::WebhookRejected("bad signature".into()))
	}
}

pub(crate) fn parse_callback_form(body: &[u8]) -> HashMap<String, String> {
	url::form_urlencoded::parse(body)
		.map(|(k, v)| (k.into_owned(), v.into_owned()))
		.collect()
}

#[derive(Debug, Deserialize)]
pub struct OutboundCallRequest {
	pub to: String,
	pub from: String,
	#[serde(default)]
	pub twiml: Option<String>,
}

pub async fn outbound(
	State(deps): State<Arc<GatewayDeps>>,
	Extension(auth): Extension<AuthContext>,
	Json(request): Json<OutboundCallRequest>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Write)?;
	let tenant = auth.tenant.clone();
	deps.pre_flight(&tenant).await?;

	let (sid, token) = twilio_credentials(&deps)?;

	let twiml_url = match (&request.twiml, &deps.config.webhook_base_url) {
		(Some(twiml), _) => twiml.clone(),
		(None, Some(base)) => format!("{base}/v1/phone/twiml/hangup"),
		(None, None) => "https://demo.twilio.com/docs/voice.xml".to_owned(),
	};

	let mut params = vec![
		("To", request.to.clone()),
		("From", request.from.clone()),
		("Url", twiml_url),
	];
	if let Some(base) = &deps.config.webhook_base_url {
		params.push((
			"StatusCallback",
			format!("{base}/v1/phone/outbound/status/{tenant}"),
		));
	}

	let response = deps
		.http
		.post(format!(
			"{}/2010-04-01/Accounts/{sid}/Calls.json",
			deps.config.twilio_base
		))
		.basic_auth(sid, Some(token))
		.timeout(UPSTREAM_TIMEOUT)
		.form(&params)
		.send()
		.await
		.map_err(|e| map_transport_error(&e))?;

	let status = response.status();
	if !status.is_success() {
		return Err(map_upstream_status(status.as_u16()));
	}
	let body: serde_json::Value = response.json().await.map_err(|e| map_transport_error(&e))?;

	if deps.config.webhook_base_url.is_none() {
		// No callback will ever arrive: flat-bill one minute now.
		let unit = deps.catalog.rate(Capability::PhoneOutbound, "twilio").map(|r| &r.unit);
		let cost = unit.map(|u| u.cost_for_minutes(1.0)).unwrap_or(CostCents::ZERO);
		deps.settle(&tenant, Capability::PhoneOutbound, "twilio", cost, Some((1.0, "minutes")))
			.await;
	}

	Ok((StatusCode::OK, Json(body)).into_response())
}

/// Provider status callback for outbound calls: the deferred billing
/// leg. Only connected calls (`duration > 0`) are metered.
pub async fn outbound_status(
	State(deps): State<Arc<GatewayDeps>>,
	Path(tenant_id): Path<String>,
	headers: HeaderMap,
	body: Bytes,
) -> Result<Response, PlatformError> {
	verify_inbound_signature(&deps, &headers, &body)?;

	let form = parse_callback_form(&body);
	let tenant = TenantId::from(tenant_id);

	let call_status = form.get("CallStatus").map(String::as_str).unwrap_or("");
	let duration_secs: f64 = form
		.get("CallDuration")
		.and_then(|d| d.parse().ok())
		.unwrap_or(0.0);

	if call_status == "completed" && duration_secs > 0.0 {
		let minutes = (duration_secs / 60.0).ceil();
		let unit = deps.catalog.rate(Capability::PhoneOutbound, "twilio").map(|r| &r.unit);
		let cost = unit.map(|u| u.cost_for_minutes(minutes)).unwrap_or(CostCents::ZERO);
		deps.settle(&tenant, Capability::PhoneOutbound, "twilio", cost, Some((minutes, "minutes")))
			.await;
		info!(%tenant, minutes, "outbound call billed from status callback");
	} else {
		info!(%tenant, call_status, "outbound call not billable");
	}

	Ok(StatusCode::OK.into_response())
}

/// Provider webhook for inbound calls. Completed-call reports are
/// metered against the owner of the dialed number; ringing-stage
/// webhooks just get TwiML back.
pub async fn inbound(
	State(deps): State<Arc<GatewayDeps>>,
	headers: HeaderMap,
	body: Bytes,
) -> Result<Response, PlatformError> {
	verify_inbound_signature(&deps, &headers, &body)?;

	let form = parse_callback_form(&body);
	let duration_secs: f64 = form
		.get("CallDuration")
		.and_then(|d| d.parse().ok())
		.unwrap_or(0.0);

	if duration_secs > 0.0 {
		if let Some(tenant) = form.get("To").and_then(|to| deps.numbers.tenant_of(to)) {
			let minutes = (duration_secs / 60.0).ceil();
			let unit = deps.catalog.rate(Capability::PhoneInbound, "twilio").map(|r| &r.unit);
			let cost = unit.map(|u| u.cost_for_minutes(minutes)).unwrap_or(CostCents::ZERO);
			deps.settle(&tenant, Capability::PhoneInbound, "twilio", cost, Some((minutes, "minutes")))
				.await;
		} else {
			warn!(to = ?form.get("To"), "inbound call for unknown number");
		}
	}

	Ok((
		StatusCode::OK,
		[(header::CONTENT_TYPE, "text/xml")],
		"<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response/>",
	)
		.into_response())
}

/// Self-hosted default TwiML: answer and hang up.
pub async fn twiml_hangup() -> Response {
	(
		StatusCode::OK,
		[(header::CONTENT_TYPE, "text/xml")],
		"<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Hangup/></Response>",
	)
		.into_response()
}

#[derive(Debug, Deserialize)]
pub struct ProvisionRequest {
	#[serde(default)]
	pub area_code: Option<String>,
	#[serde(default)]
	pub number: Option<String>,
}

/// Buy a number: one-time meter event for the first month plus
/// enrollment in the recurring tracker for the months after.
pub async fn provision_number(
	State(deps): State<Arc<GatewayDeps>>,
	Extension(auth): Extension<AuthContext>,
	Json(request): Json<ProvisionRequest>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Write)?;
	let tenant = auth.tenant.clone();
	deps.pre_flight(&tenant).await?;

	let (sid, token) = twilio_credentials(&deps)?;

	let mut params: Vec<(&str, String)> = Vec::new();
	if let Some(number) = &request.number {
		params.push(("PhoneNumber", number.clone()));
	} else if let Some(area_code) = &request.area_code {
		params.push(("AreaCode", area_code.clone()));
	}

	let response = deps
		.http
		.post(format!(
			"{}/2010-04-01/Accounts/{sid}/IncomingPhoneNumbers.json",
			deps.config.twilio_base
		))
		.basic_auth(sid, Some(token))
		.timeout(UPSTREAM_TIMEOUT)
		.form(&params)
		.send()
		.await
		.map_err(|e| map_transport_error(&e))?;

	let status = response.status();
	if !status.is_success() {
		return Err(map_upstream_status(status.as_u16()));
	}
	let body: serde_json::Value = response.json().await.map_err(|e| map_transport_error(&e))?;

	let number_sid = body.get("sid").and_then(|s| s.as_str()).unwrap_or("unknown").to_owned();
	let number = body
		.get("phone_number")
		.and_then(|n| n.as_str())
		.unwrap_or_default()
		.to_owned();

	let rate = deps.catalog.rate(Capability::PhoneNumberMonthly, "twilio");
	let monthly_cost = rate.map(|r| r.unit.flat()).unwrap_or(CostCents::ZERO);
	let margin = deps.catalog.margin(Capability::PhoneNumberMonthly, "twilio");

	deps.settle(&tenant, Capability::PhoneNumberMonthly, "twilio", monthly_cost, None).await;
	deps.recurring.enroll(
		tenant.clone(),
		number_sid.clone(),
		Capability::PhoneNumberMonthly,
		monthly_cost,
		margin,
		Utc::now() + Duration::days(30),
	);

	let provisioned = ProvisionedNumber {
		id: Uuid::new_v4(),
		tenant,
		number,
		sid: number_sid,
		monthly_cost,
	};
	deps.numbers.insert(provisioned.clone());

	Ok((StatusCode::CREATED, Json(provisioned)).into_response())
}

pub async fn list_numbers(
	State(deps): State<Arc<GatewayDeps>>,
	Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<ProvisionedNumber>>, PlatformError> {
	auth.require(TokenScope::Read)?;
	Ok(Json(deps.numbers.list(&auth.tenant)))
}

pub async fn release_number(
	State(deps): State<Arc<GatewayDeps>>,
	Extension(auth): Extension<AuthContext>,
	Path(id): Path<Uuid>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Write)?;

	let number = deps
		.numbers
		.remove(&auth.tenant, id)
		.ok_or_else(|| PlatformError::NotFound("phone number".into()))?;
	deps.recurring.cancel(&number.sid);

	// Best-effort release upstream; the enrollment is already gone.
	if let Ok((sid, token)) = twilio_credentials(&deps) {
		let result = deps
			.http
			.delete(format!(
				"{}/2010-04-01/Accounts/{sid}/IncomingPhoneNumbers/{}.json",
				deps.config.twilio_base, number.sid
			))
			.basic_auth(sid, Some(token))
			.timeout(UPSTREAM_TIMEOUT)
			.send()
			.await;
		if let Err(err) = result {
			warn!(sid = %number.sid, %err, "upstream number release failed");
		}
	}

	Ok(StatusCode::NO_CONTENT.into_response())
}

fn twilio_credentials(deps: &GatewayDeps) -> Result<(&str, &str), PlatformError> {
	match (&deps.config.twilio_sid, &deps.config.twilio_token) {
		(Some(sid), Some(token)) => Ok((sid.as_str(), token.as_str())),
		_ => Err(PlatformError::ServiceUnavailable("twilio".into())),
	}
}
