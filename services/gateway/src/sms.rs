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

//! SMS/MMS messaging. Each message meters once; MMS is distinguished
//! by attached media and carries its own capability and margin.

use std::sync::Arc;

use axum::{
	body::Bytes,
	extract::State,
	http::{header, HeaderMap, StatusCode},
	response::{IntoResponse, Response},
	Extension, Json,
};
use fleet_primitives::{CostCents, TokenScope};
use fleet_types::{Capability, PlatformError};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
	error::{map_transport_error, map_upstream_status},
	AuthContext, GatewayDeps, UPSTREAM_TIMEOUT,
};

#[derive(Debug, Deserialize)]
pub struct OutboundMessage {
	pub to: String,
	pub from: String,
	pub body: String,
	#[serde(default)]
	pub media_urls: Vec<String>,
}

pub async fn outbound(
	State(deps): State<Arc<GatewayDeps>>,
	Extension(auth): Extension<AuthContext>,
	Json(message): Json<OutboundMessage>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Write)?;
	let tenant = auth.tenant.clone();
	deps.pre_flight(&tenant).await?;

	let (sid, token) = match (&deps.config.twilio_sid, &deps.config.twilio_token) {
		(Some(sid), Some(token)) => (sid.clone(), token.clone()),
		_ => return Err(PlatformError::ServiceUnavailable("twilio".into())),
	};

	let capability = if message.media_urls.is_empty() {
		Capability::SmsOutbound
	} else {
		Capability::MmsOutbound
	};

	let mut params = vec![
		("To", message.to.clone()),
		("From", message.from.clone()),
		("Body", message.body.clone()),
	];
	for url in &message.media_urls {
		params.push(("MediaUrl", url.clone()));
	}

	let response = deps
		.http
		.post(format!(
			"{}/2010-04-01/Accounts/{sid}/Messages.json",
			deps.config.twilio_base
		))
		.basic_auth(&sid, Some(&token))
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

	let unit = deps.catalog.rate(capability, "twilio").map(|r| &r.unit);
	let cost = unit.map(|u| u.flat()).unwrap_or(CostCents::ZERO);
	deps.settle(&tenant, capability, "twilio", cost, Some((1.0, "messages"))).await;

	Ok((StatusCode::OK, Json(body)).into_response())
}

/// Provider webhook for inbound messages. Metered against the owner
/// of the receiving number; `num_media > 0` makes it MMS.
pub async fn inbound(
	State(deps): State<Arc<GatewayDeps>>,
	headers: HeaderMap,
	body: Bytes,
) -> Result<Response, PlatformError> {
	super::phone::verify_inbound_signature(&deps, &headers, &body)?;

	let form = super::phone::parse_callback_form(&body);
	let num_media: u32 = form.get("NumMedia").and_then(|n| n.parse().ok()).unwrap_or(0);
	let capability = if num_media > 0 {
		Capability::MmsInbound
	} else {
		Capability::SmsInbound
	};

	match form.get("To").and_then(|to| deps.numbers.tenant_of(to)) {
		Some(tenant) => {
			let unit = deps.catalog.rate(capability, "twilio").map(|r| &r.unit);
			let cost = unit.map(|u| u.flat()).unwrap_or(CostCents::ZERO);
			deps.settle(&tenant, capability, "twilio", cost, Some((1.0, "messages"))).await;
		},
		None => warn!(to = ?form.get("To"), "inbound message for unknown number"),
	}

	Ok((
		StatusCode::OK,
		[(header::CONTENT_TYPE, "text/xml")],
		"<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response/>",
	)
		.into_response())
}

/// Delivery-status callback. Status transitions are logged, never
/// billed: the message already metered once when it was sent.
pub async fn delivery_status(
	State(deps): State<Arc<GatewayDeps>>,
	headers: HeaderMap,
	body: Bytes,
) -> Result<Response, PlatformError> {
	super::phone::verify_inbound_signature(&deps, &headers, &body)?;

	let form = super::phone::parse_callback_form(&body);
	info!(
		sid = ?form.get("MessageSid"),
		status = ?form.get("MessageStatus"),
		"delivery status update"
	);
	Ok(StatusCode::OK.into_response())
}
