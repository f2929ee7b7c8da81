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
	extract::{Query, State},
	response::{Html, IntoResponse, Response},
	Extension, Json,
};
use fleet_gateway::AuthContext;
use fleet_utils::script_json::to_script_string;
use fleet_types::PlatformError;
use serde::Deserialize;
use tracing::info;

use crate::OauthDeps;

/// Tag the callback page posts to `window.opener` so the dashboard
/// can tell our messages from anything else on the page.
const POST_MESSAGE_SOURCE: &str = "wopr-channel-oauth";

#[derive(Debug, Deserialize)]
pub struct InitiateRequest {
	pub provider: String,
}

pub async fn initiate(
	State(deps): State<Arc<OauthDeps>>,
	Extension(auth): Extension<AuthContext>,
	Json(request): Json<InitiateRequest>,
) -> Result<Response, PlatformError> {
	deps.store.maybe_purge();

	let provider = deps.providers.get(&request.provider)?;
	let redirect_uri = format!("{}/api/channel-oauth/callback", deps.public_base);
	let pending =
		deps.store
			.create_pending(&provider.name, auth.tenant.as_str(), &redirect_uri);
	let authorize_url = provider.authorize_redirect(&pending.state, &redirect_uri);

	info!(provider = %provider.name, tenant = %auth.tenant, "oauth flow initiated");
	Ok(Json(serde_json::json!({
		"state": pending.state,
		"authorizeUrl": authorize_url,
	}))
	.into_response())
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
	#[serde(default)]
	pub code: Option<String>,
	#[serde(default)]
	pub state: Option<String>,
	#[serde(default)]
	pub error: Option<String>,
}

/// The page loaded inside the popup. It posts the state back to the
/// opener and closes; the state value is script-escaped before
/// interpolation so a hostile provider cannot break out of the
/// script block.
fn callback_page(state: &str, ok: bool) -> Result<Html<String>, PlatformError> {
	let payload = to_script_string(&serde_json::json!({
		"source": POST_MESSAGE_SOURCE,
		"state": state,
		"ok": ok,
	}))
	.map_err(|e| PlatformError::Internal(e.to_string()))?;

	Ok(Html(format!(
		"<!doctype html><html><body><script>\n\
		 if (window.opener) {{ window.opener.postMessage({payload}, \"*\"); }}\n\
		 window.close();\n\
		 </script><p>You can close this window.</p></body></html>"
	)))
}

pub async fn callback(
	State(deps): State<Arc<OauthDeps>>,
	Query(query): Query<CallbackQuery>,
) -> Result<Response, PlatformError> {
	deps.store.maybe_purge();

	let state = query
		.state
		.as_deref()
		.ok_or_else(|| PlatformError::InvalidRequest("missing state".into()))?;

	let Some(pending) = deps.store.consume_pending(state) else {
		// Unknown, expired or replayed state: a terminal page, not an
		// API error, since a browser is looking at this.
		return Ok(callback_page(state, false)?.into_response());
	};

	if query.error.is_some() {
		info!(provider = %pending.provider, "provider returned an error to the callback");
		return Ok(callback_page(state, false)?.into_response());
	}

	let code = query
		.code
		.as_deref()
		.ok_or_else(|| PlatformError::InvalidRequest("missing code".into()))?;

	let access_token = deps
		.providers
		.exchange_code(&deps.http, &pending.provider, code, &pending.redirect_uri)
		.await?;

	deps.store.complete_with_token(state, &access_token, &pending.user_id);
	Ok(callback_page(state, true)?.into_response())
}

#[derive(Debug, Deserialize)]
pub struct PollQuery {
	pub state: String,
}

pub async fn poll(
	State(deps): State<Arc<OauthDeps>>,
	Extension(auth): Extension<AuthContext>,
	Query(query): Query<PollQuery>,
) -> Result<Response, PlatformError> {
	deps.store.maybe_purge();

	match deps.store.consume_completed(&query.state, auth.tenant.as_str()) {
		Some(token) => Ok(Json(serde_json::json!({
			"status": "completed",
			"token": token.access_token,
		}))
		.into_response()),
		// Not ready, not ours, or already consumed: all the same
		// "pending" to the caller.
		None => Ok(Json(serde_json::json!({ "status": "pending" })).into_response()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn callback_page_is_script_safe() {
		let page = callback_page("</script><script>alert(1)</script>", true).unwrap();
		assert!(!page.0.contains("</script><script>alert"));
		assert!(page.0.contains(POST_MESSAGE_SOURCE));
	}
}
