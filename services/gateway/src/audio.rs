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

//! Speech endpoints: STT (Deepgram) and TTS (ElevenLabs).
//!
//! Cost comes from the duration or character count the upstream
//! reports, with a 0.1¢ floor when a response carries no usable
//! figure.

use std::sync::Arc;

use axum::{
	body::Bytes,
	extract::State,
	http::{header, HeaderMap, StatusCode},
	response::{IntoResponse, Response},
	Extension, Json,
};
use fleet_primitives::{CostCents, TokenScope, MIN_METERED_COST};
use fleet_types::{Capability, PlatformError};
use serde::Deserialize;

use crate::{
	error::{map_transport_error, map_upstream_status},
	AuthContext, GatewayDeps, UPSTREAM_TIMEOUT,
};

pub async fn transcriptions(
	State(deps): State<Arc<GatewayDeps>>,
	Extension(auth): Extension<AuthContext>,
	headers: HeaderMap,
	audio: Bytes,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Write)?;
	let tenant = auth.tenant.clone();
	deps.pre_flight(&tenant).await?;

	if audio.is_empty() {
		return Err(PlatformError::InvalidRequest("empty audio body".into()));
	}

	let key = deps
		.config
		.deepgram_key
		.as_deref()
		.ok_or_else(|| PlatformError::ServiceUnavailable("deepgram".into()))?;

	let content_type = headers
		.get(header::CONTENT_TYPE)
		.and_then(|v| v.to_str().ok())
		.unwrap_or("application/octet-stream")
		.to_owned();

	let response = deps
		.http
		.post(format!("{}/v1/listen", deps.config.deepgram_base))
		.header(header::AUTHORIZATION, format!("Token {key}"))
		.header(header::CONTENT_TYPE, content_type)
		.timeout(UPSTREAM_TIMEOUT)
		.body(audio)
		.send()
		.await
		.map_err(|e| map_transport_error(&e))?;

	let status = response.status();
	if !status.is_success() {
		return Err(map_upstream_status(status.as_u16()));
	}

	let body: serde_json::Value = response.json().await.map_err(|e| map_transport_error(&e))?;

	let duration_secs = body
		.get("metadata")
		.and_then(|m| m.get("duration"))
		.and_then(|d| d.as_f64())
		.unwrap_or(0.0);

	let unit = deps.catalog.rate(Capability::Stt, "deepgram").map(|r| &r.unit);
	let cost = match unit {
		Some(unit) if duration_secs > 0.0 => {
			let cost = unit.cost_for_minutes(duration_secs / 60.0);
			if cost.get() < MIN_METERED_COST {
				CostCents::new(MIN_METERED_COST)
			} else {
				cost
			}
		},
		_ => CostCents::new(MIN_METERED_COST),
	};

	deps.settle(&tenant, Capability::Stt, "deepgram", cost, Some((duration_secs, "seconds")))
		.await;

	Ok(Json(body).into_response())
}

#[derive(Debug, Deserialize)]
pub struct SpeechRequest {
	pub input: String,
	pub voice: String,
	#[serde(default)]
	pub model: Option<String>,
	#[serde(default)]
	pub response_format: Option<String>,
}

pub async fn speech(
	State(deps): State<Arc<GatewayDeps>>,
	Extension(auth): Extension<AuthContext>,
	Json(request): Json<SpeechRequest>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Write)?;
	let tenant = auth.tenant.clone();
	deps.pre_flight(&tenant).await?;

	if request.input.is_empty() {
		return Err(PlatformError::InvalidRequest("empty input".into()));
	}

	let key = deps
		.config
		.elevenlabs_key
		.as_deref()
		.ok_or_else(|| PlatformError::ServiceUnavailable("elevenlabs".into()))?;

	let mut upstream_body = serde_json::json!({ "text": request.input });
	if let Some(model) = &request.model {
		upstream_body["model_id"] = serde_json::json!(model);
	}
	if let Some(format) = &request.response_format {
		upstream_body["output_format"] = serde_json::json!(format);
	}

	let response = deps
		.http
		.post(format!(
			"{}/v1/text-to-speech/{}",
			deps.config.elevenlabs_base, request.voice
		))
		.header("xi-api-key", key)
		.timeout(UPSTREAM_TIMEOUT)
		.json(&upstream_body)
		.send()
		.await
		.map_err(|e| map_transport_error(&e))?;

	let status = response.status();
	if !status.is_success() {
		return Err(map_upstream_status(status.as_u16()));
	}

	let content_type = response
		.headers()
		.get(header::CONTENT_TYPE)
		.and_then(|v| v.to_str().ok())
		.unwrap_or("audio/mpeg")
		.to_owned();
	let audio = response.bytes().await.map_err(|e| map_transport_error(&e))?;

	let characters = request.input.chars().count() as u64;
	let unit = deps.catalog.rate(Capability::Tts, "elevenlabs").map(|r| &r.unit);
	let cost = match unit {
		Some(unit) => {
			let cost = unit.cost_for_characters(characters);
			if cost.get() < MIN_METERED_COST {
				CostCents::new(MIN_METERED_COST)
			} else {
				cost
			}
		},
		None => CostCents::new(MIN_METERED_COST),
	};

	deps.settle(&tenant, Capability::Tts, "elevenlabs", cost, Some((characters as f64, "characters")))
		.await;

	Ok((StatusCode::OK, [(header::CONTENT_TYPE, content_type)], audio).into_response())
}
