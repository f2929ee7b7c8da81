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

//! Image and video generation through Replicate.

use std::sync::Arc;

use axum::{
	extract::State,
	response::{IntoResponse, Response},
	Extension, Json,
};
use fleet_primitives::{CostCents, TokenScope};
use fleet_types::{Capability, PlatformError};
use serde::Deserialize;

use crate::{
	error::{map_transport_error, map_upstream_status},
	AuthContext, GatewayDeps, UPSTREAM_TIMEOUT,
};

#[derive(Debug, Deserialize)]
pub struct ImageRequest {
	pub prompt: String,
	#[serde(default)]
	pub n: Option<u32>,
	#[serde(default)]
	pub size: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VideoRequest {
	pub prompt: String,
	/// Requested clip length in seconds.
	#[serde(default)]
	pub duration: Option<f64>,
}

async fn replicate_predict(
	deps: &GatewayDeps,
	input: serde_json::Value,
) -> Result<serde_json::Value, PlatformError> {
	let token = deps
		.config
		.replicate_token
		.as_deref()
		.ok_or_else(|| PlatformError::ServiceUnavailable("replicate".into()))?;

	let response = deps
		.http
		.post(format!("{}/v1/predictions", deps.config.replicate_base))
		.header("Authorization", format!("Token {token}"))
		.timeout(UPSTREAM_TIMEOUT)
		.json(&serde_json::json!({ "input": input }))
		.send()
		.await
		.map_err(|e| map_transport_error(&e))?;

	let status = response.status();
	if !status.is_success() {
		return Err(map_upstream_status(status.as_u16()));
	}
	response.json().await.map_err(|e| map_transport_error(&e))
}

pub async fn image_generations(
	State(deps): State<Arc<GatewayDeps>>,
	Extension(auth): Extension<AuthContext>,
	Json(request): Json<ImageRequest>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Write)?;
	let tenant = auth.tenant.clone();
	deps.pre_flight(&tenant).await?;

	if request.prompt.is_empty() {
		return Err(PlatformError::InvalidRequest("empty prompt".into()));
	}
	let count = request.n.unwrap_or(1).max(1) as f64;

	let mut input = serde_json::json!({ "prompt": request.prompt, "num_outputs": count });
	if let Some(size) = &request.size {
		input["size"] = serde_json::json!(size);
	}
	let body = replicate_predict(&deps, input).await?;

	let unit = deps.catalog.rate(Capability::ImageGeneration, "replicate").map(|r| &r.unit);
	let per_image = unit.map(|u| u.flat()).unwrap_or(CostCents::ZERO);
	let cost = CostCents::new(per_image.get() * count);

	deps.settle(&tenant, Capability::ImageGeneration, "replicate", cost, Some((count, "images")))
		.await;

	Ok(Json(body).into_response())
}

pub async fn video_generations(
	State(deps): State<Arc<GatewayDeps>>,
	Extension(auth): Extension<AuthContext>,
	Json(request): Json<VideoRequest>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Write)?;
	let tenant = auth.tenant.clone();
	deps.pre_flight(&tenant).await?;

	if request.prompt.is_empty() {
		return Err(PlatformError::InvalidRequest("empty prompt".into()));
	}
	let duration_secs = request.duration.unwrap_or(5.0).max(1.0);

	let body = replicate_predict(
		&deps,
		serde_json::json!({ "prompt": request.prompt, "duration": duration_secs }),
	)
	.await?;

	let unit = deps.catalog.rate(Capability::VideoGeneration, "replicate").map(|r| &r.unit);
	let cost =
		unit.map(|u| u.cost_for_minutes(duration_secs / 60.0)).unwrap_or(CostCents::ZERO);

	deps.settle(
		&tenant,
		Capability::VideoGeneration,
		"replicate",
		cost,
		Some((duration_secs, "seconds")),
	)
	.await;

	Ok(Json(body).into_response())
}
