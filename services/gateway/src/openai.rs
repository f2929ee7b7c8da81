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

//! OpenAI-compatible endpoints: chat completions, text completions
//! and embeddings.
//!
//! Non-streaming chat goes through the arbitrage router. A
//! `stream = true` request bypasses arbitrage and streams from the
//! designated provider as SSE passthrough, with usage buffered from
//! the terminal chunk and billing performed when the stream closes —
//! including a client disconnect, which bills the usage observed up
//! to that point.

use std::{convert::Infallible, sync::Arc};

use axum::{
	extract::State,
	http::{HeaderMap, StatusCode},
	response::{sse::Event as SseEvent, IntoResponse, Response, Sse},
	Extension, Json,
};
use fleet_primitives::{CostCents, TenantId, TokenScope, MIN_METERED_COST};
use fleet_types::{
	routing::{RouteRequest, TokenUsage},
	Capability, PlatformError,
};
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use crate::{
	error::{map_transport_error, map_upstream_status},
	AuthContext, GatewayDeps, UPSTREAM_TIMEOUT,
};

/// Header OpenRouter attaches with the wholesale cost in dollars.
const COST_HEADER: &str = "x-openrouter-cost";

const DESIGNATED_STREAM_PROVIDER: &str = "openrouter";

#[derive(Debug, Deserialize)]
struct StreamChunk {
	usage: Option<TokenUsage>,
}

/// Wholesale cost of a non-streaming response, best hint first:
/// explicit cost header, then reported token usage, then the metered
/// minimum.
pub(crate) fn cost_from_hints(
	headers: &HeaderMap,
	body: &serde_json::Value,
	unit: Option<&fleet_catalog::RateUnit>,
) -> (CostCents, Option<TokenUsage>) {
	let usage = body
		.get("usage")
		.and_then(|u| serde_json::from_value::<TokenUsage>(u.clone()).ok());

	if let Some(dollars) = headers
		.get(COST_HEADER)
		.and_then(|v| v.to_str().ok())
		.and_then(|v| v.parse::<f64>().ok())
	{
		return (CostCents::new(dollars * 100.0), usage);
	}

	if let (Some(usage), Some(unit)) = (&usage, unit) {
		let cost = unit.cost_for_tokens(usage.prompt_tokens, usage.completion_tokens);
		if !cost.is_zero() {
			return (cost, Some(*usage));
		}
	}

	(CostCents::new(MIN_METERED_COST), usage)
}

pub async fn chat_completions(
	State(deps): State<Arc<GatewayDeps>>,
	Extension(auth): Extension<AuthContext>,
	Json(body): Json<serde_json::Value>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Write)?;
	let tenant = auth.tenant.clone();
	deps.pre_flight(&tenant).await?;

	let streaming = body.get("stream").and_then(|v| v.as_bool()).unwrap_or(false);
	if streaming {
		return stream_chat(deps, tenant, body).await;
	}

	let mut request = RouteRequest::new(Capability::ChatCompletions, tenant.clone(), body);
	request.tier = deps.directory.meta(&tenant).tier;

	let routed = deps.router.route(&request).await?;
	let units = routed.response.usage.map(|u| (u.total_tokens as f64, "tokens"));
	deps.settle(&tenant, Capability::ChatCompletions, &routed.provider, routed.cost, units)
		.await;

	let status =
		StatusCode::from_u16(routed.response.status).unwrap_or(StatusCode::OK);
	Ok((status, Json(routed.response.body)).into_response())
}

pub async fn completions(
	State(deps): State<Arc<GatewayDeps>>,
	Extension(auth): Extension<AuthContext>,
	Json(body): Json<serde_json::Value>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Write)?;
	direct_openrouter(&deps, &auth.tenant, Capability::Completions, "/v1/completions", body).await
}

pub async fn embeddings(
	State(deps): State<Arc<GatewayDeps>>,
	Extension(auth): Extension<AuthContext>,
	Json(body): Json<serde_json::Value>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Write)?;
	direct_openrouter(&deps, &auth.tenant, Capability::Embeddings, "/v1/embeddings", body).await
}

/// Direct route to the configured OpenRouter upstream with header and
/// usage cost hints.
async fn direct_openrouter(
	deps: &GatewayDeps,
	tenant: &TenantId,
	capability: Capability,
	path: &str,
	body: serde_json::Value,
) -> Result<Response, PlatformError> {
	deps.pre_flight(tenant).await?;

	let key = deps
		.config
		.openrouter_key
		.as_deref()
		.ok_or_else(|| PlatformError::ServiceUnavailable("openrouter".into()))?;

	let response = deps
		.http
		.post(format!("{}{path}", deps.config.openrouter_base))
		.bearer_auth(key)
		.timeout(UPSTREAM_TIMEOUT)
		.json(&body)
		.send()
		.await
		.map_err(|e| map_transport_error(&e))?;

	let status = response.status();
	if !status.is_success() {
		return Err(map_upstream_status(status.as_u16()));
	}

	let headers = response.headers().clone();
	let body: serde_json::Value =
		response.json().await.map_err(|e| map_transport_error(&e))?;

	let unit = deps.catalog.rate(capability, "openrouter").map(|r| &r.unit);
	let (cost, usage) = cost_from_hints(&headers, &body, unit);
	let units = usage.map(|u| (u.total_tokens as f64, "tokens"));
	deps.settle(tenant, capability, "openrouter", cost, units).await;

	Ok(Json(body).into_response())
}

/// SSE passthrough from the designated streaming provider.
///
/// The forwarding task owns billing: whether the upstream finishes,
/// errors out, or the client disconnects mid-stream, the task settles
/// exactly once with the usage buffered so far before it exits.
async fn stream_chat(
	deps: Arc<GatewayDeps>,
	tenant: TenantId,
	mut body: serde_json::Value,
) -> Result<Response, PlatformError> {
	let key = deps
		.config
		.openrouter_key
		.clone()
		.ok_or_else(|| PlatformError::ServiceUnavailable("openrouter".into()))?;

	body["stream"] = serde_json::json!(true);
	body["stream_options"] = serde_json::json!({ "include_usage": true });

	let response = deps
		.http
		.post(format!("{}/v1/chat/completions", deps.config.openrouter_base))
		.bearer_auth(key)
		.timeout(UPSTREAM_TIMEOUT)
		.json(&body)
		.send()
		.await
		.map_err(|e| map_transport_error(&e))?;

	let status = response.status();
	if !status.is_success() {
		return Err(map_upstream_status(status.as_u16()));
	}

	let (tx, rx) = mpsc::channel::<Result<SseEvent, Infallible>>(64);

	tokio::spawn(async move {
		let mut bytes_stream = response.bytes_stream();
		let mut buffer = String::new();
		let mut usage: Option<TokenUsage> = None;

		'upstream: while let Some(chunk) = bytes_stream.next().await {
			let chunk = match chunk {
				Ok(chunk) => chunk,
				Err(err) => {
					warn!(%tenant, %err, "upstream stream error");
					break 'upstream;
				},
			};
			buffer.push_str(&String::from_utf8_lossy(&chunk));

			while let Some(newline) = buffer.find('\n') {
				let line = buffer[..newline].trim().to_owned();
				buffer.drain(..=newline);

				let Some(data) = line.strip_prefix("data: ") else { continue };

				if data == "[DONE]" {
					let _ = tx.send(Ok(SseEvent::default().data("[DONE]"))).await;
					break 'upstream;
				}

				if let Ok(parsed) = serde_json::from_str::<StreamChunk>(data) {
					if let Some(chunk_usage) = parsed.usage {
						usage = Some(chunk_usage);
					}
				}

				if tx.send(Ok(SseEvent::default().data(data.to_owned()))).await.is_err() {
					// Client went away: abort the upstream call and
					// bill what was observed up to this point.
					break 'upstream;
				}
			}
		}

		let unit = deps
			.catalog
			.rate(Capability::ChatCompletions, DESIGNATED_STREAM_PROVIDER)
			.map(|r| &r.unit);
		let cost = match (&usage, unit) {
			(Some(usage), Some(unit)) => {
				unit.cost_for_tokens(usage.prompt_tokens, usage.completion_tokens)
			},
			_ => CostCents::ZERO,
		};
		let units = usage.map(|u| (u.total_tokens as f64, "tokens"));
		deps.settle(
			&tenant,
			Capability::ChatCompletions,
			DESIGNATED_STREAM_PROVIDER,
			cost,
			units,
		)
		.await;
	});

	Ok(Sse::new(ReceiverStream::new(rx))
		.keep_alive(axum::response::sse::KeepAlive::new())
		.into_response())
}

#[cfg(test)]
mod unit_tests {
	use super::*;

	#[test]
	fn cost_header_wins_over_usage() {
		let mut headers = HeaderMap::new();
		headers.insert(COST_HEADER, "0.005".parse().unwrap());
		let body = serde_json::json!({ "usage": { "prompt_tokens": 100, "completion_tokens": 100, "total_tokens": 200 } });

		let unit = fleet_catalog::RateUnit::PerThousandTokens { input: 0.05, output: 0.15 };
		let (cost, usage) = cost_from_hints(&headers, &body, Some(&unit));
		assert!((cost.get() - 0.5).abs() < 1e-9);
		assert_eq!(usage.unwrap().total_tokens, 200);
	}

	#[test]
	fn usage_prices_through_the_rate_table() {
		let body = serde_json::json!({ "usage": { "prompt_tokens": 1000, "completion_tokens": 1000, "total_tokens": 2000 } });
		let unit = fleet_catalog::RateUnit::PerThousandTokens { input: 0.05, output: 0.15 };
		let (cost, _) = cost_from_hints(&HeaderMap::new(), &body, Some(&unit));
		assert!((cost.get() - 0.2).abs() < 1e-9);
	}

	#[test]
	fn missing_hints_fall_back_to_the_minimum() {
		let (cost, usage) =
			cost_from_hints(&HeaderMap::new(), &serde_json::json!({}), None);
		assert_eq!(cost, CostCents::new(MIN_METERED_COST));
		assert!(usage.is_none());
	}
}
