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

//! Production provider adapters for the arbitrage router.

use async_trait::async_trait;
use fleet_catalog::RateUnit;
use fleet_primitives::CostCents;
use fleet_traits::ProviderAdapter;
use fleet_types::{
	routing::{ProviderResponse, RouteRequest},
	Capability, PlatformError,
};

use crate::{
	error::{map_transport_error, map_upstream_status},
	openai::cost_from_hints,
	UPSTREAM_TIMEOUT,
};

/// Rough tokenization for pre-call estimates: four characters per
/// token over the serialized message content.
fn estimated_prompt_tokens(body: &serde_json::Value) -> u64 {
	let chars = body
		.get("messages")
		.and_then(|m| m.as_array())
		.map(|messages| {
			messages
				.iter()
				.filter_map(|m| m.get("content").and_then(|c| c.as_str()))
				.map(|c| c.len() as u64)
				.sum()
		})
		.unwrap_or(0);
	chars / 4
}

/// OpenRouter chat adapter: the non-streaming arbitrage candidate.
pub struct OpenRouterChatAdapter {
	http: reqwest::Client,
	api_key: String,
	base_url: String,
	unit: RateUnit,
}

impl OpenRouterChatAdapter {
	pub fn new(
		http: reqwest::Client,
		api_key: impl Into<String>,
		base_url: impl Into<String>,
		unit: RateUnit,
	) -> Self {
		Self { http, api_key: api_key.into(), base_url: base_url.into(), unit }
	}
}

#[async_trait]
impl ProviderAdapter for OpenRouterChatAdapter {
	fn name(&self) -> &'static str {
		"openrouter"
	}

	fn capability(&self) -> Capability {
		Capability::ChatCompletions
	}

	async fn estimate(&self, request: &RouteRequest) -> Result<CostCents, PlatformError> {
		let prompt = estimated_prompt_tokens(&request.body);
		let completion = request
			.body
			.get("max_tokens")
			.and_then(|t| t.as_u64())
			.unwrap_or(512);
		Ok(self.unit.cost_for_tokens(prompt, completion))
	}

	async fn invoke(&self, request: &RouteRequest) -> Result<ProviderResponse, PlatformError> {
		let response = self
			.http
			.post(format!("{}/v1/chat/completions", self.base_url))
			.bearer_auth(&self.api_key)
			.timeout(UPSTREAM_TIMEOUT)
			.json(&request.body)
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
		let (cost, usage) = cost_from_hints(&headers, &body, Some(&self.unit));

		Ok(ProviderResponse { status: status.as_u16(), body, cost_hint: Some(cost), usage })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn prompt_estimate_counts_message_content() {
		let body = serde_json::json!({
			"messages": [
				{ "role": "user", "content": "12345678" },
				{ "role": "assistant", "content": "1234" },
			]
		});
		assert_eq!(estimated_prompt_tokens(&body), 3);
	}
}
