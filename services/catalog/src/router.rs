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

use fleet_primitives::CostCents;
use fleet_traits::ProviderAdapter;
use fleet_types::{
	routing::{RoutedCall, RouteRequest},
	PlatformError,
};
use tracing::{debug, warn};

/// Cheapest-eligible provider selection.
///
/// Streaming chat bypasses this entirely: the gateway streams from
/// its designated provider and arbitrage applies to non-streaming
/// requests only.
#[derive(Default)]
pub struct ArbitrageRouter {
	adapters: Vec<Arc<dyn ProviderAdapter>>,
}

impl ArbitrageRouter {
	pub fn new(adapters: Vec<Arc<dyn ProviderAdapter>>) -> Self {
		Self { adapters }
	}

	pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
		self.adapters.push(adapter);
	}

	/// Estimate every eligible adapter, then invoke from cheapest to
	/// dearest until one answers. Transport failures advance to the
	/// next candidate; an upstream HTTP error ends the attempt, since
	/// retrying a rejected request elsewhere would double-submit it.
	pub async fn route(&self, request: &RouteRequest) -> Result<RoutedCall, PlatformError> {
		let mut candidates: Vec<(CostCents, &Arc<dyn ProviderAdapter>)> = Vec::new();
		for adapter in &self.adapters {
			if adapter.capability() != request.capability || !adapter.eligible(request) {
				continue;
			}
			match adapter.estimate(request).await {
				Ok(cost) => candidates.push((cost, adapter)),
				Err(err) => {
					warn!(provider = adapter.name(), %err, "estimate failed, skipping provider");
				},
			}
		}

		if candidates.is_empty() {
			return Err(PlatformError::NoProviderAvailable(request.capability));
		}

		candidates.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

		for (estimate, adapter) in candidates {
			if !adapter.healthy().await {
				debug!(provider = adapter.name(), "skipping unhealthy provider");
				continue;
			}
			match adapter.invoke(request).await {
				Ok(response) => {
					let cost = response.cost_hint.unwrap_or(estimate);
					return Ok(RoutedCall { provider: adapter.name().to_owned(), cost, response });
				},
				Err(PlatformError::UpstreamUnreachable) => {
					warn!(provider = adapter.name(), "transport failure, trying next provider");
				},
				Err(other) => return Err(other),
			}
		}

		Err(PlatformError::NoProviderAvailable(request.capability))
	}
}

#[cfg(test)]
mod tests {
	use fleet_mocks::MockProviderAdapter;
	use fleet_primitives::TenantId;
	use fleet_types::Capability;

	use super::*;

	fn request() -> RouteRequest {
		RouteRequest::new(
			Capability::ChatCompletions,
			TenantId::from("t"),
			serde_json::json!({ "model": "small" }),
		)
	}

	#[tokio::test]
	async fn cheapest_eligible_provider_wins() {
		let cheap = Arc::new(MockProviderAdapter::new(
			"cheap",
			Capability::ChatCompletions,
			CostCents::new(0.5),
		));
		let dear = Arc::new(MockProviderAdapter::new(
			"dear",
			Capability::ChatCompletions,
			CostCents::new(2.0),
		));

		let router = ArbitrageRouter::new(vec![cheap.clone(), dear.clone()]);
		let routed = router.route(&request()).await.unwrap();

		assert_eq!(routed.provider, "cheap");
		assert_eq!(cheap.invocations(), 1);
		assert_eq!(dear.invocations(), 0);
	}

	#[tokio::test]
	async fn transport_failure_fails_over_to_next() {
		let cheap = Arc::new(MockProviderAdapter::new(
			"cheap",
			Capability::ChatCompletions,
			CostCents::new(0.5),
		));
		cheap.break_transport();
		let dear = Arc::new(MockProviderAdapter::new(
			"dear",
			Capability::ChatCompletions,
			CostCents::new(2.0),
		));

		let router = ArbitrageRouter::new(vec![cheap, dear]);
		let routed = router.route(&request()).await.unwrap();
		assert_eq!(routed.provider, "dear");
	}

	#[tokio::test]
	async fn unhealthy_providers_are_skipped() {
		let cheap = Arc::new(MockProviderAdapter::new(
			"cheap",
			Capability::ChatCompletions,
			CostCents::new(0.5),
		));
		cheap.mark_unhealthy();
		let dear = Arc::new(MockProviderAdapter::new(
			"dear",
			Capability::ChatCompletions,
			CostCents::new(2.0),
		));

		let router = ArbitrageRouter::new(vec![cheap.clone(), dear]);
		let routed = router.route(&request()).await.unwrap();
		assert_eq!(routed.provider, "dear");
		assert_eq!(cheap.invocations(), 0);
	}

	#[tokio::test]
	async fn exhausted_candidates_surface_no_provider_available() {
		let only = Arc::new(MockProviderAdapter::new(
			"only",
			Capability::ChatCompletions,
			CostCents::new(0.5),
		));
		only.break_transport();

		let router = ArbitrageRouter::new(vec![only]);
		let err = router.route(&request()).await.unwrap_err();
		assert!(matches!(err, PlatformError::NoProviderAvailable(_)));
	}

	#[tokio::test]
	async fn wrong_capability_is_not_considered() {
		let tts = Arc::new(MockProviderAdapter::new(
			"elevenlabs",
			Capability::Tts,
			CostCents::new(0.5),
		));
		let router = ArbitrageRouter::new(vec![tts]);
		let err = router.route(&request()).await.unwrap_err();
		assert!(matches!(
			err,
			PlatformError::NoProviderAvailable(Capability::ChatCompletions)
		));
	}
}
