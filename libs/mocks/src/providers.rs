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

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use fleet_primitives::CostCents;
use fleet_traits::ProviderAdapter;
use fleet_types::{
	routing::{ProviderResponse, RouteRequest, TokenUsage},
	Capability, PlatformError,
};

/// Provider adapter with a fixed estimate and a canned response.
pub struct MockProviderAdapter {
	name: &'static str,
	capability: Capability,
	cost: CostCents,
	body: serde_json::Value,
	usage: Option<TokenUsage>,
	fail_transport: AtomicBool,
	healthy: AtomicBool,
	invocations: AtomicUsize,
}

impl MockProviderAdapter {
	pub fn new(name: &'static str, capability: Capability, cost: CostCents) -> Self {
		Self {
			name,
			capability,
			cost,
			body: serde_json::json!({ "provider": name }),
			usage: None,
			fail_transport: AtomicBool::new(false),
			healthy: AtomicBool::new(true),
			invocations: AtomicUsize::new(0),
		}
	}

	pub fn with_body(mut self, body: serde_json::Value) -> Self {
		self.body = body;
		self
	}

	pub fn with_usage(mut self, usage: TokenUsage) -> Self {
		self.usage = Some(usage);
		self
	}

	/// Make every invoke fail at the transport level so the router
	/// fails over to the next candidate.
	pub fn break_transport(&self) {
		self.fail_transport.store(true, Ordering::SeqCst);
	}

	pub fn mark_unhealthy(&self) {
		self.healthy.store(false, Ordering::SeqCst);
	}

	pub fn invocations(&self) -> usize {
		self.invocations.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl ProviderAdapter for MockProviderAdapter {
	fn name(&self) -> &'static str {
		self.name
	}

	fn capability(&self) -> Capability {
		self.capability
	}

	async fn estimate(&self, _request: &RouteRequest) -> Result<CostCents, PlatformError> {
		Ok(self.cost)
	}

	async fn invoke(&self, _request: &RouteRequest) -> Result<ProviderResponse, PlatformError> {
		self.invocations.fetch_add(1, Ordering::SeqCst);
		if self.fail_transport.load(Ordering::SeqCst) {
			return Err(PlatformError::UpstreamUnreachable);
		}
		Ok(ProviderResponse {
			status: 200,
			body: self.body.clone(),
			cost_hint: Some(self.cost),
			usage: self.usage,
		})
	}

	async fn healthy(&self) -> bool {
		self.healthy.load(Ordering::SeqCst)
	}
}
