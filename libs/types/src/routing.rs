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

use fleet_primitives::{CostCents, TenantId};
use serde::{Deserialize, Serialize};

use crate::{tenant::Tier, Capability};

/// Token counts reported by an upstream response.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
	#[serde(default)]
	pub prompt_tokens: u64,
	#[serde(default)]
	pub completion_tokens: u64,
	#[serde(default)]
	pub total_tokens: u64,
}

/// A call the arbitrage router is asked to place.
#[derive(Debug, Clone)]
pub struct RouteRequest {
	pub capability: Capability,
	pub tenant: TenantId,
	pub tier: Tier,
	pub body: serde_json::Value,
	pub model_hint: Option<String>,
	/// Tenant supplied its own upstream credential for this call.
	pub byok: bool,
}

impl RouteRequest {
	pub fn new(capability: Capability, tenant: TenantId, body: serde_json::Value) -> Self {
		let model_hint = body.get("model").and_then(|m| m.as_str()).map(str::to_owned);
		Self { capability, tenant, tier: Tier::Free, body, model_hint, byok: false }
	}
}

/// Normalized upstream response as returned by a provider adapter.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
	pub status: u16,
	pub body: serde_json::Value,
	/// Wholesale cost parsed from response hints, when available.
	pub cost_hint: Option<CostCents>,
	pub usage: Option<TokenUsage>,
}

/// Successful routed call: which provider answered and at what cost.
#[derive(Debug, Clone)]
pub struct RoutedCall {
	pub provider: String,
	pub cost: CostCents,
	pub response: ProviderResponse,
}
