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

use async_trait::async_trait;
use fleet_primitives::CostCents;
use fleet_types::{
	routing::{ProviderResponse, RouteRequest},
	Capability, PlatformError,
};

/// Adapter over one upstream vendor for one capability.
///
/// The arbitrage router asks every eligible adapter to estimate and
/// invokes the cheapest healthy one; on transport failure it advances
/// to the next candidate.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
	fn name(&self) -> &'static str;

	fn capability(&self) -> Capability;

	/// Whether this adapter can serve the request at all (model hint,
	/// tier, BYOK requirements). Ineligible adapters are skipped
	/// before estimation.
	fn eligible(&self, request: &RouteRequest) -> bool {
		let _ = request;
		true
	}

	/// Estimated wholesale cost of serving `request`.
	async fn estimate(&self, request: &RouteRequest) -> Result<CostCents, PlatformError>;

	/// Place the call. Transport-level failures must surface as
	/// `PlatformError::UpstreamUnreachable` so the router can fail
	/// over; upstream HTTP errors surface as `PlatformError::Upstream`
	/// and end the routing attempt.
	async fn invoke(&self, request: &RouteRequest) -> Result<ProviderResponse, PlatformError>;

	/// Cheap health probe consulted between estimate and invoke.
	async fn healthy(&self) -> bool {
		true
	}
}
