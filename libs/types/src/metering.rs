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

use chrono::{DateTime, Utc};
use fleet_primitives::{Cents, CostCents, TenantId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{tenant::Tier, Capability};

/// Unit attached to a meter event, e.g. 200 tokens or 42 seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeteredUnits {
	pub units: f64,
	pub unit_type: String,
}

/// One per-request cost event emitted by the gateway after a
/// successful upstream call. `cost` is wholesale (fractional cents
/// allowed), `charge` the integer cents billed to the tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeterEvent {
	pub id: Uuid,
	pub tenant: TenantId,
	pub capability: Capability,
	pub provider: String,
	pub cost: CostCents,
	pub charge: Cents,
	pub at: DateTime<Utc>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub units: Option<MeteredUnits>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub tier: Option<Tier>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub metadata: Option<serde_json::Value>,
}

impl MeterEvent {
	pub fn new(
		tenant: TenantId,
		capability: Capability,
		provider: impl Into<String>,
		cost: CostCents,
		charge: Cents,
	) -> Self {
		Self {
			id: Uuid::new_v4(),
			tenant,
			capability,
			provider: provider.into(),
			cost,
			charge,
			at: Utc::now(),
			units: None,
			tier: None,
			metadata: None,
		}
	}

	pub fn with_units(mut self, units: f64, unit_type: impl Into<String>) -> Self {
		self.units = Some(MeteredUnits { units, unit_type: unit_type.into() });
		self
	}

	pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
		self.metadata = Some(metadata);
		self
	}
}

/// Aggregation key: events fold into one window per tenant,
/// capability, provider and start minute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowKey {
	pub tenant: TenantId,
	pub capability: Capability,
	pub provider: String,
	pub window_start: DateTime<Utc>,
}

/// Rolled-up usage for one window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeterWindow {
	pub key: WindowKey,
	pub total_cost: CostCents,
	pub total_charge: Cents,
	pub event_count: u64,
}

/// Filters accepted by the usage endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsageFilter {
	pub tenant: Option<TenantId>,
	pub capability: Option<Capability>,
	pub provider: Option<String>,
	#[serde(rename = "startDate")]
	pub start_date: Option<DateTime<Utc>>,
	#[serde(rename = "endDate")]
	pub end_date: Option<DateTime<Utc>>,
}

/// Per-capability usage line in a report.
#[derive(Debug, Clone, Serialize)]
pub struct UsageLine {
	pub capability: Capability,
	pub provider: String,
	pub total_cost: CostCents,
	pub total_charge: Cents,
	pub event_count: u64,
}

/// Aggregated usage report for a tenant and period.
#[derive(Debug, Clone, Serialize)]
pub struct UsageReport {
	pub tenant: TenantId,
	pub lines: Vec<UsageLine>,
	pub total_charge: Cents,
}
