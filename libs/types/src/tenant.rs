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

use fleet_primitives::{Cents, TenantId};
use serde::{Deserialize, Serialize};

/// Pricing/quota tier of a tenant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
	#[default]
	Free,
	Pro,
	Enterprise,
}

impl Tier {
	pub const fn as_str(&self) -> &'static str {
		match self {
			Tier::Free => "free",
			Tier::Pro => "pro",
			Tier::Enterprise => "enterprise",
		}
	}

	/// Tenant-deletable snapshot allowance for this tier.
	pub const fn snapshot_quota(&self) -> u32 {
		match self {
			Tier::Free => 2,
			Tier::Pro => 10,
			Tier::Enterprise => 50,
		}
	}
}

/// Optional per-period spend caps, in cents of *charge*. Unset caps
/// are unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendLimits {
	pub per_day: Option<Cents>,
	pub per_month: Option<Cents>,
}

impl SpendLimits {
	pub const fn unlimited() -> Self {
		Self { per_day: None, per_month: None }
	}
}

/// Billing-facing view of a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
	pub id: TenantId,
	pub balance: Cents,
	#[serde(default)]
	pub spend_limits: SpendLimits,
	#[serde(default)]
	pub tier: Tier,
	/// Payment-processor customer id, recorded on first checkout.
	#[serde(default)]
	pub customer_id: Option<String>,
}
