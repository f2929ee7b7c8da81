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

//! Tenant registry: tier, spend limits and the payment-processor
//! customer mapping. Balances live in the ledger, not here.

use dashmap::DashMap;
use fleet_primitives::TenantId;
use fleet_types::tenant::{SpendLimits, Tier};

#[derive(Debug, Clone, Default)]
pub struct TenantMeta {
	pub tier: Tier,
	pub spend_limits: SpendLimits,
	pub customer_id: Option<String>,
}

/// Unknown tenants read as defaults (free tier, no caps): a tenant
/// exists the moment a token for it exists.
#[derive(Default)]
pub struct TenantDirectory {
	tenants: DashMap<TenantId, TenantMeta>,
}

impl TenantDirectory {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn meta(&self, tenant: &TenantId) -> TenantMeta {
		self.tenants.get(tenant).map(|m| m.clone()).unwrap_or_default()
	}

	pub fn set_tier(&self, tenant: &TenantId, tier: Tier) {
		self.tenants.entry(tenant.clone()).or_default().tier = tier;
	}

	pub fn set_spend_limits(&self, tenant: &TenantId, limits: SpendLimits) {
		self.tenants.entry(tenant.clone()).or_default().spend_limits = limits;
	}

	/// Record the processor-side customer id. First writer wins; the
	/// processor only ever reports one customer per tenant.
	pub fn record_customer(&self, tenant: &TenantId, customer_id: &str) {
		let mut entry = self.tenants.entry(tenant.clone()).or_default();
		if entry.customer_id.is_none() {
			entry.customer_id = Some(customer_id.to_owned());
		}
	}

	pub fn customer_id(&self, tenant: &TenantId) -> Option<String> {
		self.tenants.get(tenant).and_then(|m| m.customer_id.clone())
	}
}

#[cfg(test)]
mod tests {
	use fleet_primitives::Cents;

	use super::*;

	#[test]
	fn unknown_tenants_read_as_defaults() {
		let directory = TenantDirectory::new();
		let meta = directory.meta(&TenantId::from("new"));
		assert_eq!(meta.tier, Tier::Free);
		assert_eq!(meta.spend_limits, SpendLimits::unlimited());
	}

	#[test]
	fn customer_id_is_write_once() {
		let directory = TenantDirectory::new();
		let t = TenantId::from("acme");
		directory.record_customer(&t, "cus_1");
		directory.record_customer(&t, "cus_2");
		assert_eq!(directory.customer_id(&t), Some("cus_1".to_owned()));
	}

	#[test]
	fn limits_are_per_tenant() {
		let directory = TenantDirectory::new();
		let t = TenantId::from("acme");
		directory.set_spend_limits(
			&t,
			SpendLimits { per_day: Some(Cents::new(100)), per_month: None },
		);
		assert_eq!(directory.meta(&t).spend_limits.per_day, Some(Cents::new(100)));
		assert_eq!(directory.meta(&TenantId::from("other")).spend_limits.per_day, None);
	}
}
