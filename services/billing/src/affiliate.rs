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

//! Affiliate codes and referral recording.

use dashmap::DashMap;
use fleet_primitives::TenantId;
use fleet_types::PlatformError;
use rand::Rng;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct AffiliateStats {
	pub code: String,
	pub referrals: usize,
}

#[derive(Default)]
pub struct AffiliateStore {
	/// code → owning tenant.
	codes: DashMap<String, TenantId>,
	/// tenant → its code.
	by_tenant: DashMap<TenantId, String>,
	/// code → referred tenants (each counted once).
	referrals: DashMap<String, Vec<TenantId>>,
}

impl AffiliateStore {
	pub fn new() -> Self {
		Self::default()
	}

	fn random_code() -> String {
		let mut rng = rand::thread_rng();
		(0..8)
			.map(|_| {
				let alphabet = b"abcdefghjkmnpqrstuvwxyz23456789";
				alphabet[rng.gen_range(0..alphabet.len())] as char
			})
			.collect()
	}

	/// Create (or return the existing) code for a tenant. An
	/// explicitly requested code that is already taken is a 409.
	pub fn create_code(
		&self,
		tenant: &TenantId,
		requested: Option<String>,
	) -> Result<String, PlatformError> {
		if let Some(existing) = self.by_tenant.get(tenant) {
			return Ok(existing.clone());
		}

		let code = match requested {
			Some(code) => {
				if self.codes.contains_key(&code) {
					return Err(PlatformError::Conflict(format!(
						"affiliate code {code:?} is taken"
					)));
				}
				code
			},
			None => loop {
				let code = Self::random_code();
				if !self.codes.contains_key(&code) {
					break code;
				}
			},
		};

		self.codes.insert(code.clone(), tenant.clone());
		self.by_tenant.insert(tenant.clone(), code.clone());
		Ok(code)
	}

	/// Record that `referred` signed up through `code`. Recording the
	/// same tenant twice is a no-op.
	pub fn record_referral(&self, code: &str, referred: &TenantId) -> Result<(), PlatformError> {
		if !self.codes.contains_key(code) {
			return Err(PlatformError::NotFound("affiliate code".into()));
		}
		let mut list = self.referrals.entry(code.to_owned()).or_default();
		if !list.contains(referred) {
			list.push(referred.clone());
		}
		Ok(())
	}

	pub fn stats(&self, tenant: &TenantId) -> Option<AffiliateStats> {
		let code = self.by_tenant.get(tenant)?.clone();
		let referrals = self.referrals.get(&code).map(|l| l.len()).unwrap_or(0);
		Some(AffiliateStats { code, referrals })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn codes_are_unique_and_stable_per_tenant() {
		let store = AffiliateStore::new();
		let t = TenantId::from("acme");

		let code = store.create_code(&t, Some("acme10".into())).unwrap();
		assert_eq!(store.create_code(&t, None).unwrap(), code);

		let err = store
			.create_code(&TenantId::from("other"), Some("acme10".into()))
			.unwrap_err();
		assert!(matches!(err, PlatformError::Conflict(_)));
	}

	#[test]
	fn referrals_count_each_tenant_once() {
		let store = AffiliateStore::new();
		let t = TenantId::from("acme");
		store.create_code(&t, Some("acme10".into())).unwrap();

		store.record_referral("acme10", &TenantId::from("r1")).unwrap();
		store.record_referral("acme10", &TenantId::from("r1")).unwrap();
		store.record_referral("acme10", &TenantId::from("r2")).unwrap();

		assert_eq!(store.stats(&t).unwrap().referrals, 2);
	}

	#[test]
	fn unknown_code_is_not_found() {
		let store = AffiliateStore::new();
		let err = store.record_referral("nope", &TenantId::from("r1")).unwrap_err();
		assert!(matches!(err, PlatformError::NotFound(_)));
	}
}
