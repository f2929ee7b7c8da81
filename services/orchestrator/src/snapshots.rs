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

//! Tenant-owned bot snapshots. Blob contents live in the object
//! store; this tracks the records, the per-tier on-demand quota and
//! the deletability rule (nightly snapshots expire, tenants cannot
//! delete them).

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use fleet_primitives::{BotId, TenantId};
use fleet_types::{
	profile::{Snapshot, SnapshotKind},
	tenant::Tier,
	PlatformError,
};
use uuid::Uuid;

/// Nightly snapshots are kept for a week.
const NIGHTLY_RETENTION_DAYS: i64 = 7;

#[derive(Default)]
pub struct SnapshotStore {
	snapshots: DashMap<BotId, Vec<Snapshot>>,
}

impl SnapshotStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn create(
		&self,
		bot: BotId,
		tenant: &TenantId,
		tier: Tier,
		kind: SnapshotKind,
		storage_path: impl Into<String>,
		size_bytes: u64,
	) -> Result<Snapshot, PlatformError> {
		let mut entry = self.snapshots.entry(bot).or_default();

		if kind == SnapshotKind::OnDemand {
			let current =
				entry.iter().filter(|s| s.kind == SnapshotKind::OnDemand).count() as u32;
			let max = tier.snapshot_quota();
			if current >= max {
				return Err(PlatformError::SnapshotQuotaExceeded {
					current,
					max,
					tier: tier.as_str().to_owned(),
				});
			}
		}

		let now = Utc::now();
		let snapshot = Snapshot {
			id: Uuid::new_v4(),
			bot,
			tenant: tenant.clone(),
			kind,
			storage_path: storage_path.into(),
			size_bytes,
			created_at: now,
			expires_at: match kind {
				SnapshotKind::Nightly => Some(now + Duration::days(NIGHTLY_RETENTION_DAYS)),
				SnapshotKind::OnDemand => None,
			},
		};
		entry.push(snapshot.clone());
		Ok(snapshot)
	}

	pub fn list(&self, bot: BotId) -> Vec<Snapshot> {
		self.snapshots.get(&bot).map(|s| s.clone()).unwrap_or_default()
	}

	/// Tenant-initiated delete: only on-demand snapshots, only the
	/// owner.
	pub fn delete(
		&self,
		bot: BotId,
		snapshot_id: Uuid,
		tenant: &TenantId,
	) -> Result<(), PlatformError> {
		let mut entry = self
			.snapshots
			.get_mut(&bot)
			.ok_or_else(|| PlatformError::NotFound("snapshot".into()))?;

		let index = entry
			.iter()
			.position(|s| s.id == snapshot_id)
			.ok_or_else(|| PlatformError::NotFound("snapshot".into()))?;

		let snapshot = &entry[index];
		if &snapshot.tenant != tenant {
			return Err(PlatformError::Forbidden("snapshot belongs to another tenant".into()));
		}
		if snapshot.kind != SnapshotKind::OnDemand {
			return Err(PlatformError::Forbidden(
				"nightly snapshots expire on their own".into(),
			));
		}

		entry.remove(index);
		Ok(())
	}

	/// Scheduled sweep: drop expired records.
	pub fn prune_expired(&self, now: DateTime<Utc>) -> usize {
		let mut pruned = 0;
		for mut entry in self.snapshots.iter_mut() {
			let before = entry.len();
			entry.retain(|s| s.expires_at.map_or(true, |at| at > now));
			pruned += before - entry.len();
		}
		pruned
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn on_demand_quota_is_enforced_per_tier() {
		let store = SnapshotStore::new();
		let bot = BotId::generate();
		let tenant = TenantId::from("acme");

		for i in 0..2 {
			store
				.create(bot, &tenant, Tier::Free, SnapshotKind::OnDemand, format!("s3://{i}"), 10)
				.unwrap();
		}

		let err = store
			.create(bot, &tenant, Tier::Free, SnapshotKind::OnDemand, "s3://3", 10)
			.unwrap_err();
		match err {
			PlatformError::SnapshotQuotaExceeded { current, max, tier } => {
				assert_eq!((current, max), (2, 2));
				assert_eq!(tier, "free");
			},
			other => panic!("unexpected error: {other}"),
		}

		// Nightly snapshots are not counted against the quota.
		store
			.create(bot, &tenant, Tier::Free, SnapshotKind::Nightly, "s3://n", 10)
			.unwrap();
	}

	#[test]
	fn only_on_demand_snapshots_are_tenant_deletable() {
		let store = SnapshotStore::new();
		let bot = BotId::generate();
		let tenant = TenantId::from("acme");

		let on_demand = store
			.create(bot, &tenant, Tier::Pro, SnapshotKind::OnDemand, "s3://od", 10)
			.unwrap();
		let nightly = store
			.create(bot, &tenant, Tier::Pro, SnapshotKind::Nightly, "s3://n", 10)
			.unwrap();

		assert!(matches!(
			store.delete(bot, nightly.id, &tenant),
			Err(PlatformError::Forbidden(_))
		));
		store.delete(bot, on_demand.id, &tenant).unwrap();

		// Another tenant cannot delete what it does not own.
		let other = store
			.create(bot, &tenant, Tier::Pro, SnapshotKind::OnDemand, "s3://od2", 10)
			.unwrap();
		assert!(matches!(
			store.delete(bot, other.id, &TenantId::from("globex")),
			Err(PlatformError::Forbidden(_))
		));
	}

	#[test]
	fn nightly_snapshots_expire() {
		let store = SnapshotStore::new();
		let bot = BotId::generate();
		let tenant = TenantId::from("acme");
		store.create(bot, &tenant, Tier::Pro, SnapshotKind::Nightly, "s3://n", 10).unwrap();

		assert_eq!(store.prune_expired(Utc::now() + Duration::days(8)), 1);
		assert!(store.list(bot).is_empty());
	}
}
