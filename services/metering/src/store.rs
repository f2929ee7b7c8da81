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

use std::{
	collections::HashMap,
	sync::{Mutex, RwLock},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleet_primitives::{Cents, CostCents, TenantId};
use fleet_traits::{MeterSink, SpendQuery};
use fleet_types::{
	metering::{MeterEvent, MeterWindow, UsageFilter, UsageLine, UsageReport, WindowKey},
	Capability, PlatformError,
};
use fleet_utils::window::{day_start, month_start, window_start};
use serde::Serialize;

/// Per-period totals for one tenant.
#[derive(Debug, Clone, Serialize)]
pub struct UsageSummary {
	pub tenant: TenantId,
	pub today: Cents,
	pub this_month: Cents,
	pub total: Cents,
}

/// Event storage plus the window aggregator and the usage read side.
///
/// Events arrive in any order; aggregation only looks at timestamps,
/// so ingest order within a window is irrelevant. An event is folded
/// into its window exactly once because aggregation physically moves
/// it from `pending` to `aggregated`.
#[derive(Default)]
pub struct MeterStore {
	pending: Mutex<Vec<MeterEvent>>,
	aggregated: Mutex<Vec<MeterEvent>>,
	windows: RwLock<HashMap<WindowKey, MeterWindow>>,
}

impl MeterStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn ingest(&self, event: MeterEvent) {
		self.pending.lock().expect("pending lock poisoned").push(event);
	}

	/// All events of a tenant, aggregated or not. Test and audit
	/// surface; the usage endpoints go through the filter queries.
	pub fn events_for(&self, tenant: &TenantId) -> Vec<MeterEvent> {
		let mut events: Vec<MeterEvent> = self
			.aggregated
			.lock()
			.expect("aggregated lock poisoned")
			.iter()
			.chain(self.pending.lock().expect("pending lock poisoned").iter())
			.filter(|e| &e.tenant == tenant)
			.cloned()
			.collect();
		events.sort_by_key(|e| e.at);
		events
	}

	/// Fold every pending event with `at < boundary` into its window.
	/// Events at or after the boundary stay pending for the next run.
	pub fn aggregate_before(&self, boundary: DateTime<Utc>) -> usize {
		let ready: Vec<MeterEvent> = {
			let mut pending = self.pending.lock().expect("pending lock poisoned");
			let (ready, keep): (Vec<_>, Vec<_>) =
				pending.drain(..).partition(|e| e.at < boundary);
			*pending = keep;
			ready
		};

		let folded = ready.len();
		if folded == 0 {
			return 0;
		}

		{
			let mut windows = self.windows.write().expect("windows lock poisoned");
			for event in &ready {
				let key = WindowKey {
					tenant: event.tenant.clone(),
					capability: event.capability,
					provider: event.provider.clone(),
					window_start: window_start(event.at),
				};
				let window = windows.entry(key.clone()).or_insert_with(|| MeterWindow {
					key,
					total_cost: CostCents::ZERO,
					total_charge: Cents::ZERO,
					event_count: 0,
				});
				window.total_cost += event.cost;
				window.total_charge += event.charge;
				window.event_count += 1;
			}
		}

		self.aggregated.lock().expect("aggregated lock poisoned").extend(ready);
		folded
	}

	fn matches(event: &MeterEvent, filter: &UsageFilter) -> bool {
		if let Some(tenant) = &filter.tenant {
			if &event.tenant != tenant {
				return false;
			}
		}
		if let Some(capability) = filter.capability {
			if event.capability != capability {
				return false;
			}
		}
		if let Some(provider) = &filter.provider {
			if &event.provider != provider {
				return false;
			}
		}
		if let Some(start) = filter.start_date {
			if event.at < start {
				return false;
			}
		}
		if let Some(end) = filter.end_date {
			if event.at >= end {
				return false;
			}
		}
		true
	}

	fn filtered(&self, filter: &UsageFilter) -> Vec<MeterEvent> {
		self.aggregated
			.lock()
			.expect("aggregated lock poisoned")
			.iter()
			.chain(self.pending.lock().expect("pending lock poisoned").iter())
			.filter(|e| Self::matches(e, filter))
			.cloned()
			.collect()
	}

	/// Aggregated usage grouped by capability and provider.
	pub fn usage_report(&self, filter: &UsageFilter) -> UsageReport {
		let tenant = filter.tenant.clone().unwrap_or_else(|| TenantId::from("*"));
		let mut lines: HashMap<(Capability, String), UsageLine> = HashMap::new();
		let mut total_charge = Cents::ZERO;

		for event in self.filtered(filter) {
			total_charge += event.charge;
			let line = lines
				.entry((event.capability, event.provider.clone()))
				.or_insert_with(|| UsageLine {
					capability: event.capability,
					provider: event.provider.clone(),
					total_cost: CostCents::ZERO,
					total_charge: Cents::ZERO,
					event_count: 0,
				});
			line.total_cost += event.cost;
			line.total_charge += event.charge;
			line.event_count += 1;
		}

		let mut lines: Vec<UsageLine> = lines.into_values().collect();
		lines.sort_by(|a, b| {
			a.capability.cmp(&b.capability).then_with(|| a.provider.cmp(&b.provider))
		});

		UsageReport { tenant, lines, total_charge }
	}

	pub fn summary(&self, tenant: &TenantId, now: DateTime<Utc>) -> UsageSummary {
		let events = self.events_for(tenant);
		let day = day_start(now);
		let month = month_start(now);

		let mut today = Cents::ZERO;
		let mut this_month = Cents::ZERO;
		let mut total = Cents::ZERO;
		for event in &events {
			total += event.charge;
			if event.at >= day {
				today += event.charge;
			}
			if event.at >= month {
				this_month += event.charge;
			}
		}

		UsageSummary { tenant: tenant.clone(), today, this_month, total }
	}

	/// Historical windows, newest first. `limit` is clamped to 1000.
	pub fn history(&self, filter: &UsageFilter, limit: usize) -> Vec<MeterWindow> {
		let limit = limit.min(1000);
		let mut windows: Vec<MeterWindow> = self
			.windows
			.read()
			.expect("windows lock poisoned")
			.values()
			.filter(|w| {
				filter.tenant.as_ref().map_or(true, |t| &w.key.tenant == t)
					&& filter.capability.map_or(true, |c| w.key.capability == c)
					&& filter.provider.as_ref().map_or(true, |p| &w.key.provider == p)
			})
			.cloned()
			.collect();
		windows.sort_by(|a, b| b.key.window_start.cmp(&a.key.window_start));
		windows.truncate(limit);
		windows
	}
}

impl MeterSink for MeterStore {
	fn emit(&self, event: MeterEvent) {
		self.ingest(event);
	}
}

#[async_trait]
impl SpendQuery for MeterStore {
	async fn charged_since(
		&self,
		tenant: &TenantId,
		since: DateTime<Utc>,
	) -> Result<Cents, PlatformError> {
		Ok(self
			.events_for(tenant)
			.into_iter()
			.filter(|e| e.at >= since)
			.map(|e| e.charge)
			.sum())
	}
}

#[cfg(test)]
mod tests {
	use chrono::{Duration, TimeZone};

	use super::*;

	fn event(tenant: &str, provider: &str, at: DateTime<Utc>, charge: i64) -> MeterEvent {
		let mut event = MeterEvent::new(
			TenantId::from(tenant),
			Capability::ChatCompletions,
			provider,
			CostCents::new(charge as f64 / 1.3),
			Cents::new(charge),
		);
		event.at = at;
		event
	}

	fn minute(m: u32) -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2024, 6, 1, 12, m, 30).unwrap()
	}

	#[test]
	fn aggregation_is_idempotent_and_order_insensitive() {
		let store = MeterStore::new();
		// Out of timestamp order on purpose.
		store.ingest(event("t", "openrouter", minute(2), 10));
		store.ingest(event("t", "openrouter", minute(1), 5));
		store.ingest(event("t", "openrouter", minute(1), 7));

		let boundary = Utc.with_ymd_and_hms(2024, 6, 1, 12, 3, 0).unwrap();
		assert_eq!(store.aggregate_before(boundary), 3);
		// Re-running with the same boundary folds nothing twice.
		assert_eq!(store.aggregate_before(boundary), 0);

		let windows = store.history(&UsageFilter::default(), 100);
		assert_eq!(windows.len(), 2);
		let total: Cents = windows.iter().map(|w| w.total_charge).sum();
		assert_eq!(total, Cents::new(22));
	}

	#[test]
	fn events_at_or_after_the_boundary_stay_pending() {
		let store = MeterStore::new();
		store.ingest(event("t", "openrouter", minute(5), 10));

		let boundary = Utc.with_ymd_and_hms(2024, 6, 1, 12, 3, 0).unwrap();
		assert_eq!(store.aggregate_before(boundary), 0);
		assert_eq!(store.events_for(&TenantId::from("t")).len(), 1);
	}

	#[test]
	fn usage_report_groups_by_capability_and_provider() {
		let store = MeterStore::new();
		store.ingest(event("t", "openrouter", minute(1), 10));
		store.ingest(event("t", "openrouter", minute(2), 10));
		store.ingest(event("t", "deepgram", minute(2), 3));
		store.ingest(event("other", "openrouter", minute(2), 99));

		let filter = UsageFilter { tenant: Some(TenantId::from("t")), ..Default::default() };
		let report = store.usage_report(&filter);
		assert_eq!(report.total_charge, Cents::new(23));
		assert_eq!(report.lines.len(), 2);
	}

	#[tokio::test]
	async fn charged_since_only_counts_the_period() {
		let store = MeterStore::new();
		let now = minute(30);
		store.ingest(event("t", "openrouter", now - Duration::hours(30), 100));
		store.ingest(event("t", "openrouter", now - Duration::minutes(5), 40));

		let since_day = day_start(now);
		let charged = store.charged_since(&TenantId::from("t"), since_day).await.unwrap();
		assert_eq!(charged, Cents::new(40));
	}

	#[test]
	fn history_is_clamped_to_1000() {
		let store = MeterStore::new();
		store.ingest(event("t", "openrouter", minute(1), 1));
		store.aggregate_before(minute(10));
		assert_eq!(store.history(&UsageFilter::default(), 5000).len(), 1);
	}
}
