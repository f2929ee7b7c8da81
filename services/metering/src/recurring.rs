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

//! Recurring-billing tracker.
//!
//! Phone-number provisioning enrolls the number here; a periodic
//! sweep debits each enrolled item when due and advances it one
//! billing period. The debit reference includes the due timestamp,
//! so a sweep retried after a crash is idempotent.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use fleet_primitives::{Cents, CostCents, TenantId};
use fleet_traits::{Ledger, MeterSink};
use fleet_types::{
	ledger::LedgerEntryKind,
	metering::MeterEvent,
	Capability, PlatformError,
};
use tracing::{info, warn};
use uuid::Uuid;

const BILLING_PERIOD_DAYS: i64 = 30;

#[derive(Debug, Clone)]
pub struct RecurringItem {
	pub id: Uuid,
	pub tenant: TenantId,
	/// External handle, e.g. the provider's number sid. Cancellation
	/// keys off this.
	pub reference: String,
	pub capability: Capability,
	/// Wholesale cost per period.
	pub cost: CostCents,
	pub margin: f64,
	pub next_due: DateTime<Utc>,
}

#[derive(Default)]
pub struct RecurringCharges {
	items: Mutex<Vec<RecurringItem>>,
}

impl RecurringCharges {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn enroll(
		&self,
		tenant: TenantId,
		reference: impl Into<String>,
		capability: Capability,
		cost: CostCents,
		margin: f64,
		first_due: DateTime<Utc>,
	) -> Uuid {
		let item = RecurringItem {
			id: Uuid::new_v4(),
			tenant,
			reference: reference.into(),
			capability,
			cost,
			margin,
			next_due: first_due,
		};
		let id = item.id;
		self.items.lock().expect("items lock poisoned").push(item);
		id
	}

	/// Drop the enrollment behind `reference` (number released).
	pub fn cancel(&self, reference: &str) -> bool {
		let mut items = self.items.lock().expect("items lock poisoned");
		let before = items.len();
		items.retain(|item| item.reference != reference);
		items.len() != before
	}

	pub fn enrolled(&self, tenant: &TenantId) -> Vec<RecurringItem> {
		self.items
			.lock()
			.expect("items lock poisoned")
			.iter()
			.filter(|item| &item.tenant == tenant)
			.cloned()
			.collect()
	}

	/// Bill every due item once and schedule the next period. Debit
	/// failures (exhausted tenants) leave the item due so the next
	/// sweep retries it.
	pub async fn run_due(
		&self,
		now: DateTime<Utc>,
		ledger: &dyn Ledger,
		meter: &dyn MeterSink,
	) -> Result<usize, PlatformError> {
		let due: Vec<RecurringItem> = self
			.items
			.lock()
			.expect("items lock poisoned")
			.iter()
			.filter(|item| item.next_due <= now)
			.cloned()
			.collect();

		let mut billed = 0;
		for item in due {
			let charge = item.cost.charge(item.margin);
			let external_ref =
				format!("recurring-{}-{}", item.reference, item.next_due.timestamp());
			match ledger
				.debit(&item.tenant, charge, LedgerEntryKind::Debit, &external_ref)
				.await
			{
				Ok(_) => {
					meter.emit(
						MeterEvent::new(
							item.tenant.clone(),
							item.capability,
							"twilio",
							item.cost,
							charge,
						)
						.with_metadata(serde_json::json!({ "reference": item.reference })),
					);
					let mut items = self.items.lock().expect("items lock poisoned");
					if let Some(stored) = items.iter_mut().find(|i| i.id == item.id) {
						stored.next_due += Duration::days(BILLING_PERIOD_DAYS);
					}
					billed += 1;
					info!(tenant = %item.tenant, reference = %item.reference, "recurring charge billed");
				},
				Err(err) => {
					warn!(
						tenant = %item.tenant,
						reference = %item.reference,
						%err,
						"recurring charge failed, will retry next sweep"
					);
				},
			}
		}
		Ok(billed)
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use fleet_ledger::CreditLedger;
	use fleet_traits::Ledger as _;
	use fleet_types::metering::MeterEvent;

	use super::*;

	#[derive(Default)]
	struct Sink(Mutex<Vec<MeterEvent>>);

	impl MeterSink for Sink {
		fn emit(&self, event: MeterEvent) {
			self.0.lock().unwrap().push(event);
		}
	}

	#[tokio::test]
	async fn due_items_bill_once_and_advance() {
		let ledger = Arc::new(CreditLedger::new());
		let tenant = TenantId::from("t");
		ledger
			.grant(&tenant, Cents::new(10_000), LedgerEntryKind::Purchase, "p")
			.await
			.unwrap();

		let charges = RecurringCharges::new();
		let now = Utc::now();
		charges.enroll(
			tenant.clone(),
			"PN123",
			Capability::PhoneNumberMonthly,
			CostCents::new(100.0),
			1.3,
			now,
		);

		let sink = Sink::default();
		assert_eq!(charges.run_due(now, ledger.as_ref(), &sink).await.unwrap(), 1);
		assert_eq!(ledger.balance(&tenant).await.unwrap(), Cents::new(10_000 - 130));
		assert_eq!(sink.0.lock().unwrap().len(), 1);

		// Same sweep again: the item moved a period ahead.
		assert_eq!(charges.run_due(now, ledger.as_ref(), &sink).await.unwrap(), 0);
	}

	#[tokio::test]
	async fn cancelled_items_stop_billing() {
		let ledger = Arc::new(CreditLedger::new());
		let tenant = TenantId::from("t");
		ledger.grant(&tenant, Cents::new(1000), LedgerEntryKind::Purchase, "p").await.unwrap();

		let charges = RecurringCharges::new();
		let now = Utc::now();
		charges.enroll(
			tenant.clone(),
			"PN123",
			Capability::PhoneNumberMonthly,
			CostCents::new(100.0),
			1.3,
			now,
		);
		assert!(charges.cancel("PN123"));

		let sink = Sink::default();
		assert_eq!(charges.run_due(now, ledger.as_ref(), &sink).await.unwrap(), 0);
		assert_eq!(ledger.balance(&tenant).await.unwrap(), Cents::new(1000));
	}
}
