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

//! # Credit ledger
//!
//! Append-only per-tenant accounting in integer cents. Every balance
//! mutation goes through [`CreditLedger::grant`] or
//! [`CreditLedger::debit`], both idempotent on `(kind, external_ref)`
//! and serialized per tenant, so the cached balance always equals the
//! sum of the tenant's entries.
//!
//! Debits may take a positive balance past zero exactly once (the
//! overshoot of a streaming response billed at stream end); an
//! already-exhausted tenant is rejected with `insufficient_credits`.
//! The zero crossing fires the registered exhaustion hook.

pub mod budget;
pub mod directory;

use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use fleet_primitives::{Cents, TenantId};
use fleet_traits::Ledger;
use fleet_types::{
	ledger::{DebitOutcome, GrantOutcome, LedgerEntry, LedgerEntryKind},
	PlatformError,
};
use tokio::sync::Mutex;
use tracing::info;

pub use budget::BudgetChecker;
pub use directory::TenantDirectory;

/// Callback invoked when a tenant's balance crosses zero.
pub type ExhaustionHook = dyn Fn(TenantId) + Send + Sync;

#[derive(Default)]
struct AccountState {
	balance: Cents,
	entries: Vec<LedgerEntry>,
	seen: HashSet<(LedgerEntryKind, String)>,
}

/// The in-process reference implementation of the ledger contract.
/// A SQL-backed implementation replaces the account map with a
/// row-locked balance table; the semantics here are the contract.
#[derive(Default)]
pub struct CreditLedger {
	accounts: DashMap<TenantId, Arc<Mutex<AccountState>>>,
	exhaustion_hook: std::sync::RwLock<Option<Arc<ExhaustionHook>>>,
}

impl CreditLedger {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register the hook fired on zero crossings. Replaces any
	/// previous hook.
	pub fn set_exhaustion_hook(&self, hook: impl Fn(TenantId) + Send + Sync + 'static) {
		*self.exhaustion_hook.write().expect("hook lock poisoned") = Some(Arc::new(hook));
	}

	fn account(&self, tenant: &TenantId) -> Arc<Mutex<AccountState>> {
		self.accounts.entry(tenant.clone()).or_default().clone()
	}

	/// Full entry history of a tenant, oldest first.
	pub async fn entries(&self, tenant: &TenantId) -> Vec<LedgerEntry> {
		self.account(tenant).lock().await.entries.clone()
	}

	fn fire_exhaustion(&self, tenant: &TenantId) {
		let hook = self.exhaustion_hook.read().expect("hook lock poisoned").clone();
		if let Some(hook) = hook {
			hook(tenant.clone());
		}
	}
}

#[async_trait]
impl Ledger for CreditLedger {
	async fn balance(&self, tenant: &TenantId) -> Result<Cents, PlatformError> {
		Ok(self.account(tenant).lock().await.balance)
	}

	async fn grant(
		&self,
		tenant: &TenantId,
		amount: Cents,
		kind: LedgerEntryKind,
		external_ref: &str,
	) -> Result<GrantOutcome, PlatformError> {
		if !amount.is_positive() {
			return Err(PlatformError::InvalidRequest(format!(
				"grant amount must be positive, got {amount}"
			)));
		}

		let account = self.account(tenant);
		let mut state = account.lock().await;

		let key = (kind, external_ref.to_owned());
		if state.seen.contains(&key) {
			return Ok(GrantOutcome { applied: false, balance_after: state.balance });
		}

		state.balance += amount;
		state.entries.push(LedgerEntry {
			tenant: tenant.clone(),
			amount,
			kind,
			external_ref: external_ref.to_owned(),
			at: Utc::now(),
		});
		state.seen.insert(key);

		info!(%tenant, %amount, ?kind, external_ref, "credit granted");
		Ok(GrantOutcome { applied: true, balance_after: state.balance })
	}

	async fn debit(
		&self,
		tenant: &TenantId,
		amount: Cents,
		kind: LedgerEntryKind,
		external_ref: &str,
	) -> Result<DebitOutcome, PlatformError> {
		if !amount.is_positive() {
			return Err(PlatformError::InvalidRequest(format!(
				"debit amount must be positive, got {amount}"
			)));
		}

		let account = self.account(tenant);
		let crossed_zero;
		let balance_after;
		{
			let mut state = account.lock().await;

			let key = (kind, external_ref.to_owned());
			if state.seen.contains(&key) {
				return Ok(DebitOutcome {
					applied: false,
					balance_after: state.balance,
					crossed_zero: false,
				});
			}

			let balance_before = state.balance;
			if !balance_before.is_positive() {
				return Err(PlatformError::InsufficientCredits);
			}

			state.balance -= amount;
			state.entries.push(LedgerEntry {
				tenant: tenant.clone(),
				amount: -amount,
				kind,
				external_ref: external_ref.to_owned(),
				at: Utc::now(),
			});
			state.seen.insert(key);

			balance_after = state.balance;
			crossed_zero = balance_before.is_positive() && !balance_after.is_positive();
		}

		if crossed_zero {
			info!(%tenant, "balance exhausted");
			self.fire_exhaustion(tenant);
		}

		Ok(DebitOutcome { applied: true, balance_after, crossed_zero })
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::*;

	fn tenant(id: &str) -> TenantId {
		TenantId::from(id)
	}

	#[tokio::test]
	async fn balance_equals_sum_of_entries() {
		let ledger = CreditLedger::new();
		let t = tenant("acme");

		ledger.grant(&t, Cents::new(500), LedgerEntryKind::Purchase, "p-1").await.unwrap();
		ledger.debit(&t, Cents::new(120), LedgerEntryKind::Debit, "d-1").await.unwrap();
		ledger.grant(&t, Cents::new(30), LedgerEntryKind::Refund, "r-1").await.unwrap();

		let sum: Cents = ledger.entries(&t).await.into_iter().map(|e| e.amount).sum();
		assert_eq!(ledger.balance(&t).await.unwrap(), sum);
		assert_eq!(sum, Cents::new(410));
	}

	#[tokio::test]
	async fn grant_is_idempotent_on_external_ref() {
		let ledger = CreditLedger::new();
		let t = tenant("acme");

		let first = ledger
			.grant(&t, Cents::new(2500), LedgerEntryKind::Purchase, "evt-1")
			.await
			.unwrap();
		assert!(first.applied);

		let second = ledger
			.grant(&t, Cents::new(2500), LedgerEntryKind::Purchase, "evt-1")
			.await
			.unwrap();
		assert!(!second.applied);
		assert_eq!(second.balance_after, Cents::new(2500));
		assert_eq!(ledger.entries(&t).await.len(), 1);
	}

	#[tokio::test]
	async fn same_ref_in_different_kinds_both_apply() {
		let ledger = CreditLedger::new();
		let t = tenant("acme");

		ledger.grant(&t, Cents::new(100), LedgerEntryKind::Purchase, "ref").await.unwrap();
		let refund = ledger.grant(&t, Cents::new(10), LedgerEntryKind::Refund, "ref").await.unwrap();
		assert!(refund.applied);
	}

	#[tokio::test]
	async fn debit_is_idempotent_on_external_ref() {
		let ledger = CreditLedger::new();
		let t = tenant("acme");
		ledger.grant(&t, Cents::new(100), LedgerEntryKind::Purchase, "p").await.unwrap();

		let first = ledger.debit(&t, Cents::new(40), LedgerEntryKind::Debit, "req-1").await.unwrap();
		assert!(first.applied);

		let replay = ledger.debit(&t, Cents::new(40), LedgerEntryKind::Debit, "req-1").await.unwrap();
		assert!(!replay.applied);
		assert_eq!(replay.balance_after, Cents::new(60));
	}

	#[tokio::test]
	async fn exhausted_tenant_is_rejected() {
		let ledger = CreditLedger::new();
		let t = tenant("acme");

		let err = ledger.debit(&t, Cents::new(1), LedgerEntryKind::Debit, "d").await.unwrap_err();
		assert!(matches!(err, PlatformError::InsufficientCredits));
	}

	#[tokio::test]
	async fn crossing_zero_fires_the_hook_once() {
		let ledger = Arc::new(CreditLedger::new());
		let fired = Arc::new(AtomicUsize::new(0));
		{
			let fired = fired.clone();
			ledger.set_exhaustion_hook(move |_| {
				fired.fetch_add(1, Ordering::SeqCst);
			});
		}

		let t = tenant("acme");
		ledger.grant(&t, Cents::new(50), LedgerEntryKind::Purchase, "p").await.unwrap();

		let out = ledger.debit(&t, Cents::new(70), LedgerEntryKind::Debit, "d-1").await.unwrap();
		assert!(out.crossed_zero);
		assert_eq!(out.balance_after, Cents::new(-20));
		assert_eq!(fired.load(Ordering::SeqCst), 1);

		// Already exhausted: no further crossing, no further hook.
		let err = ledger.debit(&t, Cents::new(10), LedgerEntryKind::Debit, "d-2").await.unwrap_err();
		assert!(matches!(err, PlatformError::InsufficientCredits));
		assert_eq!(fired.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn concurrent_debits_sum_exactly() {
		let ledger = Arc::new(CreditLedger::new());
		let t = tenant("acme");
		ledger.grant(&t, Cents::new(1000), LedgerEntryKind::Purchase, "p").await.unwrap();

		let handles: Vec<_> = (0..25)
			.map(|i| {
				let ledger = ledger.clone();
				let t = t.clone();
				tokio::spawn(async move {
					ledger
						.debit(&t, Cents::new(50), LedgerEntryKind::Debit, &format!("d-{i}"))
						.await
				})
			})
			.collect();

		let mut applied = 0;
		let mut rejected = 0;
		for handle in handles {
			match handle.await.unwrap() {
				Ok(out) if out.applied => applied += 1,
				Ok(_) => unreachable!("all refs are distinct"),
				Err(PlatformError::InsufficientCredits) => rejected += 1,
				Err(other) => panic!("unexpected error: {other}"),
			}
		}

		// 1000¢ / 50¢ = exactly 20 successes; the rest rejected.
		assert_eq!(applied, 20);
		assert_eq!(rejected, 5);
		assert_eq!(ledger.balance(&t).await.unwrap(), Cents::ZERO);

		let sum: Cents = ledger.entries(&t).await.into_iter().map(|e| e.amount).sum();
		assert_eq!(sum, Cents::ZERO);
	}

	#[tokio::test]
	async fn grants_must_be_positive() {
		let ledger = CreditLedger::new();
		let t = tenant("acme");
		let err = ledger
			.grant(&t, Cents::new(-5), LedgerEntryKind::Adjustment, "a")
			.await
			.unwrap_err();
		assert!(matches!(err, PlatformError::InvalidRequest(_)));
	}
}
