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
use fleet_primitives::{Cents, TenantId};
use fleet_types::{
	ledger::{DebitOutcome, GrantOutcome, LedgerEntryKind},
	PlatformError,
};

/// Callback fired once when a debit takes a tenant's balance from
/// positive to zero or below. Must never fail the debit.
pub type ExhaustionHook = dyn Fn(TenantId) + Send + Sync;

/// Contract of the append-only credit ledger.
///
/// All operations are idempotent on `(kind, external_ref)` and
/// serialize per tenant: two concurrent writes against the same
/// tenant observe each other's balance.
#[async_trait]
pub trait Ledger: Send + Sync {
	async fn balance(&self, tenant: &TenantId) -> Result<Cents, PlatformError>;

	/// Credit `amount` cents. A grant may not take the balance
	/// negative; `amount` must be positive.
	async fn grant(
		&self,
		tenant: &TenantId,
		amount: Cents,
		kind: LedgerEntryKind,
		external_ref: &str,
	) -> Result<GrantOutcome, PlatformError>;

	/// Debit `amount` cents. Rejected with `insufficient_credits`
	/// when the balance is already zero or below; a positive balance
	/// may be taken past zero exactly once (streaming overshoot),
	/// which sets `crossed_zero`.
	async fn debit(
		&self,
		tenant: &TenantId,
		amount: Cents,
		kind: LedgerEntryKind,
		external_ref: &str,
	) -> Result<DebitOutcome, PlatformError>;
}
