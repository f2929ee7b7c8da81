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
use fleet_primitives::{Cents, TenantId};
use serde::{Deserialize, Serialize};

/// Kind of a ledger entry. The external reference is unique *within*
/// a kind, so a purchase and a refund may legally share a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerEntryKind {
	Purchase,
	Debit,
	Adjustment,
	Refund,
}

/// One append-only row of the credit ledger. `amount` is signed:
/// positive for grants, negative for debits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
	pub tenant: TenantId,
	pub amount: Cents,
	pub kind: LedgerEntryKind,
	pub external_ref: String,
	pub at: DateTime<Utc>,
}

/// Result of a grant. `applied = false` means the external reference
/// was seen before and the ledger is unchanged.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GrantOutcome {
	pub applied: bool,
	pub balance_after: Cents,
}

/// Result of a debit. `crossed_zero` is true exactly when this entry
/// took a positive balance to zero or below; it triggers the
/// exhaustion hook once per crossing.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DebitOutcome {
	pub applied: bool,
	pub balance_after: Cents,
	pub crossed_zero: bool,
}
