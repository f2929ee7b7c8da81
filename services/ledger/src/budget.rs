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

//! Synchronous pre-call budget gate.
//!
//! Consulted by every gateway handler before an upstream call is
//! placed. Reads are allowed to be slightly stale; the ledger debit
//! after the call remains the authority.

use std::sync::Arc;

use fleet_primitives::TenantId;
use fleet_traits::{Clock, Ledger, SpendQuery};
use fleet_types::{tenant::SpendLimits, PlatformError};
use fleet_utils::window::{day_start, month_start};

pub struct BudgetChecker {
	ledger: Arc<dyn Ledger>,
	spend: Arc<dyn SpendQuery>,
	clock: Arc<dyn Clock>,
}

impl BudgetChecker {
	pub fn new(ledger: Arc<dyn Ledger>, spend: Arc<dyn SpendQuery>, clock: Arc<dyn Clock>) -> Self {
		Self { ledger, spend, clock }
	}

	/// Deny with `402 insufficient_credits` when the balance is gone,
	/// `429 spend_limit_exceeded` when a per-period cap is reached.
	pub async fn check(
		&self,
		tenant: &TenantId,
		limits: &SpendLimits,
	) -> Result<(), PlatformError> {
		let balance = self.ledger.balance(tenant).await?;
		if !balance.is_positive() {
			return Err(PlatformError::InsufficientCredits);
		}

		let now = self.clock.now();
		if let Some(cap) = limits.per_day {
			let spent = self.spend.charged_since(tenant, day_start(now)).await?;
			if spent >= cap {
				return Err(PlatformError::SpendLimitExceeded);
			}
		}
		if let Some(cap) = limits.per_month {
			let spent = self.spend.charged_since(tenant, month_start(now)).await?;
			if spent >= cap {
				return Err(PlatformError::SpendLimitExceeded);
			}
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use async_trait::async_trait;
	use chrono::{DateTime, Utc};
	use fleet_primitives::Cents;
	use fleet_traits::SystemClock;
	use fleet_types::ledger::LedgerEntryKind;

	use super::*;
	use crate::CreditLedger;

	struct FixedSpend(Cents);

	#[async_trait]
	impl SpendQuery for FixedSpend {
		async fn charged_since(
			&self,
			_tenant: &TenantId,
			_since: DateTime<Utc>,
		) -> Result<Cents, PlatformError> {
			Ok(self.0)
		}
	}

	fn checker(ledger: Arc<CreditLedger>, spent: Cents) -> BudgetChecker {
		BudgetChecker::new(ledger, Arc::new(FixedSpend(spent)), Arc::new(SystemClock))
	}

	#[tokio::test]
	async fn zero_balance_is_denied_with_insufficient_credits() {
		let ledger = Arc::new(CreditLedger::new());
		let gate = checker(ledger, Cents::ZERO);

		let err = gate.check(&TenantId::from("t"), &SpendLimits::unlimited()).await.unwrap_err();
		assert!(matches!(err, PlatformError::InsufficientCredits));
	}

	#[tokio::test]
	async fn daily_cap_is_denied_with_spend_limit() {
		let ledger = Arc::new(CreditLedger::new());
		let t = TenantId::from("t");
		ledger.grant(&t, Cents::new(1000), LedgerEntryKind::Purchase, "p").await.unwrap();

		let gate = checker(ledger, Cents::new(500));
		let limits = SpendLimits { per_day: Some(Cents::new(500)), per_month: None };

		let err = gate.check(&t, &limits).await.unwrap_err();
		assert!(matches!(err, PlatformError::SpendLimitExceeded));
	}

	#[tokio::test]
	async fn under_cap_with_balance_is_allowed() {
		let ledger = Arc::new(CreditLedger::new());
		let t = TenantId::from("t");
		ledger.grant(&t, Cents::new(1000), LedgerEntryKind::Purchase, "p").await.unwrap();

		let gate = checker(ledger, Cents::new(100));
		let limits =
			SpendLimits { per_day: Some(Cents::new(500)), per_month: Some(Cents::new(5000)) };

		assert!(gate.check(&t, &limits).await.is_ok());
	}
}
