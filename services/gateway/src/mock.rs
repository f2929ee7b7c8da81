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

//! Test harness wiring a full gateway against in-memory seams.

use std::sync::Arc;

use axum::Router;
use fleet_catalog::{ArbitrageRouter, RateCatalog};
use fleet_ledger::{BudgetChecker, CreditLedger, TenantDirectory};
use fleet_metering::{MeterStore, RecurringCharges};
use fleet_primitives::{TenantId, TokenScope};
use fleet_traits::{ProviderAdapter, SystemClock};

use crate::{auth::AuthContext, phone::NumberStore, GatewayConfig, GatewayDeps, TokenTable};

pub(crate) const WRITE_TOKEN: &str = "acme-write-secret";
pub(crate) const READ_TOKEN: &str = "acme-read-secret";

pub(crate) struct Harness {
	pub deps: Arc<GatewayDeps>,
	pub ledger: Arc<CreditLedger>,
	pub store: Arc<MeterStore>,
	pub app: Router,
}

pub(crate) fn tenant() -> TenantId {
	TenantId::from("acme")
}

pub(crate) fn harness(
	adapters: Vec<Arc<dyn ProviderAdapter>>,
	config: GatewayConfig,
) -> Harness {
	let ledger = Arc::new(CreditLedger::new());
	let store = Arc::new(MeterStore::new());
	let budget = Arc::new(BudgetChecker::new(
		ledger.clone(),
		store.clone(),
		Arc::new(SystemClock),
	));

	let deps = Arc::new(GatewayDeps {
		ledger: ledger.clone(),
		budget,
		meter: store.clone(),
		directory: Arc::new(TenantDirectory::new()),
		router: Arc::new(ArbitrageRouter::new(adapters)),
		catalog: Arc::new(RateCatalog::standard()),
		recurring: Arc::new(RecurringCharges::new()),
		numbers: NumberStore::new(),
		http: reqwest::Client::new(),
		config,
	});

	let mut tokens = TokenTable::default();
	tokens.insert(WRITE_TOKEN, AuthContext { tenant: tenant(), scope: TokenScope::Write });
	tokens.insert(READ_TOKEN, AuthContext { tenant: tenant(), scope: TokenScope::Read });

	let app = crate::router(deps.clone(), Arc::new(tokens));
	Harness { deps, ledger, store, app }
}
