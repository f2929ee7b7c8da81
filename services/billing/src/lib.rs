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

//! # Billing
//!
//! Signature-verified, replay-protected, idempotent crediting from
//! the payment processor, plus the tenant-facing billing surface
//! (checkout, portal, usage reports, affiliates).

pub mod affiliate;
pub mod handlers;
pub mod stripe;
pub mod webhook;

pub use affiliate::AffiliateStore;
pub use stripe::StripeProcessor;
pub use webhook::{WebhookIngestor, WebhookReceipt};

use std::sync::Arc;

use axum::{
	middleware,
	routing::{delete, get, post},
	Router,
};
use fleet_gateway::{auth, TokenTable};
use fleet_ledger::TenantDirectory;
use fleet_metering::MeterStore;
use fleet_traits::{Ledger, PaymentProcessor};

/// Dependencies of the billing handlers.
pub struct BillingDeps {
	pub ingestor: Arc<WebhookIngestor>,
	pub processor: Arc<dyn PaymentProcessor>,
	pub ledger: Arc<dyn Ledger>,
	pub directory: Arc<TenantDirectory>,
	pub usage: Arc<MeterStore>,
	pub affiliates: Arc<AffiliateStore>,
}

/// `/billing/*`. The webhook route authenticates with the processor
/// signature instead of a bearer token and is mounted outside the
/// auth layer.
pub fn router(deps: Arc<BillingDeps>, tokens: Arc<TokenTable>) -> Router {
	let bearer = Router::new()
		.route("/billing/credits/checkout", post(handlers::create_checkout))
		.route("/billing/portal", post(handlers::create_portal))
		.route("/billing/setup-intent", post(handlers::create_setup_intent))
		.route("/billing/payment-methods/:id", delete(handlers::detach_payment_method))
		.route("/billing/usage", get(handlers::usage))
		.route("/billing/usage/summary", get(handlers::usage_summary))
		.route("/billing/usage/history", get(handlers::usage_history))
		.route(
			"/billing/affiliate",
			get(handlers::affiliate_stats).post(handlers::create_affiliate_code),
		)
		.route("/billing/affiliate/referrals", post(handlers::record_referral))
		.layer(middleware::from_fn_with_state(tokens, auth::require_bearer));

	let webhook = Router::new().route("/billing/webhook", post(handlers::webhook));

	Router::new().merge(bearer).merge(webhook).with_state(deps)
}
