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

//! # Gateway proxy
//!
//! The platform's hot path. Every handler walks the same skeleton:
//!
//! 1. resolve the tenant from the bearer auth context,
//! 2. budget gate (spend limits) and credit balance check (≥ 1¢),
//! 3. parse and place the upstream call (arbitrage for non-streaming
//!    chat, direct route otherwise),
//! 4. emit exactly one meter event and debit exactly one charge.
//!
//! Steps after upstream success never fail the request: metering is a
//! non-blocking queue send and a failed debit is logged, not
//! surfaced.

pub mod audio;
pub mod auth;
pub mod error;
pub mod media;
pub mod openai;
pub mod phone;
pub mod providers;
pub mod sms;

#[cfg(test)]
mod mock;

use std::{sync::Arc, time::Duration};

use axum::{
	middleware,
	routing::{get, post},
	Router,
};
use fleet_catalog::{ArbitrageRouter, RateCatalog};
use fleet_ledger::{BudgetChecker, TenantDirectory};
use fleet_metering::RecurringCharges;
use fleet_primitives::{Cents, CostCents, TenantId};
use fleet_traits::{Ledger, MeterSink};
use fleet_types::{
	ledger::LedgerEntryKind, metering::MeterEvent, Capability, PlatformError,
};
use tracing::warn;

pub use auth::{AuthContext, TokenTable};

/// Default timeout for LLM-class upstream calls.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Upstream endpoints and credentials. Base URLs are configurable so
/// tests can point the gateway at a local server.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
	pub openrouter_key: Option<String>,
	pub openrouter_base: String,
	pub deepgram_key: Option<String>,
	pub deepgram_base: String,
	pub elevenlabs_key: Option<String>,
	pub elevenlabs_base: String,
	pub replicate_token: Option<String>,
	pub replicate_base: String,
	pub twilio_sid: Option<String>,
	pub twilio_token: Option<String>,
	pub twilio_base: String,
	/// Public base URL for provider callbacks. When set, telephony
	/// billing is deferred to the status callback; when unset,
	/// outbound calls flat-bill one minute at submission.
	pub webhook_base_url: Option<String>,
}

impl Default for GatewayConfig {
	fn default() -> Self {
		Self {
			openrouter_key: None,
			openrouter_base: "https://openrouter.ai/api".to_owned(),
			deepgram_key: None,
			deepgram_base: "https://api.deepgram.com".to_owned(),
			elevenlabs_key: None,
			elevenlabs_base: "https://api.elevenlabs.io".to_owned(),
			replicate_token: None,
			replicate_base: "https://api.replicate.com".to_owned(),
			twilio_sid: None,
			twilio_token: None,
			twilio_base: "https://api.twilio.com".to_owned(),
			webhook_base_url: None,
		}
	}
}

/// Everything a gateway handler touches, injected at construction.
pub struct GatewayDeps {
	pub ledger: Arc<dyn Ledger>,
	pub budget: Arc<BudgetChecker>,
	pub meter: Arc<dyn MeterSink>,
	pub directory: Arc<TenantDirectory>,
	pub router: Arc<ArbitrageRouter>,
	pub catalog: Arc<RateCatalog>,
	pub recurring: Arc<RecurringCharges>,
	pub numbers: phone::NumberStore,
	pub http: reqwest::Client,
	pub config: GatewayConfig,
}

impl GatewayDeps {
	/// Steps 2 and 3 of the skeleton: budget gate, then the ≥ 1¢
	/// free-balance check.
	pub async fn pre_flight(&self, tenant: &TenantId) -> Result<(), PlatformError> {
		let limits = self.directory.meta(tenant).spend_limits;
		self.budget.check(tenant, &limits).await?;

		let balance = self.ledger.balance(tenant).await?;
		if balance < Cents::new(1) {
			return Err(PlatformError::InsufficientCredits);
		}
		Ok(())
	}

	/// Steps 8 and 9: one meter event, one debit. Infallible by
	/// policy; the upstream call already succeeded and the response
	/// belongs to the caller regardless of what happens here.
	pub async fn settle(
		&self,
		tenant: &TenantId,
		capability: Capability,
		provider: &str,
		cost: CostCents,
		units: Option<(f64, &str)>,
	) -> Cents {
		let margin = self.catalog.margin(capability, provider);
		let charge = cost.charge(margin);

		let mut event = MeterEvent::new(tenant.clone(), capability, provider, cost, charge);
		event.tier = Some(self.directory.meta(tenant).tier);
		if let Some((units, unit_type)) = units {
			event = event.with_units(units, unit_type);
		}
		let external_ref = format!("meter-{}", event.id);
		self.meter.emit(event);

		if charge.is_positive() {
			if let Err(err) = self
				.ledger
				.debit(tenant, charge, LedgerEntryKind::Debit, &external_ref)
				.await
			{
				warn!(%tenant, %capability, %err, "post-call debit failed");
			}
		}
		charge
	}
}

/// The tenant-bearing `/v1` surface plus the provider-facing webhook
/// routes (status callbacks, inbound telephony/SMS), which carry
/// their own verification instead of bearer auth.
pub fn router(deps: Arc<GatewayDeps>, tokens: Arc<TokenTable>) -> Router {
	let bearer = Router::new()
		.route("/v1/chat/completions", post(openai::chat_completions))
		.route("/v1/completions", post(openai::completions))
		.route("/v1/embeddings", post(openai::embeddings))
		.route("/v1/audio/transcriptions", post(audio::transcriptions))
		.route("/v1/audio/speech", post(audio::speech))
		.route("/v1/images/generations", post(media::image_generations))
		.route("/v1/video/generations", post(media::video_generations))
		.route("/v1/phone/outbound", post(phone::outbound))
		.route("/v1/messages/sms", post(sms::outbound))
		.route(
			"/v1/phone/numbers",
			get(phone::list_numbers).post(phone::provision_number),
		)
		.route("/v1/phone/numbers/:id", axum::routing::delete(phone::release_number))
		.layer(middleware::from_fn_with_state(tokens, auth::require_bearer));

	let webhooks = Router::new()
		.route("/v1/phone/outbound/status/:tenant_id", post(phone::outbound_status))
		.route("/v1/phone/inbound", post(phone::inbound))
		.route("/v1/phone/twiml/hangup", get(phone::twiml_hangup))
		.route("/v1/messages/sms/inbound", post(sms::inbound))
		.route("/v1/messages/sms/status", post(sms::delivery_status));

	Router::new().merge(bearer).merge(webhooks).with_state(deps)
}
