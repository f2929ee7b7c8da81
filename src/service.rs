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

//! Wiring: build every subsystem, assemble the router, run the
//! background sweeps.

use std::{sync::Arc, time::Duration};

use axum::{routing::get, Json, Router};
use chrono::Utc;
use fleet_billing::{AffiliateStore, BillingDeps, StripeProcessor, WebhookIngestor};
use fleet_catalog::{ArbitrageRouter, RateCatalog};
use fleet_channel_oauth::{
	validate::ValidationConfig, ChannelOauthStore, OauthDeps, OauthProviderConfig, OauthProviders,
};
use fleet_gateway::{
	phone::NumberStore, providers::OpenRouterChatAdapter, GatewayDeps, TokenTable,
};
use fleet_ledger::{BudgetChecker, CreditLedger, TenantDirectory};
use fleet_metering::{MeterPipeline, MeterStore, RecurringCharges};
use fleet_orchestrator::{
	FleetManager, HttpNodeTransport, OrchestratorDeps, ProfileStore, SnapshotStore,
};
use fleet_plugins::{PluginDeps, SetupSessionManager};
use fleet_roles::{RoleStore, RolesDeps};
use fleet_traits::{Ledger, MeterSink, ProviderAdapter, SystemClock};
use fleet_utils::window::window_start;
use tracing::{info, warn};

use crate::{config::PlatformConfig, vault::PlatformKeyVault};

/// Everything the binary needs beyond the router itself: the pieces
/// the background sweeps drive.
pub struct Platform {
	pub router: Router,
	pub ledger: Arc<CreditLedger>,
	pub meter_store: Arc<MeterStore>,
	pub meter: Arc<dyn MeterSink>,
	pub recurring: Arc<RecurringCharges>,
	pub snapshots: Arc<SnapshotStore>,
	pub oauth_store: Arc<ChannelOauthStore>,
}

pub async fn build(config: PlatformConfig) -> anyhow::Result<Platform> {
	let http = reqwest::Client::new();
	let clock = Arc::new(SystemClock);

	// Accounting core.
	let ledger = Arc::new(CreditLedger::new());
	ledger.set_exhaustion_hook(|tenant| {
		warn!(%tenant, "tenant credits exhausted");
	});
	let meter_store = Arc::new(MeterStore::new());
	let meter: Arc<dyn MeterSink> = Arc::new(MeterPipeline::start(meter_store.clone()));
	let budget = Arc::new(BudgetChecker::new(
		ledger.clone(),
		meter_store.clone(),
		clock.clone(),
	));
	let directory = Arc::new(TenantDirectory::new());
	let recurring = Arc::new(RecurringCharges::new());

	// Routing.
	let catalog = Arc::new(RateCatalog::standard());
	let mut adapters: Vec<Arc<dyn ProviderAdapter>> = Vec::new();
	if let Some(key) = &config.gateway.openrouter_key {
		if let Some(rate) =
			catalog.rate(fleet_types::Capability::ChatCompletions, "openrouter")
		{
			adapters.push(Arc::new(OpenRouterChatAdapter::new(
				http.clone(),
				key.clone(),
				config.gateway.openrouter_base.clone(),
				rate.unit.clone(),
			)));
		}
	}
	let arbitrage = Arc::new(ArbitrageRouter::new(adapters));

	// Auth.
	let tokens = Arc::new(TokenTable::from_env_vars(config.token_env.clone().into_iter()));
	if tokens.is_empty() {
		warn!("no FLEET_TOKEN_* or FLEET_API_TOKEN configured, every request will be rejected");
	}

	// Gateway.
	let gateway = Arc::new(GatewayDeps {
		ledger: ledger.clone(),
		budget,
		meter: meter.clone(),
		directory: directory.clone(),
		router: arbitrage,
		catalog,
		recurring: recurring.clone(),
		numbers: NumberStore::new(),
		http: http.clone(),
		config: config.gateway.clone(),
	});

	// Billing.
	let processor = Arc::new(StripeProcessor::new(
		config.stripe_secret_key.clone().unwrap_or_default(),
		config.stripe_signing_secret.clone().unwrap_or_default(),
		config.billing_return_url.clone(),
	));
	let ingestor = Arc::new(WebhookIngestor::new(
		processor.clone(),
		ledger.clone(),
		directory.clone(),
		clock.clone(),
	));
	let billing = Arc::new(BillingDeps {
		ingestor,
		processor,
		ledger: ledger.clone(),
		directory: directory.clone(),
		usage: meter_store.clone(),
		affiliates: Arc::new(AffiliateStore::new()),
	});

	// Channel OAuth.
	let oauth_store = Arc::new(ChannelOauthStore::new(clock.clone()));
	let mut oauth_providers = OauthProviders::new();
	if let Some((client_id, client_secret)) = &config.slack_client {
		oauth_providers.register(OauthProviderConfig::slack(client_id, client_secret));
	}
	let oauth = Arc::new(OauthDeps {
		store: oauth_store.clone(),
		providers: oauth_providers,
		http: http.clone(),
		public_base: config.public_base.clone(),
		validation: ValidationConfig::default(),
	});

	// Fleet orchestration.
	let profile_store = Arc::new(ProfileStore::open(config.data_dir.clone())?);
	let default_node = {
		let mut nodes: Vec<_> = config.nodes.keys().cloned().collect();
		nodes.sort();
		nodes.into_iter().next()
	};
	let transport = Arc::new(HttpNodeTransport::new(http.clone(), config.nodes.clone()));
	let manager = Arc::new(FleetManager::new(profile_store, transport, default_node));
	let snapshots = Arc::new(SnapshotStore::new());
	let orchestrator = Arc::new(OrchestratorDeps {
		manager: manager.clone(),
		snapshots: snapshots.clone(),
		directory: directory.clone(),
	});

	// Plugins.
	let plugins = Arc::new(PluginDeps {
		manager,
		vault: Arc::new(PlatformKeyVault::new(config.gateway.clone())),
		setup: Arc::new(SetupSessionManager::new()),
	});

	// Roles.
	let roles = Arc::new(RolesDeps { roles: Arc::new(RoleStore::new()) });

	let router = Router::new()
		.route(
			"/healthz",
			get(|| async { Json(serde_json::json!({ "status": "ok" })) }),
		)
		.merge(fleet_gateway::router(gateway, tokens.clone()))
		.merge(fleet_billing::router(billing, tokens.clone()))
		.merge(fleet_channel_oauth::router(oauth, tokens.clone()))
		.merge(fleet_orchestrator::router(orchestrator, tokens.clone()))
		.merge(fleet_plugins::router(plugins, tokens.clone()))
		.merge(fleet_roles::router(roles, tokens))
		.layer(tower_http::trace::TraceLayer::new_for_http());

	Ok(Platform {
		router,
		ledger,
		meter_store,
		meter,
		recurring,
		snapshots,
		oauth_store,
	})
}

/// Periodic work: window aggregation, recurring charges, snapshot and
/// OAuth-state expiry. Each sweep is independent and crash-isolated.
pub fn spawn_background(platform: &Platform) {
	{
		let store = platform.meter_store.clone();
		tokio::spawn(async move {
			let mut tick = tokio::time::interval(Duration::from_secs(60));
			loop {
				tick.tick().await;
				let folded = store.aggregate_before(window_start(Utc::now()));
				if folded > 0 {
					info!(folded, "meter windows aggregated");
				}
			}
		});
	}

	{
		let recurring = platform.recurring.clone();
		let ledger = platform.ledger.clone();
		let meter = platform.meter.clone();
		tokio::spawn(async move {
			let mut tick = tokio::time::interval(Duration::from_secs(3600));
			loop {
				tick.tick().await;
				let ledger: &dyn Ledger = ledger.as_ref();
				match recurring.run_due(Utc::now(), ledger, meter.as_ref()).await {
					Ok(billed) if billed > 0 => info!(billed, "recurring charges billed"),
					Ok(_) => {},
					Err(err) => warn!(%err, "recurring billing sweep failed"),
				}
			}
		});
	}

	{
		let snapshots = platform.snapshots.clone();
		let oauth = platform.oauth_store.clone();
		tokio::spawn(async move {
			let mut tick = tokio::time::interval(Duration::from_secs(600));
			loop {
				tick.tick().await;
				snapshots.prune_expired(Utc::now());
				oauth.purge_expired();
			}
		});
	}
}

pub async fn serve(listen: &str, platform: Platform) -> anyhow::Result<()> {
	spawn_background(&platform);

	let listener = tokio::net::TcpListener::bind(listen).await?;
	info!(%listen, "fleet platform listening");
	axum::serve(listener, platform.router)
		.with_graceful_shutdown(async {
			let _ = tokio::signal::ctrl_c().await;
			info!("shutting down");
		})
		.await?;
	Ok(())
}
