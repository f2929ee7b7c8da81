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

//! # Plugin composer
//!
//! Installing, toggling and uninstalling a plugin are pure functions
//! from the bot's current environment map to the next one, run inside
//! the fleet manager's per-bot lock. The `WOPR_*` key grammar is the
//! whole contract between the platform and the bot container.

pub mod composer;
pub mod handlers;
pub mod hosted;
pub mod setup;

pub use setup::SetupSessionManager;

use std::sync::Arc;

use axum::{
	middleware,
	routing::{get, post},
	Router,
};
use fleet_gateway::{auth, TokenTable};
use fleet_orchestrator::FleetManager;
use fleet_traits::CredentialVault;

pub struct PluginDeps {
	pub manager: Arc<FleetManager>,
	pub vault: Arc<dyn CredentialVault>,
	pub setup: Arc<SetupSessionManager>,
}

pub fn router(deps: Arc<PluginDeps>, tokens: Arc<TokenTable>) -> Router {
	Router::new()
		.route("/fleet/bots/:bot_id/plugins", get(handlers::list_plugins))
		.route(
			"/fleet/bots/:bot_id/plugins/:plugin_id",
			post(handlers::install_plugin)
				.put(handlers::install_plugin)
				.patch(handlers::toggle_plugin)
				.delete(handlers::uninstall_plugin),
		)
		.route("/fleet/bots/:bot_id/channels", get(handlers::list_channels))
		.route(
			"/fleet/bots/:bot_id/channels/:plugin_id",
			post(handlers::install_channel).delete(handlers::uninstall_channel),
		)
		.route("/fleet/setup-sessions", post(handlers::start_setup))
		.route("/fleet/setup-sessions/resumable", get(handlers::resumable_setup))
		.route("/fleet/setup-sessions/:id/complete", post(handlers::complete_setup))
		.route("/fleet/setup-sessions/:id/rollback", post(handlers::rollback_setup))
		.route("/fleet/setup-sessions/:id/error", post(handlers::setup_error))
		.layer(middleware::from_fn_with_state(tokens, auth::require_bearer))
		.with_state(deps)
}
