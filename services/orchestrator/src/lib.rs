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

//! # Fleet orchestration
//!
//! Declarative bot profiles on durable storage are the source of
//! truth; containers on worker nodes are derived state. Profile
//! writes serialize per bot behind a re-read, node dispatch is best
//! effort, and a failed recreate rolls the profile back to its
//! pre-write state before the error surfaces.

pub mod commands;
pub mod handlers;
pub mod manager;
pub mod profile_store;
pub mod snapshots;

pub use commands::HttpNodeTransport;
pub use manager::{CreateBot, FleetManager};
pub use profile_store::ProfileStore;
pub use snapshots::SnapshotStore;

use std::sync::Arc;

use axum::{
	middleware,
	routing::{delete, get},
	Router,
};
use fleet_gateway::{auth, TokenTable};
use fleet_ledger::TenantDirectory;

pub struct OrchestratorDeps {
	pub manager: Arc<FleetManager>,
	pub snapshots: Arc<SnapshotStore>,
	pub directory: Arc<TenantDirectory>,
}

/// Bot CRUD and snapshots. The plugin/channel routes of the fleet
/// surface live with the plugin composer.
pub fn router(deps: Arc<OrchestratorDeps>, tokens: Arc<TokenTable>) -> Router {
	Router::new()
		.route("/fleet/bots", get(handlers::list_bots).post(handlers::create_bot))
		.route(
			"/fleet/bots/:bot_id",
			get(handlers::get_bot)
				.patch(handlers::update_bot)
				.delete(handlers::delete_bot),
		)
		.route("/fleet/bots/:bot_id/move", axum::routing::post(handlers::move_bot))
		.route(
			"/fleet/bots/:bot_id/snapshots",
			get(handlers::list_snapshots).post(handlers::create_snapshot),
		)
		.route(
			"/fleet/bots/:bot_id/snapshots/:snap_id",
			delete(handlers::delete_snapshot),
		)
		.layer(middleware::from_fn_with_state(tokens, auth::require_bearer))
		.with_state(deps)
}
