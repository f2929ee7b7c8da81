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

//! # Roles
//!
//! Per-tenant role grants plus platform-wide admin grants, which are
//! role entries against the reserved platform tenant. Two rules have
//! teeth: only a platform admin may grant `platform_admin`, and the
//! last platform admin cannot be removed.

pub mod handlers;
pub mod store;

pub use store::{Role, RoleStore};

use std::sync::Arc;

use axum::{
	middleware,
	routing::{delete, get, post, put},
	Router,
};
use fleet_gateway::{auth, TokenTable};

pub struct RolesDeps {
	pub roles: Arc<RoleStore>,
}

pub fn router(deps: Arc<RolesDeps>, tokens: Arc<TokenTable>) -> Router {
	Router::new()
		.route("/api/admin/roles/:tenant_id", get(handlers::list_roles))
		.route(
			"/api/admin/roles/:tenant_id/:user_id",
			put(handlers::grant_role).delete(handlers::revoke_role),
		)
		.route(
			"/api/admin/platform-admins",
			get(handlers::list_platform_admins).post(handlers::grant_platform_admin),
		)
		.route(
			"/api/admin/platform-admins/:user_id",
			delete(handlers::revoke_platform_admin),
		)
		.layer(middleware::from_fn_with_state(tokens, auth::require_bearer))
		.with_state(deps)
}
