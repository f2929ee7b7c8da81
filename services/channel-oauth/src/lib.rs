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

//! # Channel OAuth
//!
//! Coordinates the popup-based handshake between a tenant's browser,
//! the platform and a channel provider: `initiate` parks a one-shot
//! state token, the provider redirects the popup to `callback`, and
//! the opener polls until the exchanged token is ready. Every state
//! transition is single-use and TTL-bounded.

pub mod handlers;
pub mod providers;
pub mod store;
pub mod validate;

pub use providers::{OauthProviderConfig, OauthProviders};
pub use store::ChannelOauthStore;

use std::sync::Arc;

use axum::{
	middleware,
	routing::{get, post},
	Router,
};
use fleet_gateway::{auth, TokenTable};

/// Dependencies of the OAuth and channel-validation handlers.
pub struct OauthDeps {
	pub store: Arc<ChannelOauthStore>,
	pub providers: OauthProviders,
	pub http: reqwest::Client,
	/// Public base URL of the platform, used to build redirect URIs.
	pub public_base: String,
	pub validation: validate::ValidationConfig,
}

pub fn router(deps: Arc<OauthDeps>, tokens: Arc<TokenTable>) -> Router {
	let bearer = Router::new()
		.route("/api/channel-oauth/initiate", post(handlers::initiate))
		.route("/api/channel-oauth/poll", get(handlers::poll))
		.route("/channel-test/:plugin_id/test", post(validate::channel_test))
		.layer(middleware::from_fn_with_state(tokens, auth::require_bearer));

	let browser = Router::new().route("/api/channel-oauth/callback", get(handlers::callback));

	Router::new().merge(bearer).merge(browser).with_state(deps)
}
