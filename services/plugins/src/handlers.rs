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

use std::{collections::BTreeMap, sync::Arc};

use axum::{
	extract::{Path, Query, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	Extension, Json,
};
use fleet_gateway::AuthContext;
use fleet_primitives::{BotId, PluginId, SetupSessionId, TokenScope};
use fleet_types::{plugins::PluginConfig, profile::BotProfile, PlatformError};
use fleet_utils::env_key::{split_list, PLUGINS_DISABLED_KEY, PLUGINS_KEY};
use serde::Deserialize;

use crate::{composer, hosted::hosted_key, PluginDeps};

/// Channel-category plugins, the only ones the `/channels` surface
/// accepts.
fn is_channel_plugin(plugin: &PluginId) -> bool {
	let id = plugin.as_str();
	id.contains("slack") || id.contains("discord") || id.contains("telegram")
}

async fn authorized_bot(
	deps: &PluginDeps,
	auth: &AuthContext,
	bot_id: BotId,
) -> Result<BotProfile, PlatformError> {
	let profile = deps.manager.get(bot_id).await?;
	if profile.tenant != auth.tenant && !auth.scope.allows(TokenScope::Admin) {
		return Err(PlatformError::Forbidden("bot belongs to another tenant".into()));
	}
	Ok(profile)
}

fn parse_plugin_id(raw: &str) -> Result<PluginId, PlatformError> {
	PluginId::parse(raw).map_err(|e| PlatformError::InvalidRequest(e.to_string()))
}

fn plugin_listing(profile: &BotProfile) -> serde_json::Value {
	let installed = split_list(profile.env.get(PLUGINS_KEY).map(String::as_str));
	let disabled = split_list(profile.env.get(PLUGINS_DISABLED_KEY).map(String::as_str));

	let plugins: Vec<serde_json::Value> = installed
		.iter()
		.map(|id| {
			serde_json::json!({
				"id": id,
				"enabled": !disabled.contains(id),
			})
		})
		.collect();
	serde_json::json!({ "plugins": plugins })
}

/// Fetch the vault secrets for every hosted capability the config
/// declares, before entering the per-bot lock.
async fn resolve_hosted_credentials(
	deps: &PluginDeps,
	config: &PluginConfig,
) -> Result<BTreeMap<String, String>, PlatformError> {
	let mut credentials = BTreeMap::new();
	for capability in config.hosted_capabilities() {
		let Some((env_key, vault_provider)) = hosted_key(capability) else {
			return Err(PlatformError::InvalidRequest(format!(
				"capability {capability} cannot be platform-hosted"
			)));
		};
		if !credentials.contains_key(env_key) {
			let secret = deps.vault.active_credential(vault_provider).await?;
			credentials.insert(env_key.to_owned(), secret);
		}
	}
	Ok(credentials)
}

pub async fn list_plugins(
	State(deps): State<Arc<PluginDeps>>,
	Extension(auth): Extension<AuthContext>,
	Path(bot_id): Path<BotId>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Read)?;
	let profile = authorized_bot(&deps, &auth, bot_id).await?;
	Ok(Json(plugin_listing(&profile)).into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct InstallRequest {
	#[serde(flatten)]
	pub config: PluginConfig,
}

pub async fn install_plugin(
	State(deps): State<Arc<PluginDeps>>,
	Extension(auth): Extension<AuthContext>,
	Path((bot_id, plugin_id)): Path<(BotId, String)>,
	body: Option<Json<InstallRequest>>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Write)?;
	let _profile = authorized_bot(&deps, &auth, bot_id).await?;
	let plugin = parse_plugin_id(&plugin_id)?;
	let config = body.map(|Json(b)| b.config).unwrap_or_default();

	let credentials = resolve_hosted_credentials(&deps, &config).await?;
	let updated = deps
		.manager
		.update_env_with(bot_id, |env| composer::install(env, &plugin, &config, &credentials))
		.await?;

	Ok(Json(plugin_listing(&updated)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
	pub enabled: bool,
}

pub async fn toggle_plugin(
	State(deps): State<Arc<PluginDeps>>,
	Extension(auth): Extension<AuthContext>,
	Path((bot_id, plugin_id)): Path<(BotId, String)>,
	Json(request): Json<ToggleRequest>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Write)?;
	let _profile = authorized_bot(&deps, &auth, bot_id).await?;
	let plugin = parse_plugin_id(&plugin_id)?;

	let updated = deps
		.manager
		.update_env_with(bot_id, |env| composer::toggle(env, &plugin, request.enabled))
		.await?;
	Ok(Json(plugin_listing(&updated)).into_response())
}

pub async fn uninstall_plugin(
	State(deps): State<Arc<PluginDeps>>,
	Extension(auth): Extension<AuthContext>,
	Path((bot_id, plugin_id)): Path<(BotId, String)>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Write)?;
	let _profile = authorized_bot(&deps, &auth, bot_id).await?;
	let plugin = parse_plugin_id(&plugin_id)?;

	deps.manager
		.update_env_with(bot_id, |env| composer::uninstall(env, &plugin))
		.await?;
	Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn list_channels(
	State(deps): State<Arc<PluginDeps>>,
	Extension(auth): Extension<AuthContext>,
	Path(bot_id): Path<BotId>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Read)?;
	let profile = authorized_bot(&deps, &auth, bot_id).await?;

	let disabled = split_list(profile.env.get(PLUGINS_DISABLED_KEY).map(String::as_str));
	let channels: Vec<serde_json::Value> = split_list(
		profile.env.get(PLUGINS_KEY).map(String::as_str),
	)
	.into_iter()
	.filter(|id| PluginId::parse(id.clone()).map(|p| is_channel_plugin(&p)).unwrap_or(false))
	.map(|id| {
		let enabled = !disabled.contains(&id);
		serde_json::json!({ "id": id, "enabled": enabled })
	})
	.collect();

	Ok(Json(serde_json::json!({ "channels": channels })).into_response())
}

pub async fn install_channel(
	State(deps): State<Arc<PluginDeps>>,
	Extension(auth): Extension<AuthContext>,
	Path((bot_id, plugin_id)): Path<(BotId, String)>,
	body: Option<Json<InstallRequest>>,
) -> Result<Response, PlatformError> {
	let plugin = parse_plugin_id(&plugin_id)?;
	if !is_channel_plugin(&plugin) {
		return Err(PlatformError::InvalidRequest(format!(
			"{plugin} is not a channel plugin"
		)));
	}
	install_plugin(State(deps), Extension(auth), Path((bot_id, plugin_id)), body).await
}

pub async fn uninstall_channel(
	State(deps): State<Arc<PluginDeps>>,
	Extension(auth): Extension<AuthContext>,
	Path((bot_id, plugin_id)): Path<(BotId, String)>,
) -> Result<Response, PlatformError> {
	let plugin = parse_plugin_id(&plugin_id)?;
	if !is_channel_plugin(&plugin) {
		return Err(PlatformError::InvalidRequest(format!(
			"{plugin} is not a channel plugin"
		)));
	}
	uninstall_plugin(State(deps), Extension(auth), Path((bot_id, plugin_id))).await
}

#[derive(Debug, Deserialize)]
pub struct StartSetupRequest {
	#[serde(rename = "botSession")]
	pub bot_session: String,
	#[serde(rename = "pluginId")]
	pub plugin_id: String,
}

pub async fn start_setup(
	State(deps): State<Arc<PluginDeps>>,
	Extension(auth): Extension<AuthContext>,
	Json(request): Json<StartSetupRequest>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Write)?;
	let plugin = parse_plugin_id(&request.plugin_id)?;
	let session = deps.setup.start(&request.bot_session, plugin)?;
	Ok((StatusCode::CREATED, Json(session)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct ResumableQuery {
	#[serde(rename = "botSession")]
	pub bot_session: String,
}

pub async fn resumable_setup(
	State(deps): State<Arc<PluginDeps>>,
	Extension(auth): Extension<AuthContext>,
	Query(query): Query<ResumableQuery>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Read)?;
	match deps.setup.check_for_resumable(&query.bot_session) {
		Some(session) => Ok(Json(serde_json::json!({ "resumable": session })).into_response()),
		None => Ok(Json(serde_json::json!({ "resumable": null })).into_response()),
	}
}

pub async fn complete_setup(
	State(deps): State<Arc<PluginDeps>>,
	Extension(auth): Extension<AuthContext>,
	Path(id): Path<SetupSessionId>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Write)?;
	Ok(Json(deps.setup.complete(id)?).into_response())
}

pub async fn rollback_setup(
	State(deps): State<Arc<PluginDeps>>,
	Extension(auth): Extension<AuthContext>,
	Path(id): Path<SetupSessionId>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Write)?;
	Ok(Json(deps.setup.rollback(id)?).into_response())
}

pub async fn setup_error(
	State(deps): State<Arc<PluginDeps>>,
	Extension(auth): Extension<AuthContext>,
	Path(id): Path<SetupSessionId>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Write)?;
	Ok(Json(deps.setup.record_error(id)?).into_response())
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use fleet_mocks::MockNodeTransport;
	use fleet_orchestrator::{CreateBot, FleetManager, ProfileStore};
	use fleet_primitives::TenantId;

	use super::*;

	#[test]
	fn channel_category_is_id_based() {
		assert!(is_channel_plugin(&PluginId::parse("wopr-plugin-slack").unwrap()));
		assert!(!is_channel_plugin(&PluginId::parse("wopr-plugin-weather").unwrap()));
	}

	#[tokio::test]
	async fn concurrent_installs_of_different_plugins_both_land() {
		let dir = tempfile::tempdir().unwrap();
		let store = Arc::new(ProfileStore::open(dir.path()).unwrap());
		let manager = Arc::new(FleetManager::new(
			store,
			Arc::new(MockNodeTransport::new()),
			None,
		));

		let (profile, _) = manager
			.create(
				&TenantId::from("acme"),
				CreateBot {
					name: "bot".into(),
					image: "wopr/bot:1".into(),
					channel: None,
					env: Default::default(),
				},
			)
			.await
			.unwrap();
		let id = profile.id;

		let m1 = manager.clone();
		let m2 = manager.clone();
		let a = tokio::spawn(async move {
			let plugin = PluginId::parse("p1").unwrap();
			m1.update_env_with(id, |env| {
				composer::install(env, &plugin, &PluginConfig::default(), &BTreeMap::new())
			})
			.await
		});
		let b = tokio::spawn(async move {
			let plugin = PluginId::parse("p2").unwrap();
			m2.update_env_with(id, |env| {
				composer::install(env, &plugin, &PluginConfig::default(), &BTreeMap::new())
			})
			.await
		});
		a.await.unwrap().unwrap();
		b.await.unwrap().unwrap();

		let env = manager.get(id).await.unwrap().env;
		let installed = split_list(env.get(PLUGINS_KEY).map(String::as_str));
		assert_eq!(installed.len(), 2);
		assert!(installed.contains(&"p1".to_string()));
		assert!(installed.contains(&"p2".to_string()));
		assert!(env.contains_key("WOPR_PLUGIN_P1_CONFIG"));
		assert!(env.contains_key("WOPR_PLUGIN_P2_CONFIG"));
	}
}
