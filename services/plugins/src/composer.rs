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

//! Pure environment-map transformations.
//!
//! Invariants maintained across every operation:
//! - `WOPR_PLUGINS_DISABLED` ⊆ `WOPR_PLUGINS`;
//! - `WOPR_HOSTED_KEYS` lists exactly the credential env keys some
//!   installed plugin declared `hosted`;
//! - empty aggregate keys are deleted, not written as `""`.
//!
//! Hosted credentials are fetched by the caller before composition so
//! these functions stay synchronous and lock-friendly.

use std::collections::BTreeMap;

use fleet_primitives::PluginId;
use fleet_types::{plugins::PluginConfig, PlatformError};
use fleet_utils::env_key::{
	join_list, plugin_config_key, split_list, HOSTED_KEYS_KEY, PLUGINS_DISABLED_KEY, PLUGINS_KEY,
};

use crate::hosted::hosted_key;

type Env = BTreeMap<String, String>;

fn installed(env: &Env) -> Vec<String> {
	split_list(env.get(PLUGINS_KEY).map(String::as_str))
}

fn set_list(env: &mut Env, key: &str, items: &[String]) {
	match join_list(items) {
		Some(value) => {
			env.insert(key.to_owned(), value);
		},
		None => {
			env.remove(key);
		},
	}
}

/// Env keys a plugin's stored config contributed as hosted
/// credentials.
fn hosted_keys_of(config: &PluginConfig) -> Vec<String> {
	config
		.hosted_capabilities()
		.filter_map(|capability| hosted_key(capability).map(|(key, _)| key.to_owned()))
		.collect()
}

fn stored_config(env: &Env, plugin: &PluginId) -> Option<PluginConfig> {
	env.get(&plugin_config_key(plugin))
		.and_then(|raw| serde_json::from_str(raw).ok())
}

/// Install a plugin: append to the install list (order preserved),
/// store its config and inject the hosted credentials supplied by
/// the caller, keyed by env-variable name.
pub fn install(
	env: &Env,
	plugin: &PluginId,
	config: &PluginConfig,
	credentials: &BTreeMap<String, String>,
) -> Result<Env, PlatformError> {
	let mut next = env.clone();
	let mut plugins = installed(env);

	if plugins.iter().any(|p| p == plugin.as_str()) {
		return Err(PlatformError::Conflict(format!("plugin {plugin} is already installed")));
	}
	plugins.push(plugin.to_string());
	set_list(&mut next, PLUGINS_KEY, &plugins);

	let encoded = serde_json::to_string(config)
		.map_err(|e| PlatformError::Internal(format!("encoding plugin config: {e}")))?;
	next.insert(plugin_config_key(plugin), encoded);

	let mut hosted_keys = split_list(env.get(HOSTED_KEYS_KEY).map(String::as_str));
	for capability in config.hosted_capabilities() {
		let (env_key, _) = hosted_key(capability).ok_or_else(|| {
			PlatformError::InvalidRequest(format!(
				"capability {capability} cannot be platform-hosted"
			))
		})?;
		let secret = credentials.get(env_key).ok_or_else(|| {
			PlatformError::ServiceUnavailable(format!("hosted credential {env_key}"))
		})?;
		next.insert(env_key.to_owned(), secret.clone());
		if !hosted_keys.iter().any(|k| k == env_key) {
			hosted_keys.push(env_key.to_owned());
		}
	}
	set_list(&mut next, HOSTED_KEYS_KEY, &hosted_keys);

	Ok(next)
}

/// Enable or disable an installed plugin. Only the disabled set
/// changes; the install list never does.
pub fn toggle(env: &Env, plugin: &PluginId, enabled: bool) -> Result<Env, PlatformError> {
	if !installed(env).iter().any(|p| p == plugin.as_str()) {
		return Err(PlatformError::NotFound(format!("plugin {plugin}")));
	}

	let mut next = env.clone();
	let mut disabled = split_list(env.get(PLUGINS_DISABLED_KEY).map(String::as_str));

	if enabled {
		disabled.retain(|p| p != plugin.as_str());
	} else if !disabled.iter().any(|p| p == plugin.as_str()) {
		disabled.push(plugin.to_string());
	}
	set_list(&mut next, PLUGINS_DISABLED_KEY, &disabled);

	Ok(next)
}

/// Remove a plugin and exactly the hosted keys it alone contributed:
/// a key another installed plugin also declared stays in place.
pub fn uninstall(env: &Env, plugin: &PluginId) -> Result<Env, PlatformError> {
	let mut plugins = installed(env);
	if !plugins.iter().any(|p| p == plugin.as_str()) {
		return Err(PlatformError::NotFound(format!("plugin {plugin}")));
	}
	plugins.retain(|p| p != plugin.as_str());

	let mut next = env.clone();
	set_list(&mut next, PLUGINS_KEY, &plugins);

	// Keys the removed plugin contributed, per its stored config.
	let removed_keys = stored_config(env, plugin).map(|c| hosted_keys_of(&c)).unwrap_or_default();
	next.remove(&plugin_config_key(plugin));

	// Keys the surviving plugins still need.
	let mut retained: Vec<String> = Vec::new();
	for other in &plugins {
		let Ok(other_id) = PluginId::parse(other.clone()) else { continue };
		if let Some(config) = stored_config(env, &other_id) {
			for key in hosted_keys_of(&config) {
				if !retained.contains(&key) {
					retained.push(key);
				}
			}
		}
	}

	for key in &removed_keys {
		if !retained.contains(key) {
			next.remove(key);
		}
	}
	let hosted_keys: Vec<String> = split_list(env.get(HOSTED_KEYS_KEY).map(String::as_str))
		.into_iter()
		.filter(|key| !removed_keys.contains(key) || retained.contains(key))
		.collect();
	set_list(&mut next, HOSTED_KEYS_KEY, &hosted_keys);

	let disabled: Vec<String> = split_list(env.get(PLUGINS_DISABLED_KEY).map(String::as_str))
		.into_iter()
		.filter(|p| p != plugin.as_str())
		.collect();
	set_list(&mut next, PLUGINS_DISABLED_KEY, &disabled);

	Ok(next)
}

#[cfg(test)]
mod tests {
	use fleet_types::plugins::ProviderChoice;

	use super::*;

	fn plugin(id: &str) -> PluginId {
		PluginId::parse(id).unwrap()
	}

	fn config_with_hosted(capabilities: &[&str]) -> PluginConfig {
		PluginConfig {
			config: serde_json::json!({ "greeting": "hi" }),
			provider_choices: capabilities
				.iter()
				.map(|c| (c.to_string(), ProviderChoice::Hosted))
				.collect(),
		}
	}

	fn creds(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
		pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
	}

	#[test]
	fn install_preserves_order() {
		let env = Env::new();
		let env = install(&env, &plugin("p1"), &PluginConfig::default(), &creds(&[])).unwrap();
		let env = install(&env, &plugin("p2"), &PluginConfig::default(), &creds(&[])).unwrap();

		assert_eq!(env.get(PLUGINS_KEY), Some(&"p1,p2".to_owned()));
		assert!(env.contains_key("WOPR_PLUGIN_P1_CONFIG"));
		assert!(env.contains_key("WOPR_PLUGIN_P2_CONFIG"));
	}

	#[test]
	fn double_install_is_a_conflict() {
		let env = install(&Env::new(), &plugin("p1"), &PluginConfig::default(), &creds(&[]))
			.unwrap();
		let err =
			install(&env, &plugin("p1"), &PluginConfig::default(), &creds(&[])).unwrap_err();
		assert!(matches!(err, PlatformError::Conflict(_)));
	}

	#[test]
	fn hosted_install_writes_credentials_and_tracks_keys() {
		let env = install(
			&Env::new(),
			&plugin("p1"),
			&config_with_hosted(&["tts"]),
			&creds(&[("ELEVENLABS_API_KEY", "xi-secret")]),
		)
		.unwrap();

		assert_eq!(env.get("ELEVENLABS_API_KEY"), Some(&"xi-secret".to_owned()));
		assert_eq!(env.get(HOSTED_KEYS_KEY), Some(&"ELEVENLABS_API_KEY".to_owned()));
	}

	#[test]
	fn toggle_only_touches_the_disabled_set() {
		let env = install(&Env::new(), &plugin("p1"), &PluginConfig::default(), &creds(&[]))
			.unwrap();
		let installed_before = env.get(PLUGINS_KEY).cloned();

		let env = toggle(&env, &plugin("p1"), false).unwrap();
		assert_eq!(env.get(PLUGINS_DISABLED_KEY), Some(&"p1".to_owned()));
		assert_eq!(env.get(PLUGINS_KEY).cloned(), installed_before);

		let env = toggle(&env, &plugin("p1"), true).unwrap();
		assert!(!env.contains_key(PLUGINS_DISABLED_KEY), "empty set deletes the key");
		assert_eq!(env.get(PLUGINS_KEY).cloned(), installed_before);
	}

	#[test]
	fn toggle_of_uninstalled_plugin_is_not_found() {
		let err = toggle(&Env::new(), &plugin("ghost"), false).unwrap_err();
		assert!(matches!(err, PlatformError::NotFound(_)));
	}

	#[test]
	fn uninstall_removes_only_the_plugins_own_hosted_keys() {
		// p1 hosts tts, p2 hosts tts and stt: after removing p1 the
		// shared ElevenLabs key must survive.
		let env = install(
			&Env::new(),
			&plugin("p1"),
			&config_with_hosted(&["tts"]),
			&creds(&[("ELEVENLABS_API_KEY", "xi")]),
		)
		.unwrap();
		let env = install(
			&env,
			&plugin("p2"),
			&config_with_hosted(&["tts", "stt"]),
			&creds(&[("ELEVENLABS_API_KEY", "xi"), ("DEEPGRAM_API_KEY", "dg")]),
		)
		.unwrap();

		let env = uninstall(&env, &plugin("p1")).unwrap();
		assert_eq!(env.get(PLUGINS_KEY), Some(&"p2".to_owned()));
		assert!(!env.contains_key("WOPR_PLUGIN_P1_CONFIG"));
		assert_eq!(env.get("ELEVENLABS_API_KEY"), Some(&"xi".to_owned()), "shared key kept");
		assert_eq!(env.get("DEEPGRAM_API_KEY"), Some(&"dg".to_owned()));

		// Removing p2 as well drops everything.
		let env = uninstall(&env, &plugin("p2")).unwrap();
		assert!(!env.contains_key(PLUGINS_KEY));
		assert!(!env.contains_key(HOSTED_KEYS_KEY));
		assert!(!env.contains_key("ELEVENLABS_API_KEY"));
		assert!(!env.contains_key("DEEPGRAM_API_KEY"));
	}

	#[test]
	fn uninstall_clears_the_disabled_entry() {
		let env = install(&Env::new(), &plugin("p1"), &PluginConfig::default(), &creds(&[]))
			.unwrap();
		let env = toggle(&env, &plugin("p1"), false).unwrap();
		let env = uninstall(&env, &plugin("p1")).unwrap();
		assert!(!env.contains_key(PLUGINS_DISABLED_KEY));
	}
}
