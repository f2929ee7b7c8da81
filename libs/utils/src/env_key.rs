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

//! The `WOPR_*` environment-variable grammar consumed by bot
//! containers. The composer is the only writer of these keys; bots
//! only read them.

use fleet_primitives::PluginId;

/// Comma-separated list of installed plugin ids.
pub const PLUGINS_KEY: &str = "WOPR_PLUGINS";

/// Comma-separated disabled subset of [`PLUGINS_KEY`]. Deleted when
/// empty.
pub const PLUGINS_DISABLED_KEY: &str = "WOPR_PLUGINS_DISABLED";

/// Comma-separated names of hosted-credential env keys injected by
/// the composer. Deleted when empty.
pub const HOSTED_KEYS_KEY: &str = "WOPR_HOSTED_KEYS";

/// Config key for one plugin: lowercase-hyphen id mapped to
/// upper-underscore, e.g. `wopr-plugin-discord` →
/// `WOPR_PLUGIN_WOPR_PLUGIN_DISCORD_CONFIG`.
pub fn plugin_config_key(plugin: &PluginId) -> String {
	format!("WOPR_PLUGIN_{}_CONFIG", upper_snake(plugin.as_str()))
}

fn upper_snake(id: &str) -> String {
	id.chars()
		.map(|c| if c == '-' { '_' } else { c.to_ascii_uppercase() })
		.collect()
}

/// Split a comma-separated env list. Empty or missing values yield an
/// empty vec.
pub fn split_list(value: Option<&str>) -> Vec<String> {
	match value {
		None | Some("") => Vec::new(),
		Some(value) => value.split(',').map(str::to_owned).collect(),
	}
}

/// Join a list back into its env form. `None` when empty, so callers
/// can delete the key instead of writing an empty string.
pub fn join_list<S: AsRef<str>>(items: &[S]) -> Option<String> {
	if items.is_empty() {
		None
	} else {
		Some(items.iter().map(|s| s.as_ref()).collect::<Vec<_>>().join(","))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn config_key_uses_upper_snake() {
		let plugin = PluginId::parse("wopr-plugin-discord").unwrap();
		assert_eq!(plugin_config_key(&plugin), "WOPR_PLUGIN_WOPR_PLUGIN_DISCORD_CONFIG");
	}

	#[test]
	fn list_round_trip() {
		assert_eq!(split_list(Some("p1,p2")), vec!["p1".to_string(), "p2".to_string()]);
		assert_eq!(split_list(Some("")), Vec::<String>::new());
		assert_eq!(split_list(None), Vec::<String>::new());
		assert_eq!(join_list(&["p1", "p2"]), Some("p1,p2".to_string()));
		assert_eq!(join_list::<&str>(&[]), None);
	}
}
