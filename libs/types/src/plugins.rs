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

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Who supplies the upstream credential for one capability of a
/// plugin: the platform (`hosted`, billed through credits with
/// margin) or the tenant (`byok`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderChoice {
	Hosted,
	Byok,
}

/// The JSON value stored at `WOPR_PLUGIN_<ID>_CONFIG`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginConfig {
	#[serde(default)]
	pub config: serde_json::Value,
	#[serde(default, rename = "providerChoices")]
	pub provider_choices: BTreeMap<String, ProviderChoice>,
}

impl PluginConfig {
	/// Capabilities this plugin asked the platform to host a
	/// credential for.
	pub fn hosted_capabilities(&self) -> impl Iterator<Item = &str> {
		self.provider_choices
			.iter()
			.filter(|(_, choice)| **choice == ProviderChoice::Hosted)
			.map(|(capability, _)| capability.as_str())
	}
}
