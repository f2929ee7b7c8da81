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

//! Typed view of the platform environment, read once at startup.

use std::{collections::HashMap, path::PathBuf};

use fleet_gateway::GatewayConfig;
use fleet_primitives::NodeId;

fn env(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[derive(Debug, Clone)]
pub struct PlatformConfig {
	pub data_dir: PathBuf,
	pub gateway: GatewayConfig,
	/// Token env vars (`FLEET_TOKEN_*`, `FLEET_API_TOKEN`), passed
	/// verbatim to the token table parser.
	pub token_env: Vec<(String, String)>,
	pub stripe_secret_key: Option<String>,
	pub stripe_signing_secret: Option<String>,
	/// Where checkout and portal sessions send the browser back to.
	pub billing_return_url: String,
	pub slack_client: Option<(String, String)>,
	/// Public base URL of this deployment (`BETTER_AUTH_URL`).
	pub public_base: String,
	/// Worker node agents: node id → base URL, from `FLEET_NODE_*`.
	pub nodes: HashMap<NodeId, String>,
}

impl PlatformConfig {
	pub fn from_env(data_dir: PathBuf) -> Self {
		let gateway = GatewayConfig {
			openrouter_key: env("OPENROUTER_API_KEY"),
			deepgram_key: env("DEEPGRAM_API_KEY"),
			elevenlabs_key: env("ELEVENLABS_API_KEY"),
			replicate_token: env("REPLICATE_API_TOKEN"),
			twilio_sid: env("TWILIO_ACCOUNT_SID"),
			twilio_token: env("TWILIO_AUTH_TOKEN"),
			webhook_base_url: env("WEBHOOK_BASE_URL"),
			..GatewayConfig::default()
		};

		let token_env = std::env::vars()
			.filter(|(key, _)| key == "FLEET_API_TOKEN" || key.starts_with("FLEET_TOKEN_"))
			.collect();

		let nodes = std::env::vars()
			.filter_map(|(key, value)| {
				key.strip_prefix("FLEET_NODE_")
					.map(|node| (NodeId::from(node), value))
			})
			.collect();

		let public_base =
			env("BETTER_AUTH_URL").unwrap_or_else(|| "http://localhost:8080".to_owned());

		Self {
			data_dir,
			gateway,
			token_env,
			stripe_secret_key: env("STRIPE_SECRET_KEY"),
			stripe_signing_secret: env("STRIPE_WEBHOOK_SECRET"),
			billing_return_url: format!("{public_base}/dashboard/credits"),
			slack_client: env("SLACK_CLIENT_ID")
				.zip(env("SLACK_CLIENT_SECRET")),
			public_base,
			nodes,
		}
	}
}
