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

//! Channel credential validation against the provider's own
//! introspection endpoint: Slack `auth.test`, Discord `users/@me`,
//! Telegram `getMe`.

use std::{sync::Arc, time::Duration};

use axum::{
	extract::{Path, State},
	response::{IntoResponse, Response},
	Json,
};
use fleet_types::PlatformError;
use serde::Deserialize;

use crate::OauthDeps;

/// Validation calls are quick probes, not LLM calls.
const VALIDATION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ValidationConfig {
	pub slack_base: String,
	pub discord_base: String,
	pub telegram_base: String,
}

impl Default for ValidationConfig {
	fn default() -> Self {
		Self {
			slack_base: "https://slack.com".to_owned(),
			discord_base: "https://discord.com".to_owned(),
			telegram_base: "https://api.telegram.org".to_owned(),
		}
	}
}

#[derive(Debug, Deserialize)]
pub struct TestRequest {
	pub token: String,
}

enum Channel {
	Slack,
	Discord,
	Telegram,
}

fn channel_of(plugin_id: &str) -> Option<Channel> {
	if plugin_id.contains("slack") {
		Some(Channel::Slack)
	} else if plugin_id.contains("discord") {
		Some(Channel::Discord)
	} else if plugin_id.contains("telegram") {
		Some(Channel::Telegram)
	} else {
		None
	}
}

pub async fn channel_test(
	State(deps): State<Arc<OauthDeps>>,
	Path(plugin_id): Path<String>,
	Json(request): Json<TestRequest>,
) -> Result<Response, PlatformError> {
	let channel = channel_of(&plugin_id)
		.ok_or_else(|| PlatformError::NotFound(format!("channel plugin {plugin_id}")))?;

	let config = &deps.validation;
	let valid = match channel {
		Channel::Slack => {
			let response = deps
				.http
				.post(format!("{}/api/auth.test", config.slack_base))
				.bearer_auth(&request.token)
				.timeout(VALIDATION_TIMEOUT)
				.send()
				.await
				.map_err(|_| PlatformError::UpstreamUnreachable)?;
			let body: serde_json::Value =
				response.json().await.map_err(|_| PlatformError::UpstreamUnreachable)?;
			body.get("ok").and_then(|v| v.as_bool()).unwrap_or(false)
		},
		Channel::Discord => {
			let response = deps
				.http
				.get(format!("{}/api/v10/users/@me", config.discord_base))
				.header("Authorization", format!("Bot {}", request.token))
				.timeout(VALIDATION_TIMEOUT)
				.send()
				.await
				.map_err(|_| PlatformError::UpstreamUnreachable)?;
			response.status().is_success()
		},
		Channel::Telegram => {
			let response = deps
				.http
				.get(format!("{}/bot{}/getMe", config.telegram_base, request.token))
				.timeout(VALIDATION_TIMEOUT)
				.send()
				.await
				.map_err(|_| PlatformError::UpstreamUnreachable)?;
			let body: serde_json::Value =
				response.json().await.map_err(|_| PlatformError::UpstreamUnreachable)?;
			body.get("ok").and_then(|v| v.as_bool()).unwrap_or(false)
		},
	};

	Ok(Json(serde_json::json!({ "valid": valid, "plugin": plugin_id })).into_response())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn only_channel_plugins_are_testable() {
		assert!(channel_of("wopr-plugin-slack").is_some());
		assert!(channel_of("wopr-plugin-discord").is_some());
		assert!(channel_of("wopr-plugin-telegram").is_some());
		assert!(channel_of("wopr-plugin-weather").is_none());
	}
}
