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

//! OAuth provider registry: authorize-URL construction and the code
//! exchange.

use std::{collections::HashMap, time::Duration};

use fleet_types::PlatformError;
use serde::Deserialize;

/// Timeout for the token exchange leg.
const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct OauthProviderConfig {
	pub name: String,
	pub client_id: String,
	pub client_secret: String,
	pub authorize_url: String,
	pub token_url: String,
	pub scopes: String,
}

impl OauthProviderConfig {
	pub fn slack(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
		Self {
			name: "slack".to_owned(),
			client_id: client_id.into(),
			client_secret: client_secret.into(),
			authorize_url: "https://slack.com/oauth/v2/authorize".to_owned(),
			token_url: "https://slack.com/api/oauth.v2.access".to_owned(),
			scopes: "app_mentions:read,chat:write,channels:history".to_owned(),
		}
	}

	/// The URL the popup is sent to.
	pub fn authorize_redirect(&self, state: &str, redirect_uri: &str) -> String {
		format!(
			"{}?client_id={}&scope={}&state={}&redirect_uri={}",
			self.authorize_url,
			urlencoding::encode(&self.client_id),
			urlencoding::encode(&self.scopes),
			urlencoding::encode(state),
			urlencoding::encode(redirect_uri),
		)
	}
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
	#[serde(default)]
	ok: Option<bool>,
	#[serde(default)]
	access_token: Option<String>,
	#[serde(default)]
	error: Option<String>,
}

#[derive(Default)]
pub struct OauthProviders {
	providers: HashMap<String, OauthProviderConfig>,
}

impl OauthProviders {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&mut self, config: OauthProviderConfig) {
		self.providers.insert(config.name.clone(), config);
	}

	pub fn get(&self, name: &str) -> Result<&OauthProviderConfig, PlatformError> {
		self.providers
			.get(name)
			.ok_or_else(|| PlatformError::ServiceUnavailable(format!("oauth provider {name}")))
	}

	/// Exchange the authorization code for an access token.
	pub async fn exchange_code(
		&self,
		http: &reqwest::Client,
		provider: &str,
		code: &str,
		redirect_uri: &str,
	) -> Result<String, PlatformError> {
		let config = self.get(provider)?;

		let response = http
			.post(&config.token_url)
			.timeout(EXCHANGE_TIMEOUT)
			.form(&[
				("client_id", config.client_id.as_str()),
				("client_secret", config.client_secret.as_str()),
				("code", code),
				("redirect_uri", redirect_uri),
			])
			.send()
			.await
			.map_err(|err| {
				tracing::warn!(%err, provider, "token exchange transport failure");
				PlatformError::UpstreamUnreachable
			})?;

		if !response.status().is_success() {
			return Err(PlatformError::Upstream {
				status: 502,
				message: "token exchange failed".into(),
			});
		}

		let token: TokenResponse =
			response.json().await.map_err(|_| PlatformError::UpstreamUnreachable)?;

		// Slack reports failure inside a 200 body.
		if token.ok == Some(false) {
			return Err(PlatformError::Upstream {
				status: 502,
				message: format!(
					"provider refused the code: {}",
					token.error.unwrap_or_else(|| "unknown".into())
				),
			});
		}
		token.access_token.ok_or(PlatformError::UpstreamUnreachable)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn authorize_redirect_escapes_every_component() {
		let config = OauthProviderConfig::slack("client id", "secret");
		let url = config.authorize_redirect("abc123", "https://fleet.example/api/cb?x=1");
		assert!(url.starts_with("https://slack.com/oauth/v2/authorize?"));
		assert!(url.contains("client_id=client%20id"));
		assert!(url.contains("state=abc123"));
		assert!(url.contains("redirect_uri=https%3A%2F%2Ffleet.example%2Fapi%2Fcb%3Fx%3D1"));
	}

	#[tokio::test]
	async fn exchange_surfaces_in_body_failures() {
		let mut server = mockito::Server::new_async().await;
		server
			.mock("POST", "/api/oauth.v2.access")
			.with_status(200)
			.with_body(r#"{"ok":false,"error":"invalid_code"}"#)
			.create_async()
			.await;

		let mut providers = OauthProviders::new();
		let mut config = OauthProviderConfig::slack("id", "secret");
		config.token_url = format!("{}/api/oauth.v2.access", server.url());
		providers.register(config);

		let err = providers
			.exchange_code(&reqwest::Client::new(), "slack", "bad", "https://x/cb")
			.await
			.unwrap_err();
		assert!(matches!(err, PlatformError::Upstream { .. }));
	}

	#[tokio::test]
	async fn exchange_returns_the_access_token() {
		let mut server = mockito::Server::new_async().await;
		server
			.mock("POST", "/api/oauth.v2.access")
			.with_status(200)
			.with_body(r#"{"ok":true,"access_token":"xoxb-1"}"#)
			.create_async()
			.await;

		let mut providers = OauthProviders::new();
		let mut config = OauthProviderConfig::slack("id", "secret");
		config.token_url = format!("{}/api/oauth.v2.access", server.url());
		providers.register(config);

		let token = providers
			.exchange_code(&reqwest::Client::new(), "slack", "good", "https://x/cb")
			.await
			.unwrap();
		assert_eq!(token, "xoxb-1");
	}
}
