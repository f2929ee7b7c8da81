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

//! Hosted-credential vault backed by the platform's own provider
//! keys: installing a hosted plugin pastes the platform credential
//! into the bot environment, and the gateway margins pay for it.

use async_trait::async_trait;
use fleet_gateway::GatewayConfig;
use fleet_traits::CredentialVault;
use fleet_types::PlatformError;

pub struct PlatformKeyVault {
	config: GatewayConfig,
}

impl PlatformKeyVault {
	pub fn new(config: GatewayConfig) -> Self {
		Self { config }
	}
}

#[async_trait]
impl CredentialVault for PlatformKeyVault {
	async fn active_credential(&self, provider: &str) -> Result<String, PlatformError> {
		let credential = match provider {
			"openrouter" => self.config.openrouter_key.clone(),
			"deepgram" => self.config.deepgram_key.clone(),
			"elevenlabs" => self.config.elevenlabs_key.clone(),
			"replicate" => self.config.replicate_token.clone(),
			"twilio" => self.config.twilio_token.clone(),
			_ => None,
		};
		credential.ok_or_else(|| {
			PlatformError::ServiceUnavailable(format!("no hosted credential for {provider}"))
		})
	}
}
