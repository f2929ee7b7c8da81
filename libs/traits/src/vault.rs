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

use async_trait::async_trait;
use fleet_types::PlatformError;

/// Source of platform-hosted upstream credentials, keyed by vault
/// provider name (`openrouter`, `elevenlabs`, ...). The composer
/// writes the returned secret into the bot environment at install
/// time; rotation is not reflected into installed bots.
#[async_trait]
pub trait CredentialVault: Send + Sync {
	async fn active_credential(&self, provider: &str) -> Result<String, PlatformError>;
}
