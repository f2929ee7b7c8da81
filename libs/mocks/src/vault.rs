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

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use fleet_traits::CredentialVault;
use fleet_types::PlatformError;

/// Credential vault backed by a plain map.
#[derive(Default)]
pub struct MockVault {
	credentials: Mutex<HashMap<String, String>>,
}

impl MockVault {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&self, provider: impl Into<String>, secret: impl Into<String>) {
		self.credentials
			.lock()
			.expect("vault mutex poisoned")
			.insert(provider.into(), secret.into());
	}
}

#[async_trait]
impl CredentialVault for MockVault {
	async fn active_credential(&self, provider: &str) -> Result<String, PlatformError> {
		self.credentials
			.lock()
			.expect("vault mutex poisoned")
			.get(provider)
			.cloned()
			.ok_or_else(|| {
				PlatformError::ServiceUnavailable(format!("no hosted credential for {provider}"))
			})
	}
}
