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
use fleet_primitives::{Cents, TenantId};
use fleet_traits::PaymentProcessor;
use fleet_types::{
	payments::{CheckoutSession, PortalSession, ProcessorEvent, SetupIntent},
	PlatformError,
};

/// Processor double: a request is "signed" when its signature equals
/// the configured secret, and event payloads are plain JSON
/// [`ProcessorEvent`]s.
pub struct MockProcessor {
	secret: String,
}

impl MockProcessor {
	pub fn with_secret(secret: impl Into<String>) -> Self {
		Self { secret: secret.into() }
	}
}

impl Default for MockProcessor {
	fn default() -> Self {
		Self::with_secret("test-signing-secret")
	}
}

#[async_trait]
impl PaymentProcessor for MockProcessor {
	fn verify_signature(&self, _payload: &[u8], signature: &str) -> Result<(), PlatformError> {
		if signature == self.secret {
			Ok(())
		} else {
			Err(PlatformError::WebhookRejected("signature mismatch".into()))
		}
	}

	fn parse_event(&self, payload: &[u8]) -> Result<ProcessorEvent, PlatformError> {
		serde_json::from_slice(payload)
			.map_err(|e| PlatformError::WebhookRejected(format!("malformed event body: {e}")))
	}

	async fn create_checkout(
		&self,
		tenant: &TenantId,
		amount: Cents,
		_customer: Option<&str>,
	) -> Result<CheckoutSession, PlatformError> {
		Ok(CheckoutSession {
			id: format!("cs_test_{tenant}"),
			url: format!("https://checkout.test/{tenant}/{}", amount.get()),
		})
	}

	async fn create_portal(&self, customer: &str) -> Result<PortalSession, PlatformError> {
		Ok(PortalSession { url: format!("https://portal.test/{customer}") })
	}

	async fn create_setup_intent(&self, customer: &str) -> Result<SetupIntent, PlatformError> {
		Ok(SetupIntent {
			id: format!("seti_test_{customer}"),
			client_secret: format!("seti_secret_{customer}"),
		})
	}

	async fn detach_payment_method(
		&self,
		method_id: &str,
		owner: &str,
	) -> Result<(), PlatformError> {
		// Convention for tests: a method id carries its owner as a
		// `pm_<owner>_...` prefix.
		if method_id.starts_with(&format!("pm_{owner}_")) {
			Ok(())
		} else {
			Err(PlatformError::PaymentMethodOwnership)
		}
	}
}
