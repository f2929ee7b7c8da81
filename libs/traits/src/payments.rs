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
use fleet_types::{
	payments::{CheckoutSession, PortalSession, ProcessorEvent, SetupIntent},
	PlatformError,
};

/// The payment processor as the platform sees it.
///
/// `verify_signature` and `parse_event` take the raw request bytes:
/// the webhook handler captures the body before any JSON parsing so
/// the HMAC is computed over exactly what the processor signed.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
	fn verify_signature(&self, payload: &[u8], signature: &str) -> Result<(), PlatformError>;

	fn parse_event(&self, payload: &[u8]) -> Result<ProcessorEvent, PlatformError>;

	async fn create_checkout(
		&self,
		tenant: &TenantId,
		amount: Cents,
		customer: Option<&str>,
	) -> Result<CheckoutSession, PlatformError>;

	async fn create_portal(&self, customer: &str) -> Result<PortalSession, PlatformError>;

	async fn create_setup_intent(&self, customer: &str) -> Result<SetupIntent, PlatformError>;

	/// Detach a saved payment method. `owner` is the customer the
	/// method must belong to; a mismatch is
	/// `PlatformError::PaymentMethodOwnership`.
	async fn detach_payment_method(
		&self,
		method_id: &str,
		owner: &str,
	) -> Result<(), PlatformError>;
}
