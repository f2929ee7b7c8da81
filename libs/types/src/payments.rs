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

use fleet_primitives::Cents;
use serde::{Deserialize, Serialize};

/// Parsed payment-processor event, the only shape the ingestor
/// dispatches on. Unknown event types are acknowledged unhandled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorEvent {
	pub id: String,
	#[serde(rename = "type")]
	pub event_type: String,
	/// Cents granted on `checkout.session.completed`.
	#[serde(default)]
	pub amount_total: Option<Cents>,
	/// Tenant the credits belong to.
	#[serde(default)]
	pub client_reference_id: Option<String>,
	/// Processor-side customer id, recorded for portal sessions.
	#[serde(default)]
	pub customer: Option<String>,
}

/// Hosted credit-purchase session handed back to the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
	pub id: String,
	pub url: String,
}

/// Hosted customer-portal session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalSession {
	pub url: String,
}

/// Saved-payment-method setup handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupIntent {
	pub id: String,
	pub client_secret: String,
}
