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

//! Stripe-flavored implementation of the payment-processor seam.
//!
//! Webhook signatures follow the `t=<unix>,v1=<hmac>` scheme: the
//! HMAC-SHA256 of `"{t}.{raw body}"` under the signing secret, with a
//! bounded timestamp tolerance against replayed headers.

use async_trait::async_trait;
use chrono::Utc;
use fleet_primitives::{Cents, TenantId};
use fleet_traits::PaymentProcessor;
use fleet_types::{
	payments::{CheckoutSession, PortalSession, ProcessorEvent, SetupIntent},
	PlatformError,
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

/// Accepted clock skew between the signature timestamp and now.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

pub struct StripeProcessor {
	secret_key: String,
	signing_secret: String,
	base_url: String,
	success_url: String,
	http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
	id: String,
	#[serde(rename = "type")]
	event_type: String,
	#[serde(default)]
	data: RawEventData,
}

#[derive(Debug, Default, Deserialize)]
struct RawEventData {
	#[serde(default)]
	object: RawEventObject,
}

#[derive(Debug, Default, Deserialize)]
struct RawEventObject {
	#[serde(default)]
	amount_total: Option<i64>,
	#[serde(default)]
	client_reference_id: Option<String>,
	#[serde(default)]
	customer: Option<String>,
}

impl StripeProcessor {
	pub fn new(
		secret_key: impl Into<String>,
		signing_secret: impl Into<String>,
		success_url: impl Into<String>,
	) -> Self {
		Self {
			secret_key: secret_key.into(),
			signing_secret: signing_secret.into(),
			base_url: "https://api.stripe.com".to_owned(),
			success_url: success_url.into(),
			http: reqwest::Client::new(),
		}
	}

	pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
		self.base_url = base_url.into();
		self
	}

	fn hmac_hex(&self, signed_payload: &str) -> Result<String, PlatformError> {
		let mut mac = Hmac::<Sha256>::new_from_slice(self.signing_secret.as_bytes())
			.map_err(|_| PlatformError::Internal("webhook signing key".into()))?;
		mac.update(signed_payload.as_bytes());
		Ok(hex::encode(mac.finalize().into_bytes()))
	}

	async fn form_post(
		&self,
		path: &str,
		params: &[(&str, String)],
	) -> Result<serde_json::Value, PlatformError> {
		let response = self
			.http
			.post(format!("{}{path}", self.base_url))
			.basic_auth(&self.secret_key, Option::<&str>::None)
			.form(params)
			.send()
			.await
			.map_err(|err| {
				tracing::warn!(%err, path, "payment processor unreachable");
				PlatformError::UpstreamUnreachable
			})?;

		let status = response.status();
		if !status.is_success() {
			return Err(PlatformError::Upstream {
				status: 502,
				message: "payment processor rejected the request".into(),
			});
		}
		response.json().await.map_err(|_| PlatformError::UpstreamUnreachable)
	}
}

#[async_trait]
impl PaymentProcessor for StripeProcessor {
	fn verify_signature(&self, payload: &[u8], signature: &str) -> Result<(), PlatformError> {
		let mut timestamp: Option<i64> = None;
		let mut candidate: Option<&str> = None;
		for part in signature.split(',') {
			match part.split_once('=') {
				Some(("t", value)) => timestamp = value.parse().ok(),
				Some(("v1", value)) => candidate = Some(value),
				_ => {},
			}
		}
		let (timestamp, candidate) = match (timestamp, candidate) {
			(Some(t), Some(c)) => (t, c),
			_ => return Err(PlatformError::WebhookRejected("malformed signature header".into())),
		};

		if (Utc::now().timestamp() - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
			return Err(PlatformError::WebhookRejected("signature timestamp too old".into()));
		}

		let signed_payload = format!("{timestamp}.{}", String::from_utf8_lossy(payload));
		let expected = self.hmac_hex(&signed_payload)?;
		if expected == candidate {
			Ok(())
		} else {
			Err(PlatformError::WebhookRejected("signature mismatch".into()))
		}
	}

	fn parse_event(&self, payload: &[u8]) -> Result<ProcessorEvent, PlatformError> {
		let raw: RawEvent = serde_json::from_slice(payload)
			.map_err(|e| PlatformError::WebhookRejected(format!("malformed event body: {e}")))?;
		Ok(ProcessorEvent {
			id: raw.id,
			event_type: raw.event_type,
			amount_total: raw.data.object.amount_total.map(Cents::new),
			client_reference_id: raw.data.object.client_reference_id,
			customer: raw.data.object.customer,
		})
	}

	async fn create_checkout(
		&self,
		tenant: &TenantId,
		amount: Cents,
		customer: Option<&str>,
	) -> Result<CheckoutSession, PlatformError> {
		let mut params = vec![
			("mode", "payment".to_owned()),
			("client_reference_id", tenant.to_string()),
			("success_url", self.success_url.clone()),
			("line_items[0][quantity]", "1".to_owned()),
			("line_items[0][price_data][currency]", "usd".to_owned()),
			(
				"line_items[0][price_data][unit_amount]",
				amount.get().to_string(),
			),
			(
				"line_items[0][price_data][product_data][name]",
				"Fleet credits".to_owned(),
			),
		];
		if let Some(customer) = customer {
			params.push(("customer", customer.to_owned()));
		}

		let body = self.form_post("/v1/checkout/sessions", &params).await?;
		Ok(CheckoutSession {
			id: body.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_owned(),
			url: body.get("url").and_then(|v| v.as_str()).unwrap_or_default().to_owned(),
		})
	}

	async fn create_portal(&self, customer: &str) -> Result<PortalSession, PlatformError> {
		let params = vec![
			("customer", customer.to_owned()),
			("return_url", self.success_url.clone()),
		];
		let body = self.form_post("/v1/billing_portal/sessions", &params).await?;
		Ok(PortalSession {
			url: body.get("url").and_then(|v| v.as_str()).unwrap_or_default().to_owned(),
		})
	}

	async fn create_setup_intent(&self, customer: &str) -> Result<SetupIntent, PlatformError> {
		let params = vec![("customer", customer.to_owned())];
		let body = self.form_post("/v1/setup_intents", &params).await?;
		Ok(SetupIntent {
			id: body.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_owned(),
			client_secret: body
				.get("client_secret")
				.and_then(|v| v.as_str())
				.unwrap_or_default()
				.to_owned(),
		})
	}

	async fn detach_payment_method(
		&self,
		method_id: &str,
		owner: &str,
	) -> Result<(), PlatformError> {
		// The method must belong to the caller's customer record.
		let body = self
			.form_post(&format!("/v1/payment_methods/{method_id}"), &[])
			.await?;
		let attached_to = body.get("customer").and_then(|v| v.as_str());
		if attached_to != Some(owner) {
			return Err(PlatformError::PaymentMethodOwnership);
		}
		self.form_post(&format!("/v1/payment_methods/{method_id}/detach"), &[])
			.await?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn processor() -> StripeProcessor {
		StripeProcessor::new("sk_test", "whsec_test", "https://fleet.example/credits")
	}

	fn sign(processor: &StripeProcessor, body: &str, timestamp: i64) -> String {
		let hex = processor.hmac_hex(&format!("{timestamp}.{body}")).unwrap();
		format!("t={timestamp},v1={hex}")
	}

	#[test]
	fn valid_signature_verifies() {
		let p = processor();
		let body = r#"{"id":"evt_1"}"#;
		let header = sign(&p, body, Utc::now().timestamp());
		assert!(p.verify_signature(body.as_bytes(), &header).is_ok());
	}

	#[test]
	fn tampered_body_fails_verification() {
		let p = processor();
		let header = sign(&p, r#"{"id":"evt_1"}"#, Utc::now().timestamp());
		assert!(p.verify_signature(br#"{"id":"evt_2"}"#, &header).is_err());
	}

	#[test]
	fn stale_timestamp_fails_verification() {
		let p = processor();
		let body = r#"{"id":"evt_1"}"#;
		let header = sign(&p, body, Utc::now().timestamp() - 4000);
		assert!(p.verify_signature(body.as_bytes(), &header).is_err());
	}

	#[test]
	fn events_parse_from_the_nested_object() {
		let p = processor();
		let body = serde_json::json!({
			"id": "evt_1",
			"type": "checkout.session.completed",
			"data": { "object": {
				"amount_total": 2500,
				"client_reference_id": "acme",
				"customer": "cus_7",
			}},
		})
		.to_string();

		let event = p.parse_event(body.as_bytes()).unwrap();
		assert_eq!(event.id, "evt_1");
		assert_eq!(event.amount_total, Some(Cents::new(2500)));
		assert_eq!(event.client_reference_id.as_deref(), Some("acme"));
	}
}
