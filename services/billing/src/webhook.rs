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

//! Webhook ingestion state machine.
//!
//! ```text
//! received ── missing sig ──▶ 400
//!    │
//! check-IP ── blocked ──────▶ 429 + Retry-After
//!    │
//! verify ── fails ──────────▶ record failure; 400 (first) / 429 (repeat)
//!    │  (success clears the counter)
//! replay ── already seen ───▶ 200 {duplicate: true}
//!    │
//! dispatch ─────────────────▶ 200 {handled, event_type, ...}
//! ```
//!
//! Handlers must be idempotent: the replay guard acknowledges
//! duplicates as success, and a handler may still run again if the
//! process dies between the guard insert and the ack.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use fleet_ledger::TenantDirectory;
use fleet_primitives::{Cents, TenantId};
use fleet_traits::{Clock, Ledger, PaymentProcessor};
use fleet_types::{ledger::LedgerEntryKind, PlatformError};
use serde::Serialize;
use tracing::{info, warn};

/// Exponential backoff base for signature failures.
const PENALTY_BASE_SECS: u64 = 1;

/// Backoff cap: one hour.
const PENALTY_CAP_SECS: u64 = 3600;

/// Event type that grants credits.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

#[derive(Debug, Clone)]
struct PenaltyState {
	failures: u32,
	blocked_until: DateTime<Utc>,
}

/// Acknowledgement returned for an accepted delivery.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookReceipt {
	pub handled: bool,
	#[serde(skip_serializing_if = "std::ops::Not::not")]
	pub duplicate: bool,
	pub event_type: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub tenant: Option<TenantId>,
	#[serde(rename = "creditedCents", skip_serializing_if = "Option::is_none")]
	pub credited_cents: Option<Cents>,
}

pub struct WebhookIngestor {
	processor: Arc<dyn PaymentProcessor>,
	ledger: Arc<dyn Ledger>,
	directory: Arc<TenantDirectory>,
	clock: Arc<dyn Clock>,
	/// `(ip, source)` → penalty. Penalties never bleed across sources.
	penalties: DashMap<(String, String), PenaltyState>,
	/// `(event_id, source)` seen-set: the replay guard.
	seen: DashMap<(String, String), ()>,
}

impl WebhookIngestor {
	pub fn new(
		processor: Arc<dyn PaymentProcessor>,
		ledger: Arc<dyn Ledger>,
		directory: Arc<TenantDirectory>,
		clock: Arc<dyn Clock>,
	) -> Self {
		Self {
			processor,
			ledger,
			directory,
			clock,
			penalties: DashMap::new(),
			seen: DashMap::new(),
		}
	}

	fn backoff_secs(failures: u32) -> u64 {
		PENALTY_BASE_SECS
			.saturating_mul(1u64 << (failures.saturating_sub(1)).min(12))
			.min(PENALTY_CAP_SECS)
	}

	/// Run one inbound request through the state machine. The body
	/// must be the raw bytes as received, captured before any JSON
	/// parsing, or signature verification operates on re-serialized
	/// content and fails.
	pub async fn handle(
		&self,
		source: &str,
		ip: &str,
		signature: Option<&str>,
		body: &[u8],
	) -> Result<WebhookReceipt, PlatformError> {
		let signature =
			signature.ok_or_else(|| PlatformError::WebhookRejected("missing signature".into()))?;

		let now = self.clock.now();
		let key = (ip.to_owned(), source.to_owned());

		if let Some(penalty) = self.penalties.get(&key) {
			if now < penalty.blocked_until {
				let retry_after_secs =
					(penalty.blocked_until - now).num_seconds().max(1) as u64;
				return Err(PlatformError::IpPenalty { retry_after_secs });
			}
		}

		if let Err(err) = self.processor.verify_signature(body, signature) {
			let mut entry = self
				.penalties
				.entry(key)
				.or_insert(PenaltyState { failures: 0, blocked_until: now });
			entry.failures += 1;
			let retry_after_secs = Self::backoff_secs(entry.failures);
			entry.blocked_until = now + Duration::seconds(retry_after_secs as i64);
			let failures = entry.failures;
			drop(entry);

			warn!(%source, %ip, failures, "webhook signature verification failed");
			return if failures == 1 {
				Err(err)
			} else {
				Err(PlatformError::IpPenalty { retry_after_secs })
			};
		}
		self.penalties.remove(&key);

		let event = self.processor.parse_event(body)?;

		if self.seen.insert((event.id.clone(), source.to_owned()), ()).is_some() {
			info!(%source, event = %event.id, "duplicate webhook delivery acknowledged");
			return Ok(WebhookReceipt {
				handled: true,
				duplicate: true,
				event_type: event.event_type,
				tenant: None,
				credited_cents: None,
			});
		}

		match event.event_type.as_str() {
			CHECKOUT_COMPLETED => {
				let amount = event.amount_total.ok_or_else(|| {
					PlatformError::WebhookRejected("checkout event without amount_total".into())
				})?;
				let tenant = event
					.client_reference_id
					.as_deref()
					.map(TenantId::from)
					.ok_or_else(|| {
						PlatformError::WebhookRejected(
							"checkout event without client_reference_id".into(),
						)
					})?;

				// Grant and customer record form the single atomic
				// crediting step; the grant itself is idempotent on
				// the event id should the guard ever be rebuilt.
				self.ledger
					.grant(&tenant, amount, LedgerEntryKind::Purchase, &event.id)
					.await?;
				if let Some(customer) = &event.customer {
					self.directory.record_customer(&tenant, customer);
				}

				info!(%tenant, %amount, event = %event.id, "credits granted from checkout");
				Ok(WebhookReceipt {
					handled: true,
					duplicate: false,
					event_type: event.event_type,
					tenant: Some(tenant),
					credited_cents: Some(amount),
				})
			},
			other => {
				info!(%source, event_type = other, "unhandled webhook event type");
				Ok(WebhookReceipt {
					handled: false,
					duplicate: false,
					event_type: event.event_type,
					tenant: None,
					credited_cents: None,
				})
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use fleet_ledger::CreditLedger;
	use fleet_mocks::{ManualClock, MockProcessor};
	use fleet_traits::Ledger as _;

	use super::*;

	const SECRET: &str = "test-signing-secret";

	fn ingestor() -> (Arc<WebhookIngestor>, Arc<CreditLedger>, Arc<ManualClock>) {
		let ledger = Arc::new(CreditLedger::new());
		let clock = Arc::new(ManualClock::default());
		let ingestor = Arc::new(WebhookIngestor::new(
			Arc::new(MockProcessor::default()),
			ledger.clone(),
			Arc::new(TenantDirectory::new()),
			clock.clone(),
		));
		(ingestor, ledger, clock)
	}

	fn checkout_body(event_id: &str, amount: i64, tenant: &str) -> Vec<u8> {
		serde_json::json!({
			"id": event_id,
			"type": CHECKOUT_COMPLETED,
			"amount_total": amount,
			"client_reference_id": tenant,
			"customer": "cus_42",
		})
		.to_string()
		.into_bytes()
	}

	#[tokio::test]
	async fn missing_signature_is_rejected() {
		let (ingestor, _, _) = ingestor();
		let err = ingestor
			.handle("stripe", "1.2.3.4", None, b"{}")
			.await
			.unwrap_err();
		assert!(matches!(err, PlatformError::WebhookRejected(_)));
	}

	#[tokio::test]
	async fn first_delivery_credits_the_tenant() {
		let (ingestor, ledger, _) = ingestor();
		let body = checkout_body("E1", 2500, "T");

		let receipt = ingestor
			.handle("stripe", "1.2.3.4", Some(SECRET), &body)
			.await
			.unwrap();
		assert!(receipt.handled);
		assert!(!receipt.duplicate);
		assert_eq!(receipt.tenant, Some(TenantId::from("T")));
		assert_eq!(receipt.credited_cents, Some(Cents::new(2500)));
		assert_eq!(ledger.balance(&TenantId::from("T")).await.unwrap(), Cents::new(2500));
	}

	#[tokio::test]
	async fn replay_is_acknowledged_and_leaves_the_ledger_unchanged() {
		let (ingestor, ledger, _) = ingestor();
		let body = checkout_body("E1", 2500, "T");

		ingestor.handle("stripe", "1.2.3.4", Some(SECRET), &body).await.unwrap();
		let replay = ingestor
			.handle("stripe", "1.2.3.4", Some(SECRET), &body)
			.await
			.unwrap();

		assert!(replay.handled);
		assert!(replay.duplicate);
		assert_eq!(ledger.balance(&TenantId::from("T")).await.unwrap(), Cents::new(2500));
	}

	#[tokio::test]
	async fn unknown_event_types_are_acknowledged_unhandled() {
		let (ingestor, _, _) = ingestor();
		let body = serde_json::json!({ "id": "E9", "type": "invoice.created" })
			.to_string()
			.into_bytes();
		let receipt = ingestor
			.handle("stripe", "1.2.3.4", Some(SECRET), &body)
			.await
			.unwrap();
		assert!(!receipt.handled);
	}

	#[tokio::test]
	async fn second_signature_failure_is_rate_limited_per_ip() {
		let (ingestor, _, clock) = ingestor();
		let body = checkout_body("E1", 100, "T");

		// First failure from X: plain 400.
		let err = ingestor
			.handle("stripe", "10.0.0.1", Some("forged"), &body)
			.await
			.unwrap_err();
		assert!(matches!(err, PlatformError::WebhookRejected(_)));

		// Second failure from X inside the window: 429 with Retry-After.
		let err = ingestor
			.handle("stripe", "10.0.0.1", Some("forged"), &body)
			.await
			.unwrap_err();
		match err {
			PlatformError::IpPenalty { retry_after_secs } => assert!(retry_after_secs > 0),
			other => panic!("expected penalty, got {other}"),
		}

		// A different ip with a bad signature is a plain 400.
		let err = ingestor
			.handle("stripe", "10.0.0.2", Some("forged"), &body)
			.await
			.unwrap_err();
		assert!(matches!(err, PlatformError::WebhookRejected(_)));

		// After the block expires, a successful verification clears X.
		clock.advance(Duration::hours(2));
		ingestor.handle("stripe", "10.0.0.1", Some(SECRET), &body).await.unwrap();
		let err = ingestor
			.handle("stripe", "10.0.0.1", Some("forged"), &body)
			.await
			.unwrap_err();
		assert!(matches!(err, PlatformError::WebhookRejected(_)), "counter was cleared");
	}

	#[tokio::test]
	async fn penalties_do_not_bleed_across_sources() {
		let (ingestor, _, _) = ingestor();
		let body = checkout_body("E1", 100, "T");

		ingestor.handle("stripe", "10.0.0.1", Some("forged"), &body).await.unwrap_err();
		ingestor.handle("stripe", "10.0.0.1", Some("forged"), &body).await.unwrap_err();

		// Same ip, different source: not blocked.
		let err = ingestor
			.handle("payram", "10.0.0.1", Some("forged"), &body)
			.await
			.unwrap_err();
		assert!(matches!(err, PlatformError::WebhookRejected(_)));
	}

	#[tokio::test]
	async fn backoff_doubles_and_caps() {
		assert_eq!(WebhookIngestor::backoff_secs(1), 1);
		assert_eq!(WebhookIngestor::backoff_secs(2), 2);
		assert_eq!(WebhookIngestor::backoff_secs(3), 4);
		assert_eq!(WebhookIngestor::backoff_secs(20), PENALTY_CAP_SECS);
	}
}
