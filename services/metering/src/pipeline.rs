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

use std::sync::Arc;

use fleet_traits::MeterSink;
use fleet_types::metering::MeterEvent;
use tokio::sync::mpsc;
use tracing::warn;

use crate::MeterStore;

/// Non-blocking front of the meter store.
///
/// Gateway handlers call [`MeterSink::emit`] on the hot path; the
/// send never waits and never errors the caller. A closed pipeline
/// (shutdown) drops the event with a warning, which loses revenue
/// for that one call but never fails a request that already
/// succeeded upstream.
pub struct MeterPipeline {
	tx: mpsc::UnboundedSender<MeterEvent>,
}

impl MeterPipeline {
	/// Spawn the ingestion worker and return the sending half.
	pub fn start(store: Arc<MeterStore>) -> Self {
		let (tx, mut rx) = mpsc::unbounded_channel::<MeterEvent>();
		tokio::spawn(async move {
			while let Some(event) = rx.recv().await {
				store.ingest(event);
			}
		});
		Self { tx }
	}
}

impl MeterSink for MeterPipeline {
	fn emit(&self, event: MeterEvent) {
		if let Err(err) = self.tx.send(event) {
			warn!(event = %err.0.id, "meter pipeline closed, dropping event");
		}
	}
}

#[cfg(test)]
mod tests {
	use fleet_primitives::{Cents, CostCents, TenantId};
	use fleet_types::Capability;

	use super::*;

	#[tokio::test]
	async fn emitted_events_reach_the_store() {
		let store = Arc::new(MeterStore::new());
		let pipeline = MeterPipeline::start(store.clone());

		let tenant = TenantId::from("t");
		pipeline.emit(MeterEvent::new(
			tenant.clone(),
			Capability::Tts,
			"elevenlabs",
			CostCents::new(0.5),
			Cents::new(1),
		));

		// The worker runs on the same runtime; yield until it drains.
		for _ in 0..100 {
			if !store.events_for(&tenant).is_empty() {
				break;
			}
			tokio::task::yield_now().await;
		}
		assert_eq!(store.events_for(&tenant).len(), 1);
	}
}
