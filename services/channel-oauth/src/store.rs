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

//! One-shot, TTL-indexed OAuth state.
//!
//! `consume_*` operations are atomic return-with-delete; a consumed
//! or expired state behaves identically to one that never existed, so
//! a replayed callback or poll learns nothing.

use std::sync::Arc;

use dashmap::DashMap;
use fleet_traits::Clock;
use fleet_types::oauth::{CompletedToken, PendingAuthorization};
use rand::RngCore;
use tracing::debug;

/// Fraction of requests that trigger an opportunistic purge.
const PURGE_PROBABILITY: f64 = 0.01;

pub struct ChannelOauthStore {
	pending: DashMap<String, PendingAuthorization>,
	completed: DashMap<String, CompletedToken>,
	clock: Arc<dyn Clock>,
}

fn random_state() -> String {
	let mut bytes = [0u8; 16];
	rand::thread_rng().fill_bytes(&mut bytes);
	hex::encode(bytes)
}

impl ChannelOauthStore {
	pub fn new(clock: Arc<dyn Clock>) -> Self {
		Self { pending: DashMap::new(), completed: DashMap::new(), clock }
	}

	/// Park a new pending authorization and return it. The state is
	/// 128 bits of hex; collisions are negligible at any realistic
	/// scale.
	pub fn create_pending(
		&self,
		provider: &str,
		user_id: &str,
		redirect_uri: &str,
	) -> PendingAuthorization {
		let pending = PendingAuthorization {
			state: random_state(),
			provider: provider.to_owned(),
			user_id: user_id.to_owned(),
			redirect_uri: redirect_uri.to_owned(),
			created_at: self.clock.now(),
		};
		self.pending.insert(pending.state.clone(), pending.clone());
		pending
	}

	/// Return and delete the pending record. Missing, already
	/// consumed and expired states all read as `None`.
	pub fn consume_pending(&self, state: &str) -> Option<PendingAuthorization> {
		let (_, pending) = self.pending.remove(state)?;
		if pending.is_expired(self.clock.now()) {
			debug!(state, "pending authorization expired before the callback");
			return None;
		}
		Some(pending)
	}

	pub fn complete_with_token(&self, state: &str, access_token: &str, user_id: &str) {
		self.completed.insert(
			state.to_owned(),
			CompletedToken {
				state: state.to_owned(),
				access_token: access_token.to_owned(),
				user_id: user_id.to_owned(),
				created_at: self.clock.now(),
			},
		);
	}

	/// Return and delete the completed token, but only for the user
	/// who initiated the flow. A mismatched caller leaves the record
	/// in place and learns nothing.
	pub fn consume_completed(&self, state: &str, user_id: &str) -> Option<CompletedToken> {
		let (_, token) = self.completed.remove_if(state, |_, token| token.user_id == user_id)?;
		if token.is_expired(self.clock.now()) {
			return None;
		}
		Some(token)
	}

	/// Drop every expired record. Invoked on a ~1% sample of requests
	/// and available to a scheduled sweeper.
	pub fn purge_expired(&self) -> usize {
		let now = self.clock.now();
		let before = self.pending.len() + self.completed.len();
		self.pending.retain(|_, pending| !pending.is_expired(now));
		self.completed.retain(|_, token| !token.is_expired(now));
		before - (self.pending.len() + self.completed.len())
	}

	/// Probabilistic cleanup hook for request paths.
	pub fn maybe_purge(&self) {
		if rand::random::<f64>() < PURGE_PROBABILITY {
			let purged = self.purge_expired();
			if purged > 0 {
				debug!(purged, "purged expired oauth state");
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use chrono::Duration;
	use fleet_mocks::ManualClock;

	use super::*;

	fn store() -> (ChannelOauthStore, Arc<ManualClock>) {
		let clock = Arc::new(ManualClock::default());
		(ChannelOauthStore::new(clock.clone()), clock)
	}

	#[test]
	fn pending_is_single_use() {
		let (store, _) = store();
		let pending = store.create_pending("slack", "user-a", "https://x/cb");

		assert!(store.consume_pending(&pending.state).is_some());
		assert!(store.consume_pending(&pending.state).is_none());
	}

	#[test]
	fn pending_expires_after_ten_minutes() {
		let (store, clock) = store();
		let pending = store.create_pending("slack", "user-a", "https://x/cb");

		clock.advance(Duration::minutes(11));
		assert!(store.consume_pending(&pending.state).is_none());
	}

	#[test]
	fn completed_token_is_owner_only_and_single_use() {
		let (store, _) = store();
		let pending = store.create_pending("slack", "user-b", "https://x/cb");
		store.complete_with_token(&pending.state, "xoxb-token", "user-b");

		// A third party polling the state learns nothing and does not
		// consume it.
		assert!(store.consume_completed(&pending.state, "user-a").is_none());

		let token = store.consume_completed(&pending.state, "user-b").unwrap();
		assert_eq!(token.access_token, "xoxb-token");

		// One shot.
		assert!(store.consume_completed(&pending.state, "user-b").is_none());
	}

	#[test]
	fn completed_token_expires_after_five_minutes() {
		let (store, clock) = store();
		store.complete_with_token("s1", "tok", "user-b");
		clock.advance(Duration::minutes(6));
		assert!(store.consume_completed("s1", "user-b").is_none());
	}

	#[test]
	fn purge_drops_only_expired_records() {
		let (store, clock) = store();
		store.create_pending("slack", "u", "https://x/cb");
		clock.advance(Duration::minutes(7));
		store.create_pending("slack", "u", "https://x/cb");

		// First record is past its 10 minute TTL, second is not.
		clock.advance(Duration::minutes(4));
		assert_eq!(store.purge_expired(), 1);
	}

	#[test]
	fn states_are_128_bit_hex() {
		let (store, _) = store();
		let pending = store.create_pending("slack", "u", "https://x/cb");
		assert_eq!(pending.state.len(), 32);
		assert!(pending.state.chars().all(|c| c.is_ascii_hexdigit()));
	}
}
