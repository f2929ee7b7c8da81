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

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// TTL of a pending authorization awaiting the provider redirect.
pub const PENDING_TTL_MINUTES: i64 = 10;

/// TTL of a completed token awaiting the initiating user's poll.
pub const COMPLETED_TTL_MINUTES: i64 = 5;

/// Authorization in flight: created by `initiate`, consumed exactly
/// once by the provider callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAuthorization {
	pub state: String,
	pub provider: String,
	pub user_id: String,
	pub redirect_uri: String,
	pub created_at: DateTime<Utc>,
}

impl PendingAuthorization {
	pub fn expires_at(&self) -> DateTime<Utc> {
		self.created_at + Duration::minutes(PENDING_TTL_MINUTES)
	}

	pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
		now >= self.expires_at()
	}
}

/// Exchanged token parked for the initiating user's poll. Consumed
/// exactly once, and only by that user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedToken {
	pub state: String,
	pub access_token: String,
	pub user_id: String,
	pub created_at: DateTime<Utc>,
}

impl CompletedToken {
	pub fn expires_at(&self) -> DateTime<Utc> {
		self.created_at + Duration::minutes(COMPLETED_TTL_MINUTES)
	}

	pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
		now >= self.expires_at()
	}
}
