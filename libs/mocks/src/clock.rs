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

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use fleet_traits::Clock;

/// Clock advanced by hand. TTL and penalty tests step time instead of
/// sleeping.
pub struct ManualClock {
	now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
	pub fn starting_at(now: DateTime<Utc>) -> Self {
		Self { now: Mutex::new(now) }
	}

	pub fn advance(&self, by: Duration) {
		*self.now.lock().expect("clock mutex poisoned") += by;
	}
}

impl Default for ManualClock {
	fn default() -> Self {
		Self::starting_at(Utc::now())
	}
}

impl Clock for ManualClock {
	fn now(&self) -> DateTime<Utc> {
		*self.now.lock().expect("clock mutex poisoned")
	}
}
