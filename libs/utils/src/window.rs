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

use chrono::{DateTime, Datelike, DurationRound, TimeDelta, Utc};

/// Floor a timestamp to its aggregation-window start (one minute).
pub fn window_start(at: DateTime<Utc>) -> DateTime<Utc> {
	at.duration_trunc(TimeDelta::minutes(1)).expect("minute truncation never overflows")
}

/// Start of the UTC day containing `at`, for daily spend caps.
pub fn day_start(at: DateTime<Utc>) -> DateTime<Utc> {
	at.duration_trunc(TimeDelta::days(1)).expect("day truncation never overflows")
}

/// Start of the UTC month containing `at`, for monthly spend caps.
pub fn month_start(at: DateTime<Utc>) -> DateTime<Utc> {
	at.date_naive()
		.with_day0(0)
		.expect("day zero always exists")
		.and_hms_opt(0, 0, 0)
		.expect("midnight always exists")
		.and_utc()
}
