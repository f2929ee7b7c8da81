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

use chrono::{DateTime, Utc};
use fleet_primitives::{PluginId, SetupSessionId};
use serde::{Deserialize, Serialize};

/// Errors tolerated before a setup session rolls itself back.
pub const MAX_SETUP_ERRORS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupStatus {
	InProgress,
	Completed,
	RolledBack,
}

impl SetupStatus {
	pub fn is_terminal(&self) -> bool {
		!matches!(self, SetupStatus::InProgress)
	}
}

/// Short-lived guided-plugin-setup state. At most one in-progress
/// session exists per bot session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupSession {
	pub id: SetupSessionId,
	pub bot_session: String,
	pub plugin: PluginId,
	pub status: SetupStatus,
	pub started_at: DateTime<Utc>,
	pub error_count: u32,
}
