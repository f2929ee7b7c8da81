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

//! Guided-plugin-setup sessions.
//!
//! A bot session walks a tenant through configuring one plugin. At
//! most one session per bot session is in progress; `complete` and
//! `rollback` are terminal, and three recorded errors roll the
//! session back automatically.

use std::{collections::HashMap, sync::Mutex};

use chrono::Utc;
use fleet_primitives::{PluginId, SetupSessionId};
use fleet_types::{
	setup::{SetupSession, SetupStatus, MAX_SETUP_ERRORS},
	PlatformError,
};
use tracing::info;

#[derive(Default)]
pub struct SetupSessionManager {
	sessions: Mutex<HashMap<SetupSessionId, SetupSession>>,
}

impl SetupSessionManager {
	pub fn new() -> Self {
		Self::default()
	}

	/// Start a session. A second in-progress session for the same bot
	/// session is a conflict, mirroring the storage unique constraint.
	pub fn start(
		&self,
		bot_session: &str,
		plugin: PluginId,
	) -> Result<SetupSession, PlatformError> {
		let mut sessions = self.sessions.lock().expect("sessions lock poisoned");

		if sessions
			.values()
			.any(|s| s.bot_session == bot_session && s.status == SetupStatus::InProgress)
		{
			return Err(PlatformError::Conflict(format!(
				"a setup session is already in progress for {bot_session}"
			)));
		}

		let session = SetupSession {
			id: SetupSessionId::generate(),
			bot_session: bot_session.to_owned(),
			plugin,
			status: SetupStatus::InProgress,
			started_at: Utc::now(),
			error_count: 0,
		};
		sessions.insert(session.id, session.clone());
		Ok(session)
	}

	/// The in-progress session for a bot session, if any.
	pub fn check_for_resumable(&self, bot_session: &str) -> Option<SetupSession> {
		self.sessions
			.lock()
			.expect("sessions lock poisoned")
			.values()
			.find(|s| s.bot_session == bot_session && s.status == SetupStatus::InProgress)
			.cloned()
	}

	fn transition(
		&self,
		id: SetupSessionId,
		to: SetupStatus,
	) -> Result<SetupSession, PlatformError> {
		let mut sessions = self.sessions.lock().expect("sessions lock poisoned");
		let session = sessions
			.get_mut(&id)
			.filter(|s| s.status == SetupStatus::InProgress)
			.ok_or_else(|| PlatformError::NotFound("setup session".into()))?;
		session.status = to;
		Ok(session.clone())
	}

	pub fn complete(&self, id: SetupSessionId) -> Result<SetupSession, PlatformError> {
		self.transition(id, SetupStatus::Completed)
	}

	pub fn rollback(&self, id: SetupSessionId) -> Result<SetupSession, PlatformError> {
		self.transition(id, SetupStatus::RolledBack)
	}

	/// Count an error; the third one rolls the session back.
	pub fn record_error(&self, id: SetupSessionId) -> Result<SetupSession, PlatformError> {
		let mut sessions = self.sessions.lock().expect("sessions lock poisoned");
		let session = sessions
			.get_mut(&id)
			.filter(|s| s.status == SetupStatus::InProgress)
			.ok_or_else(|| PlatformError::NotFound("setup session".into()))?;

		session.error_count += 1;
		if session.error_count >= MAX_SETUP_ERRORS {
			session.status = SetupStatus::RolledBack;
			info!(session = %id, "setup session rolled back after repeated errors");
		}
		Ok(session.clone())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn plugin() -> PluginId {
		PluginId::parse("wopr-plugin-discord").unwrap()
	}

	#[test]
	fn one_in_progress_session_per_bot_session() {
		let manager = SetupSessionManager::new();
		manager.start("session-1", plugin()).unwrap();

		let err = manager.start("session-1", plugin()).unwrap_err();
		assert!(matches!(err, PlatformError::Conflict(_)));

		// A different bot session is unaffected.
		manager.start("session-2", plugin()).unwrap();
	}

	#[test]
	fn terminal_transitions_return_not_found_afterwards() {
		let manager = SetupSessionManager::new();
		let session = manager.start("session-1", plugin()).unwrap();

		manager.complete(session.id).unwrap();
		assert!(matches!(
			manager.complete(session.id),
			Err(PlatformError::NotFound(_))
		));
		assert!(matches!(
			manager.rollback(session.id),
			Err(PlatformError::NotFound(_))
		));

		// The slot is free again.
		manager.start("session-1", plugin()).unwrap();
	}

	#[test]
	fn three_errors_roll_the_session_back() {
		let manager = SetupSessionManager::new();
		let session = manager.start("session-1", plugin()).unwrap();

		assert_eq!(manager.record_error(session.id).unwrap().status, SetupStatus::InProgress);
		assert_eq!(manager.record_error(session.id).unwrap().status, SetupStatus::InProgress);
		let third = manager.record_error(session.id).unwrap();
		assert_eq!(third.status, SetupStatus::RolledBack);
		assert_eq!(third.error_count, 3);

		assert!(manager.check_for_resumable("session-1").is_none());
	}

	#[test]
	fn resumable_returns_the_open_session() {
		let manager = SetupSessionManager::new();
		let session = manager.start("session-1", plugin()).unwrap();
		assert_eq!(manager.check_for_resumable("session-1").unwrap().id, session.id);
		assert!(manager.check_for_resumable("session-9").is_none());
	}
}
