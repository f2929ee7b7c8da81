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

//! Durable profile storage under `FLEET_DATA_DIR`: one
//! `<bot-id>/profile.json` per bot, written atomically via a sibling
//! temp file.

use std::{
	fs,
	path::{Path, PathBuf},
	sync::Arc,
};

use dashmap::DashMap;
use fleet_primitives::{BotId, TenantId};
use fleet_types::{profile::BotProfile, PlatformError};
use tokio::sync::{Mutex, OwnedMutexGuard};

pub struct ProfileStore {
	root: PathBuf,
	/// Per-bot write lock: read-modify-write sequences must re-read
	/// the profile while holding this.
	locks: DashMap<BotId, Arc<Mutex<()>>>,
}

fn io_err(context: &str, err: std::io::Error) -> PlatformError {
	PlatformError::Internal(format!("{context}: {err}"))
}

impl ProfileStore {
	pub fn open(root: impl Into<PathBuf>) -> Result<Self, PlatformError> {
		let root = root.into();
		fs::create_dir_all(&root).map_err(|e| io_err("creating profile root", e))?;
		Ok(Self { root, locks: DashMap::new() })
	}

	fn bot_dir(&self, id: BotId) -> PathBuf {
		self.root.join(id.to_string())
	}

	fn profile_path(&self, id: BotId) -> PathBuf {
		self.bot_dir(id).join("profile.json")
	}

	/// Acquire the per-bot write lock.
	pub async fn lock(&self, id: BotId) -> OwnedMutexGuard<()> {
		let lock = self.locks.entry(id).or_insert_with(|| Arc::new(Mutex::new(()))).clone();
		lock.lock_owned().await
	}

	pub fn exists(&self, id: BotId) -> bool {
		self.profile_path(id).is_file()
	}

	pub fn load(&self, id: BotId) -> Result<BotProfile, PlatformError> {
		let path = self.profile_path(id);
		let raw = match fs::read(&path) {
			Ok(raw) => raw,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
				return Err(PlatformError::BotNotFound)
			},
			Err(err) => return Err(io_err("reading profile", err)),
		};
		serde_json::from_slice(&raw)
			.map_err(|e| PlatformError::Internal(format!("corrupt profile {path:?}: {e}")))
	}

	pub fn save(&self, profile: &BotProfile) -> Result<(), PlatformError> {
		let dir = self.bot_dir(profile.id);
		fs::create_dir_all(&dir).map_err(|e| io_err("creating bot dir", e))?;

		let raw = serde_json::to_vec_pretty(profile)
			.map_err(|e| PlatformError::Internal(format!("encoding profile: {e}")))?;

		let tmp = dir.join("profile.json.tmp");
		fs::write(&tmp, raw).map_err(|e| io_err("writing profile", e))?;
		fs::rename(&tmp, self.profile_path(profile.id))
			.map_err(|e| io_err("committing profile", e))?;
		Ok(())
	}

	pub fn delete(&self, id: BotId) -> Result<(), PlatformError> {
		let dir = self.bot_dir(id);
		if !dir.exists() {
			return Err(PlatformError::BotNotFound);
		}
		fs::remove_dir_all(&dir).map_err(|e| io_err("deleting profile", e))?;
		self.locks.remove(&id);
		Ok(())
	}

	pub fn list(&self) -> Result<Vec<BotProfile>, PlatformError> {
		let mut profiles = Vec::new();
		let entries = fs::read_dir(&self.root).map_err(|e| io_err("listing profiles", e))?;
		for entry in entries {
			let entry = entry.map_err(|e| io_err("listing profiles", e))?;
			let path: &Path = &entry.path().join("profile.json");
			if !path.is_file() {
				continue;
			}
			let raw = fs::read(path).map_err(|e| io_err("reading profile", e))?;
			match serde_json::from_slice::<BotProfile>(&raw) {
				Ok(profile) => profiles.push(profile),
				Err(err) => tracing::warn!(?path, %err, "skipping corrupt profile"),
			}
		}
		profiles.sort_by(|a, b| a.created_at.cmp(&b.created_at));
		Ok(profiles)
	}

	pub fn list_by_tenant(&self, tenant: &TenantId) -> Result<Vec<BotProfile>, PlatformError> {
		Ok(self.list()?.into_iter().filter(|p| &p.tenant == tenant).collect())
	}
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeMap;

	use chrono::Utc;
	use fleet_types::profile::{ReleaseChannel, RestartPolicy, UpdatePolicy};

	use super::*;

	fn profile(tenant: &str) -> BotProfile {
		BotProfile {
			id: BotId::generate(),
			tenant: TenantId::from(tenant),
			name: "support-bot".to_owned(),
			image: "wopr/bot:1.4".to_owned(),
			channel: ReleaseChannel::Stable,
			env: BTreeMap::new(),
			restart_policy: RestartPolicy::UnlessStopped,
			update_policy: UpdatePolicy::Auto,
			created_at: Utc::now(),
			updated_at: Utc::now(),
		}
	}

	#[test]
	fn save_load_round_trip() {
		let dir = tempfile::tempdir().unwrap();
		let store = ProfileStore::open(dir.path()).unwrap();

		let profile = profile("acme");
		store.save(&profile).unwrap();
		assert_eq!(store.load(profile.id).unwrap(), profile);
	}

	#[test]
	fn missing_profiles_are_bot_not_found() {
		let dir = tempfile::tempdir().unwrap();
		let store = ProfileStore::open(dir.path()).unwrap();
		assert!(matches!(store.load(BotId::generate()), Err(PlatformError::BotNotFound)));
	}

	#[test]
	fn list_by_tenant_filters() {
		let dir = tempfile::tempdir().unwrap();
		let store = ProfileStore::open(dir.path()).unwrap();

		store.save(&profile("acme")).unwrap();
		store.save(&profile("acme")).unwrap();
		store.save(&profile("globex")).unwrap();

		assert_eq!(store.list_by_tenant(&TenantId::from("acme")).unwrap().len(), 2);
		assert_eq!(store.list().unwrap().len(), 3);
	}

	#[test]
	fn delete_removes_the_record() {
		let dir = tempfile::tempdir().unwrap();
		let store = ProfileStore::open(dir.path()).unwrap();

		let profile = profile("acme");
		store.save(&profile).unwrap();
		store.delete(profile.id).unwrap();
		assert!(!store.exists(profile.id));
		assert!(matches!(store.delete(profile.id), Err(PlatformError::BotNotFound)));
	}
}
