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

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use fleet_primitives::{BotId, NodeId, TenantId};
use fleet_traits::NodeTransport;
use fleet_types::{
	nodes::{DispatchOutcome, NodeCommand},
	profile::{BotInstance, BotProfile, ProfilePatch, ReleaseChannel},
	PlatformError,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::ProfileStore;

/// Request shape for bot creation.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBot {
	pub name: String,
	pub image: String,
	#[serde(default)]
	pub channel: Option<ReleaseChannel>,
	#[serde(default)]
	pub env: BTreeMap<String, String>,
}

pub struct FleetManager {
	store: Arc<ProfileStore>,
	transport: Arc<dyn NodeTransport>,
	/// Runtime bot → node pairing. `None` means not deployed.
	instances: DashMap<BotId, Option<NodeId>>,
	default_node: Option<NodeId>,
}

impl FleetManager {
	pub fn new(
		store: Arc<ProfileStore>,
		transport: Arc<dyn NodeTransport>,
		default_node: Option<NodeId>,
	) -> Self {
		Self { store, transport, instances: DashMap::new(), default_node }
	}

	pub fn store(&self) -> &ProfileStore {
		&self.store
	}

	pub fn instance(&self, id: BotId) -> BotInstance {
		BotInstance { bot: id, node: self.instances.get(&id).and_then(|n| n.clone()) }
	}

	fn node_of(&self, id: BotId) -> Option<NodeId> {
		self.instances.get(&id).and_then(|n| n.clone())
	}

	/// Best-effort dispatch: the outcome is observable, never fatal.
	async fn dispatch(&self, node: &NodeId, command: NodeCommand) -> DispatchOutcome {
		match self.transport.dispatch(node, &command).await {
			Ok(()) => DispatchOutcome::ok(),
			Err(err) => {
				warn!(%node, bot = %command.bot(), %err, "node dispatch failed");
				DispatchOutcome::failed(err.to_string())
			},
		}
	}

	pub async fn create(
		&self,
		tenant: &TenantId,
		request: CreateBot,
	) -> Result<(BotProfile, DispatchOutcome), PlatformError> {
		if request.name.is_empty() {
			return Err(PlatformError::InvalidRequest("bot name must not be empty".into()));
		}

		let now = Utc::now();
		let profile = BotProfile {
			id: BotId::generate(),
			tenant: tenant.clone(),
			name: request.name,
			image: request.image,
			channel: request.channel.unwrap_or_default(),
			env: request.env,
			restart_policy: Default::default(),
			update_policy: Default::default(),
			created_at: now,
			updated_at: now,
		};
		self.store.save(&profile)?;
		self.instances.insert(profile.id, self.default_node.clone());

		let outcome = match &self.default_node {
			Some(node) => {
				self.dispatch(
					node,
					NodeCommand::Recreate {
						bot: profile.id,
						image: profile.image.clone(),
						env: profile.env.clone(),
					},
				)
				.await
			},
			None => DispatchOutcome::ok(),
		};

		info!(bot = %profile.id, %tenant, "bot created");
		Ok((profile, outcome))
	}

	pub async fn get(&self, id: BotId) -> Result<BotProfile, PlatformError> {
		self.store.load(id)
	}

	pub fn list_by_tenant(&self, tenant: &TenantId) -> Result<Vec<BotProfile>, PlatformError> {
		self.store.list_by_tenant(tenant)
	}

	/// Apply a patch under the per-bot lock. The stored profile is
	/// re-read immediately before the write, so two concurrent
	/// updates compose instead of clobbering each other, and a failed
	/// node recreate rolls the write back before the error surfaces.
	pub async fn update(&self, id: BotId, patch: ProfilePatch) -> Result<BotProfile, PlatformError> {
		let _guard = self.store.lock(id).await;
		self.update_locked(id, |profile| {
			patch.apply_to(profile);
			Ok(())
		})
		.await
	}

	/// Like [`FleetManager::update`], but the caller computes the
	/// next environment from the freshly-read one. This is the plugin
	/// composer's entry point: the composition runs inside the lock,
	/// which is what makes concurrent installs of different plugins
	/// both land.
	pub async fn update_env_with<F>(&self, id: BotId, compose: F) -> Result<BotProfile, PlatformError>
	where
		F: FnOnce(&BTreeMap<String, String>) -> Result<BTreeMap<String, String>, PlatformError>,
	{
		let _guard = self.store.lock(id).await;
		self.update_locked(id, |profile| {
			profile.env = compose(&profile.env)?;
			profile.updated_at = Utc::now();
			Ok(())
		})
		.await
	}

	async fn update_locked<F>(&self, id: BotId, mutate: F) -> Result<BotProfile, PlatformError>
	where
		F: FnOnce(&mut BotProfile) -> Result<(), PlatformError>,
	{
		let previous = self.store.load(id)?;
		let mut next = previous.clone();
		mutate(&mut next)?;
		self.store.save(&next)?;

		if let Some(node) = self.node_of(id) {
			let command = NodeCommand::Recreate {
				bot: id,
				image: next.image.clone(),
				env: next.env.clone(),
			};
			if let Err(err) = self.transport.dispatch(&node, &command).await {
				// The container never picked up the new profile:
				// restore the old one before surfacing the failure.
				self.store.save(&previous)?;
				warn!(bot = %id, %node, %err, "recreate failed, profile rolled back");
				return Err(PlatformError::Internal(format!(
					"node recreate failed: {err}"
				)));
			}
		}

		Ok(next)
	}

	/// A delete is observable only after the container is stopped and
	/// the record is gone, in that order.
	pub async fn delete(&self, id: BotId) -> Result<(), PlatformError> {
		let _guard = self.store.lock(id).await;
		let _profile = self.store.load(id)?;

		if let Some(node) = self.node_of(id) {
			let stop = self.dispatch(&node, NodeCommand::Stop { bot: id }).await;
			if !stop.dispatched {
				warn!(bot = %id, "stop not delivered, reconciliation will finish the teardown");
			}
			self.store.delete(id)?;
			self.instances.remove(&id);
			self.dispatch(&node, NodeCommand::Remove { bot: id }).await;
		} else {
			self.store.delete(id)?;
			self.instances.remove(&id);
		}

		info!(bot = %id, "bot deleted");
		Ok(())
	}

	/// Move a bot to another node: stop it where it runs, recreate it
	/// on the target. The profile itself is untouched.
	pub async fn move_bot(&self, id: BotId, target: NodeId) -> Result<BotInstance, PlatformError> {
		let _guard = self.store.lock(id).await;
		let profile = self.store.load(id)?;

		if let Some(old) = self.node_of(id) {
			if old != target {
				self.dispatch(&old, NodeCommand::Stop { bot: id }).await;
			}
		}

		let command = NodeCommand::Recreate {
			bot: id,
			image: profile.image.clone(),
			env: profile.env.clone(),
		};
		self.transport.dispatch(&target, &command).await.map_err(|err| {
			PlatformError::Internal(format!("recreate on {target} failed: {err}"))
		})?;

		self.instances.insert(id, Some(target.clone()));
		info!(bot = %id, node = %target, "bot moved");
		Ok(BotInstance { bot: id, node: Some(target) })
	}
}

#[cfg(test)]
mod tests {
	use fleet_mocks::MockNodeTransport;

	use super::*;

	fn manager() -> (Arc<FleetManager>, Arc<MockNodeTransport>, tempfile::TempDir) {
		let dir = tempfile::tempdir().unwrap();
		let store = Arc::new(ProfileStore::open(dir.path()).unwrap());
		let transport = Arc::new(MockNodeTransport::new());
		let manager = Arc::new(FleetManager::new(
			store,
			transport.clone(),
			Some(NodeId::from("node-1")),
		));
		(manager, transport, dir)
	}

	fn create_request() -> CreateBot {
		CreateBot {
			name: "support-bot".to_owned(),
			image: "wopr/bot:1.4".to_owned(),
			channel: None,
			env: BTreeMap::from([("BASE".to_owned(), "1".to_owned())]),
		}
	}

	#[tokio::test]
	async fn create_persists_and_dispatches_recreate() {
		let (manager, transport, _dir) = manager();
		let tenant = TenantId::from("acme");

		let (profile, outcome) = manager.create(&tenant, create_request()).await.unwrap();
		assert!(outcome.dispatched);
		assert_eq!(manager.get(profile.id).await.unwrap().name, "support-bot");

		let commands = transport.commands_for(&NodeId::from("node-1"));
		assert!(matches!(commands[0], NodeCommand::Recreate { .. }));
	}

	#[tokio::test]
	async fn failed_recreate_rolls_the_profile_back() {
		let (manager, transport, _dir) = manager();
		let tenant = TenantId::from("acme");
		let (profile, _) = manager.create(&tenant, create_request()).await.unwrap();
		let original_env = profile.env.clone();

		transport.fail();
		let mut patched = original_env.clone();
		patched.insert("BROKEN".to_owned(), "yes".to_owned());
		let err = manager
			.update(profile.id, ProfilePatch::env_only(patched))
			.await
			.unwrap_err();
		assert!(matches!(err, PlatformError::Internal(_)));

		// Post-condition: stored env is exactly the pre-update env.
		assert_eq!(manager.get(profile.id).await.unwrap().env, original_env);
	}

	#[tokio::test]
	async fn concurrent_env_updates_compose() {
		let (manager, _transport, _dir) = manager();
		let tenant = TenantId::from("acme");
		let (profile, _) = manager.create(&tenant, create_request()).await.unwrap();

		let m1 = manager.clone();
		let m2 = manager.clone();
		let id = profile.id;

		let a = tokio::spawn(async move {
			m1.update_env_with(id, |env| {
				let mut next = env.clone();
				next.insert("A".to_owned(), "1".to_owned());
				Ok(next)
			})
			.await
		});
		let b = tokio::spawn(async move {
			m2.update_env_with(id, |env| {
				let mut next = env.clone();
				next.insert("B".to_owned(), "2".to_owned());
				Ok(next)
			})
			.await
		});
		a.await.unwrap().unwrap();
		b.await.unwrap().unwrap();

		let env = manager.get(id).await.unwrap().env;
		assert_eq!(env.get("A"), Some(&"1".to_owned()));
		assert_eq!(env.get("B"), Some(&"2".to_owned()));
	}

	#[tokio::test]
	async fn delete_stops_before_removing_the_record() {
		let (manager, transport, _dir) = manager();
		let tenant = TenantId::from("acme");
		let (profile, _) = manager.create(&tenant, create_request()).await.unwrap();

		manager.delete(profile.id).await.unwrap();
		assert!(matches!(manager.get(profile.id).await, Err(PlatformError::BotNotFound)));

		let commands = transport.commands_for(&NodeId::from("node-1"));
		let stop_index =
			commands.iter().position(|c| matches!(c, NodeCommand::Stop { .. })).unwrap();
		let remove_index =
			commands.iter().position(|c| matches!(c, NodeCommand::Remove { .. })).unwrap();
		assert!(stop_index < remove_index);
	}

	#[tokio::test]
	async fn move_stops_old_node_and_recreates_on_target() {
		let (manager, transport, _dir) = manager();
		let tenant = TenantId::from("acme");
		let (profile, _) = manager.create(&tenant, create_request()).await.unwrap();

		let instance =
			manager.move_bot(profile.id, NodeId::from("node-2")).await.unwrap();
		assert_eq!(instance.node, Some(NodeId::from("node-2")));

		assert!(transport
			.commands_for(&NodeId::from("node-1"))
			.iter()
			.any(|c| matches!(c, NodeCommand::Stop { .. })));
		assert!(transport
			.commands_for(&NodeId::from("node-2"))
			.iter()
			.any(|c| matches!(c, NodeCommand::Recreate { .. })));
	}

	#[tokio::test]
	async fn missing_bot_is_bot_not_found() {
		let (manager, _, _dir) = manager();
		let err = manager
			.update(BotId::generate(), ProfilePatch::default())
			.await
			.unwrap_err();
		assert!(matches!(err, PlatformError::BotNotFound));
	}
}
