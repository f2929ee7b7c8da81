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

//! Declarative bot profiles and derived runtime records.
//!
//! The profile is the source of truth; the container a node runs is
//! derived state that reconciliation brings in line.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use fleet_primitives::{BotId, NodeId, TenantId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseChannel {
	#[default]
	Stable,
	Beta,
	Nightly,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
	#[default]
	UnlessStopped,
	Always,
	Never,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdatePolicy {
	/// Recreate the container whenever the profile changes.
	#[default]
	Auto,
	/// Profile changes accumulate until an operator triggers a recreate.
	Manual,
}

/// Declarative description of a bot. The environment map is opaque
/// string pairs; the plugin composer owns the `WOPR_*` subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotProfile {
	pub id: BotId,
	pub tenant: TenantId,
	pub name: String,
	pub image: String,
	#[serde(default)]
	pub channel: ReleaseChannel,
	#[serde(default)]
	pub env: BTreeMap<String, String>,
	#[serde(default)]
	pub restart_policy: RestartPolicy,
	#[serde(default)]
	pub update_policy: UpdatePolicy,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// Partial profile update. `None` fields are left untouched; the env
/// map, when present, replaces the stored one wholesale (composer
/// callers compute the full next map under the per-bot lock).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
	pub name: Option<String>,
	pub image: Option<String>,
	pub channel: Option<ReleaseChannel>,
	pub env: Option<BTreeMap<String, String>>,
	pub restart_policy: Option<RestartPolicy>,
	pub update_policy: Option<UpdatePolicy>,
}

impl ProfilePatch {
	pub fn env_only(env: BTreeMap<String, String>) -> Self {
		Self { env: Some(env), ..Default::default() }
	}

	pub fn apply_to(&self, profile: &mut BotProfile) {
		if let Some(name) = &self.name {
			profile.name = name.clone();
		}
		if let Some(image) = &self.image {
			profile.image = image.clone();
		}
		if let Some(channel) = self.channel {
			profile.channel = channel;
		}
		if let Some(env) = &self.env {
			profile.env = env.clone();
		}
		if let Some(policy) = self.restart_policy {
			profile.restart_policy = policy;
		}
		if let Some(policy) = self.update_policy {
			profile.update_policy = policy;
		}
		profile.updated_at = Utc::now();
	}
}

/// Runtime pairing of a bot and the node currently hosting it.
/// `node = None` means the bot is not deployed anywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotInstance {
	pub bot: BotId,
	pub node: Option<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnapshotKind {
	OnDemand,
	Nightly,
}

/// Tenant-owned bot backup. Only on-demand snapshots are deletable by
/// the tenant; nightly ones expire on their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
	pub id: Uuid,
	pub bot: BotId,
	pub tenant: TenantId,
	pub kind: SnapshotKind,
	pub storage_path: String,
	pub size_bytes: u64,
	pub created_at: DateTime<Utc>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expires_at: Option<DateTime<Utc>>,
}
