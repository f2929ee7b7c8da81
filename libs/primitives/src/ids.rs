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

use std::{fmt, str::FromStr};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::PLATFORM_TENANT;

/// Identifier of a billable party. Opaque to the platform; the payment
/// processor sees it as `client_reference_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Whether this is the reserved platform tenant.
	pub fn is_platform(&self) -> bool {
		self.0 == PLATFORM_TENANT
	}
}

impl fmt::Display for TenantId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for TenantId {
	fn from(id: &str) -> Self {
		Self(id.to_owned())
	}
}

impl From<String> for TenantId {
	fn from(id: String) -> Self {
		Self(id)
	}
}

/// Identifier of a containerized bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BotId(Uuid);

impl BotId {
	pub fn generate() -> Self {
		Self(Uuid::new_v4())
	}

	pub fn as_uuid(&self) -> Uuid {
		self.0
	}
}

impl fmt::Display for BotId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl FromStr for BotId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self(Uuid::parse_str(s)?))
	}
}

impl From<Uuid> for BotId {
	fn from(id: Uuid) -> Self {
		Self(id)
	}
}

/// Identifier of a worker node hosting bot containers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for NodeId {
	fn from(id: &str) -> Self {
		Self(id.to_owned())
	}
}

/// Identifier of a guided plugin-setup session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SetupSessionId(Uuid);

impl SetupSessionId {
	pub fn generate() -> Self {
		Self(Uuid::new_v4())
	}
}

impl fmt::Display for SetupSessionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

static PLUGIN_ID_RE: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9-]{0,63}$").expect("static regex"));

/// Validated plugin identifier. Lowercase-hyphen by convention,
/// e.g. `wopr-plugin-discord`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PluginId(String);

impl PluginId {
	pub fn parse(id: impl Into<String>) -> Result<Self, InvalidPluginId> {
		let id = id.into();
		if PLUGIN_ID_RE.is_match(&id) {
			Ok(Self(id))
		} else {
			Err(InvalidPluginId(id))
		}
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for PluginId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl FromStr for PluginId {
	type Err = InvalidPluginId;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}

impl<'de> Deserialize<'de> for PluginId {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;
		Self::parse(raw).map_err(serde::de::Error::custom)
	}
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid plugin id: {0:?}")]
pub struct InvalidPluginId(pub String);

/// Access scope carried by a bearer token. Scopes are ordered:
/// `admin` implies `write` implies `read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenScope {
	Read,
	Write,
	Admin,
}

impl TokenScope {
	pub fn allows(&self, required: TokenScope) -> bool {
		*self >= required
	}
}

impl FromStr for TokenScope {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"read" => Ok(Self::Read),
			"write" => Ok(Self::Write),
			"admin" => Ok(Self::Admin),
			other => Err(format!("unknown token scope {other:?}")),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn plugin_id_grammar_accepts_valid_ids() {
		for id in ["wopr-plugin-discord", "a", "A1", "p-1", "x".repeat(64).as_str()] {
			assert!(PluginId::parse(id).is_ok(), "{id} should parse");
		}
	}

	#[test]
	fn plugin_id_grammar_rejects_invalid_ids() {
		for id in ["", "-leading", "has space", "under_score", "x".repeat(65).as_str()] {
			assert!(PluginId::parse(id).is_err(), "{id:?} should be rejected");
		}
	}

	#[test]
	fn scope_ordering_is_transitive() {
		assert!(TokenScope::Admin.allows(TokenScope::Read));
		assert!(TokenScope::Admin.allows(TokenScope::Write));
		assert!(TokenScope::Write.allows(TokenScope::Read));
		assert!(!TokenScope::Read.allows(TokenScope::Write));
		assert!(!TokenScope::Write.allows(TokenScope::Admin));
	}

	#[test]
	fn platform_tenant_is_reserved() {
		assert!(TenantId::from(crate::PLATFORM_TENANT).is_platform());
		assert!(!TenantId::from("acme").is_platform());
	}
}
