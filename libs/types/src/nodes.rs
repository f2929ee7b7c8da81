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

use fleet_primitives::BotId;
use serde::{Deserialize, Serialize};

use crate::profile::SnapshotKind;

/// Command delivered to a worker node's agent. Delivery is best
/// effort; the profile store remains the intended state either way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum NodeCommand {
	/// Tear down and start the bot container with the given image and
	/// environment.
	Recreate { bot: BotId, image: String, env: BTreeMap<String, String> },
	Start { bot: BotId },
	Stop { bot: BotId },
	Remove { bot: BotId },
	Snapshot { bot: BotId, kind: SnapshotKind },
}

impl NodeCommand {
	pub fn bot(&self) -> BotId {
		match self {
			NodeCommand::Recreate { bot, .. }
			| NodeCommand::Start { bot }
			| NodeCommand::Stop { bot }
			| NodeCommand::Remove { bot }
			| NodeCommand::Snapshot { bot, .. } => *bot,
		}
	}
}

/// Observable result of a fire-and-forget dispatch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchOutcome {
	pub dispatched: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub dispatch_error: Option<String>,
}

impl DispatchOutcome {
	pub fn ok() -> Self {
		Self { dispatched: true, dispatch_error: None }
	}

	pub fn failed(error: impl Into<String>) -> Self {
		Self { dispatched: false, dispatch_error: Some(error.into()) }
	}
}
