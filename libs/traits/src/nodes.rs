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

use async_trait::async_trait;
use fleet_primitives::NodeId;
use fleet_types::{nodes::NodeCommand, PlatformError};

/// Transport carrying commands to a worker node's agent. An `Err`
/// means the command was observably not delivered; delivery without
/// acknowledgement of execution still counts as `Ok`.
#[async_trait]
pub trait NodeTransport: Send + Sync {
	async fn dispatch(&self, node: &NodeId, command: &NodeCommand) -> Result<(), PlatformError>;
}
