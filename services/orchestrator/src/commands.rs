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

//! HTTP transport to worker-node agents.
//!
//! Delivery is best effort: an accepted POST means the agent received
//! the command, not that the container action succeeded. The
//! reconciliation loop closes the remaining gap.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use fleet_primitives::NodeId;
use fleet_traits::NodeTransport;
use fleet_types::{nodes::NodeCommand, PlatformError};

const DISPATCH_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpNodeTransport {
	http: reqwest::Client,
	/// node id → agent base URL.
	nodes: HashMap<NodeId, String>,
}

impl HttpNodeTransport {
	pub fn new(http: reqwest::Client, nodes: HashMap<NodeId, String>) -> Self {
		Self { http, nodes }
	}
}

#[async_trait]
impl NodeTransport for HttpNodeTransport {
	async fn dispatch(&self, node: &NodeId, command: &NodeCommand) -> Result<(), PlatformError> {
		let base = self
			.nodes
			.get(node)
			.ok_or_else(|| PlatformError::Internal(format!("unknown node {node}")))?;

		let response = self
			.http
			.post(format!("{base}/commands"))
			.timeout(DISPATCH_TIMEOUT)
			.json(command)
			.send()
			.await
			.map_err(|err| {
				PlatformError::Internal(format!("node {node} unreachable: {err}"))
			})?;

		if !response.status().is_success() {
			return Err(PlatformError::Internal(format!(
				"node {node} rejected command: {}",
				response.status()
			)));
		}
		Ok(())
	}
}
