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

use std::sync::{
	atomic::{AtomicBool, Ordering},
	Mutex,
};

use async_trait::async_trait;
use fleet_primitives::NodeId;
use fleet_traits::NodeTransport;
use fleet_types::{nodes::NodeCommand, PlatformError};

/// Node transport that records every dispatched command and can be
/// told to fail, for rollback tests.
#[derive(Default)]
pub struct MockNodeTransport {
	dispatched: Mutex<Vec<(NodeId, NodeCommand)>>,
	fail: AtomicBool,
}

impl MockNodeTransport {
	pub fn new() -> Self {
		Self::default()
	}

	/// All subsequent dispatches fail until [`Self::succeed`].
	pub fn fail(&self) {
		self.fail.store(true, Ordering::SeqCst);
	}

	pub fn succeed(&self) {
		self.fail.store(false, Ordering::SeqCst);
	}

	pub fn dispatched(&self) -> Vec<(NodeId, NodeCommand)> {
		self.dispatched.lock().expect("transport mutex poisoned").clone()
	}

	pub fn commands_for(&self, node: &NodeId) -> Vec<NodeCommand> {
		self.dispatched()
			.into_iter()
			.filter(|(n, _)| n == node)
			.map(|(_, command)| command)
			.collect()
	}
}

#[async_trait]
impl NodeTransport for MockNodeTransport {
	async fn dispatch(&self, node: &NodeId, command: &NodeCommand) -> Result<(), PlatformError> {
		if self.fail.load(Ordering::SeqCst) {
			return Err(PlatformError::Internal(format!(
				"node {node} unreachable (programmed failure)"
			)));
		}
		self.dispatched
			.lock()
			.expect("transport mutex poisoned")
			.push((node.clone(), command.clone()));
		Ok(())
	}
}
