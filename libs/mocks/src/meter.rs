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

use std::sync::Mutex;

use fleet_traits::MeterSink;
use fleet_types::metering::MeterEvent;

/// Meter sink that just collects, for asserting exactly which events
/// a handler emitted.
#[derive(Default)]
pub struct CollectingSink {
	events: Mutex<Vec<MeterEvent>>,
}

impl CollectingSink {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn events(&self) -> Vec<MeterEvent> {
		self.events.lock().expect("sink mutex poisoned").clone()
	}

	pub fn len(&self) -> usize {
		self.events.lock().expect("sink mutex poisoned").len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl MeterSink for CollectingSink {
	fn emit(&self, event: MeterEvent) {
		self.events.lock().expect("sink mutex poisoned").push(event);
	}
}
