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

//! Test doubles for every `fleet-traits` seam. All doubles record
//! their calls so tests can assert on interaction, and all failure
//! behavior is programmed per instance rather than global.

pub mod clock;
pub mod meter;
pub mod nodes;
pub mod payments;
pub mod providers;
pub mod vault;

pub use clock::ManualClock;
pub use meter::CollectingSink;
pub use nodes::MockNodeTransport;
pub use payments::MockProcessor;
pub use providers::MockProviderAdapter;
pub use vault::MockVault;
