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

//! # Meter pipeline
//!
//! Per-request cost events flow from the gateway into the
//! [`MeterStore`], fold into per-minute windows via an idempotent
//! aggregator, and surface through the usage endpoints. Emission is
//! decoupled from ingestion by [`MeterPipeline`], an unbounded
//! in-process queue, so a slow store can never fail or delay a
//! gateway response.

pub mod pipeline;
pub mod recurring;
pub mod store;

pub use pipeline::MeterPipeline;
pub use recurring::RecurringCharges;
pub use store::MeterStore;
