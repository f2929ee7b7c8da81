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

//! Seam traits of the fleet platform.
//!
//! Services talk to each other and to external collaborators (SQL
//! persistence, container nodes, the payment processor, upstream AI
//! providers) exclusively through these traits. Production wiring
//! lives in the service crates; `fleet-mocks` supplies test doubles.

pub mod ledger;
pub mod metering;
pub mod nodes;
pub mod payments;
pub mod providers;
pub mod time;
pub mod vault;

pub use ledger::{ExhaustionHook, Ledger};
pub use metering::{MeterSink, SpendQuery};
pub use nodes::NodeTransport;
pub use payments::PaymentProcessor;
pub use providers::ProviderAdapter;
pub use time::{Clock, SystemClock};
pub use vault::CredentialVault;
