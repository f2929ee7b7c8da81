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

//! Common types for the fleet platform services.

pub mod capability;
pub mod error;
pub mod ledger;
pub mod metering;
pub mod nodes;
pub mod oauth;
pub mod payments;
pub mod plugins;
pub mod profile;
pub mod routing;
pub mod setup;
pub mod tenant;

pub use capability::Capability;
pub use error::PlatformError;
