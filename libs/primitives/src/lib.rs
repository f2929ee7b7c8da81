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

//! Shared identifiers, scopes and typed monetary units.
//!
//! Everything in this crate is a leaf: no service crate is allowed to
//! redefine an identifier or a monetary unit locally.

pub mod ids;
pub mod money;

pub use ids::{BotId, NodeId, PluginId, SetupSessionId, TenantId, TokenScope};
pub use money::{Cents, CostCents};

/// Margin applied to wholesale cost when no per-provider margin is
/// configured: `charge = round(cost * margin)`.
pub const DEFAULT_MARGIN: f64 = 1.3;

/// Reserved tenant identifier carrying platform-wide grants. Role
/// entries against this tenant express platform-admin rights.
pub const PLATFORM_TENANT: &str = "platform";

/// Smallest meterable wholesale cost, in fractional cents. Duration or
/// character based capabilities that report nothing still bill this.
pub const MIN_METERED_COST: f64 = 0.1;
