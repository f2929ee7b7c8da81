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

//! # Rate catalog and arbitrage router
//!
//! The catalog lists, per capability, the upstream providers the
//! platform can buy from, their wholesale rates and margins, and an
//! eligibility predicate. The router picks the cheapest eligible
//! healthy provider and fails over on transport errors.

pub mod rates;
pub mod router;

pub use rates::{Eligibility, ProviderRate, RateCatalog, RateUnit};
pub use router::ArbitrageRouter;
