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
use chrono::{DateTime, Utc};
use fleet_primitives::{Cents, TenantId};
use fleet_types::{metering::MeterEvent, PlatformError};

/// Receiving end of the meter pipeline. `emit` must be non-blocking
/// and must not fail the caller; a full or closed pipeline drops the
/// event with a log line, never an error.
pub trait MeterSink: Send + Sync {
	fn emit(&self, event: MeterEvent);
}

/// Read side consulted by the budget checker for per-period spend.
/// Answers may lag ingestion by a small bounded window.
#[async_trait]
pub trait SpendQuery: Send + Sync {
	async fn charged_since(
		&self,
		tenant: &TenantId,
		since: DateTime<Utc>,
	) -> Result<Cents, PlatformError>;
}
