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

use std::path::PathBuf;

use clap::Parser;

/// WOPR fleet platform control plane.
#[derive(Debug, Parser)]
#[command(name = "fleet-platform", version, about)]
pub struct Cli {
	/// Address the HTTP server binds to.
	#[arg(long, env = "FLEET_LISTEN", default_value = "0.0.0.0:8080")]
	pub listen: String,

	/// Root directory for durable profile storage.
	#[arg(long, env = "FLEET_DATA_DIR", default_value = "./data")]
	pub data_dir: PathBuf,
}
