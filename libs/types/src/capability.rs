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

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// A kind of upstream call the gateway can fulfil. The kebab-case wire
/// form is canonical: it keys the rate catalog, meter events and the
/// hosted-credential table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
	ChatCompletions,
	Completions,
	Embeddings,
	Stt,
	Tts,
	ImageGeneration,
	VideoGeneration,
	PhoneOutbound,
	PhoneInbound,
	SmsOutbound,
	SmsInbound,
	MmsOutbound,
	MmsInbound,
	PhoneNumberMonthly,
}

impl Capability {
	pub const fn as_str(&self) -> &'static str {
		match self {
			Capability::ChatCompletions => "chat-completions",
			Capability::Completions => "completions",
			Capability::Embeddings => "embeddings",
			Capability::Stt => "stt",
			Capability::Tts => "tts",
			Capability::ImageGeneration => "image-generation",
			Capability::VideoGeneration => "video-generation",
			Capability::PhoneOutbound => "phone-outbound",
			Capability::PhoneInbound => "phone-inbound",
			Capability::SmsOutbound => "sms-outbound",
			Capability::SmsInbound => "sms-inbound",
			Capability::MmsOutbound => "mms-outbound",
			Capability::MmsInbound => "mms-inbound",
			Capability::PhoneNumberMonthly => "phone-number-monthly",
		}
	}
}

impl fmt::Display for Capability {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Capability {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"chat-completions" => Ok(Capability::ChatCompletions),
			"completions" => Ok(Capability::Completions),
			"embeddings" => Ok(Capability::Embeddings),
			"stt" => Ok(Capability::Stt),
			"tts" => Ok(Capability::Tts),
			"image-generation" => Ok(Capability::ImageGeneration),
			"video-generation" => Ok(Capability::VideoGeneration),
			"phone-outbound" => Ok(Capability::PhoneOutbound),
			"phone-inbound" => Ok(Capability::PhoneInbound),
			"sms-outbound" => Ok(Capability::SmsOutbound),
			"sms-inbound" => Ok(Capability::SmsInbound),
			"mms-outbound" => Ok(Capability::MmsOutbound),
			"mms-inbound" => Ok(Capability::MmsInbound),
			"phone-number-monthly" => Ok(Capability::PhoneNumberMonthly),
			other => Err(format!("unknown capability {other:?}")),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn wire_form_round_trips() {
		let all = [
			Capability::ChatCompletions,
			Capability::Completions,
			Capability::Embeddings,
			Capability::Stt,
			Capability::Tts,
			Capability::ImageGeneration,
			Capability::VideoGeneration,
			Capability::PhoneOutbound,
			Capability::PhoneInbound,
			Capability::SmsOutbound,
			Capability::SmsInbound,
			Capability::MmsOutbound,
			Capability::MmsInbound,
			Capability::PhoneNumberMonthly,
		];
		for capability in all {
			assert_eq!(capability.as_str().parse::<Capability>().unwrap(), capability);
			let json = serde_json::to_string(&capability).unwrap();
			assert_eq!(json, format!("\"{}\"", capability.as_str()));
		}
	}
}
