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

//! Capability → hosted-credential mapping: which env key the bot
//! reads and which vault provider holds the platform's secret.

/// Env key and vault provider for a hosted capability. `None` means
/// the capability has no platform-hosted credential and can only be
/// configured BYOK.
pub fn hosted_key(capability: &str) -> Option<(&'static str, &'static str)> {
	match capability {
		"chat-completions" | "completions" | "embeddings" => {
			Some(("OPENROUTER_API_KEY", "openrouter"))
		},
		"stt" => Some(("DEEPGRAM_API_KEY", "deepgram")),
		"tts" => Some(("ELEVENLABS_API_KEY", "elevenlabs")),
		"image-generation" | "video-generation" => Some(("REPLICATE_API_TOKEN", "replicate")),
		"phone-outbound" | "phone-inbound" | "sms-outbound" | "sms-inbound" => {
			Some(("TWILIO_AUTH_TOKEN", "twilio"))
		},
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn token_capabilities_share_the_openrouter_key() {
		assert_eq!(hosted_key("chat-completions"), hosted_key("embeddings"));
	}

	#[test]
	fn unknown_capabilities_have_no_hosted_key() {
		assert_eq!(hosted_key("quantum-teleport"), None);
	}
}
