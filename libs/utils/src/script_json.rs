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

//! JSON serialization safe for embedding inside a `<script>` block.

/// Serialize a value for interpolation into inline script. A literal
/// `</script>` inside a string would otherwise terminate the block
/// early and let attacker-controlled state inject markup, so every
/// `</` is emitted as `<\/`.
pub fn to_script_string<T: serde::Serialize>(value: &T) -> Result<String, serde_json::Error> {
	Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn escapes_closing_script_tags() {
		let out = to_script_string(&"</script><script>alert(1)</script>").unwrap();
		assert!(!out.contains("</script>"));
		assert!(out.contains("<\\/script>"));
	}

	#[test]
	fn plain_values_pass_through() {
		assert_eq!(to_script_string(&"abc123").unwrap(), "\"abc123\"");
	}
}
