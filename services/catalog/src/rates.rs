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

use fleet_primitives::{CostCents, DEFAULT_MARGIN};
use fleet_types::{routing::RouteRequest, tenant::Tier, Capability};

/// How a provider prices a capability. All figures are wholesale
/// fractional cents.
#[derive(Debug, Clone, PartialEq)]
pub enum RateUnit {
	/// Token pricing per 1K tokens, split input/output.
	PerThousandTokens { input: f64, output: f64 },
	/// Character pricing (TTS).
	PerCharacter(f64),
	/// Minute pricing (telephony, STT).
	PerMinute(f64),
	/// Flat per-call pricing (SMS, image generation, number rental).
	PerRequest(f64),
}

impl RateUnit {
	pub fn cost_for_tokens(&self, prompt: u64, completion: u64) -> CostCents {
		match self {
			RateUnit::PerThousandTokens { input, output } => CostCents::new(
				prompt as f64 / 1000.0 * input + completion as f64 / 1000.0 * output,
			),
			_ => CostCents::ZERO,
		}
	}

	pub fn cost_for_characters(&self, characters: u64) -> CostCents {
		match self {
			RateUnit::PerCharacter(rate) => CostCents::new(characters as f64 * rate),
			_ => CostCents::ZERO,
		}
	}

	pub fn cost_for_minutes(&self, minutes: f64) -> CostCents {
		match self {
			RateUnit::PerMinute(rate) => CostCents::new(minutes * rate),
			_ => CostCents::ZERO,
		}
	}

	pub fn flat(&self) -> CostCents {
		match self {
			RateUnit::PerRequest(rate) => CostCents::new(*rate),
			_ => CostCents::ZERO,
		}
	}
}

/// Declarative eligibility of one provider row.
#[derive(Debug, Clone, Default)]
pub struct Eligibility {
	/// Accept only model hints with one of these prefixes. Empty
	/// accepts any hint, including none.
	pub model_prefixes: Vec<String>,
	/// Restrict to these tiers. `None` accepts all tiers.
	pub tiers: Option<Vec<Tier>>,
	/// Serve only tenants bringing their own upstream credential.
	pub requires_byok: bool,
}

impl Eligibility {
	pub fn matches(&self, request: &RouteRequest) -> bool {
		if self.requires_byok && !request.byok {
			return false;
		}
		if let Some(tiers) = &self.tiers {
			if !tiers.contains(&request.tier) {
				return false;
			}
		}
		if !self.model_prefixes.is_empty() {
			match &request.model_hint {
				Some(hint) => {
					if !self.model_prefixes.iter().any(|p| hint.starts_with(p.as_str())) {
						return false;
					}
				},
				None => return false,
			}
		}
		true
	}
}

/// One row of the catalog.
#[derive(Debug, Clone)]
pub struct ProviderRate {
	pub provider: String,
	pub capability: Capability,
	pub unit: RateUnit,
	pub margin: f64,
	pub eligibility: Eligibility,
}

/// The per-capability provider table. Built once at startup;
/// operators override rows through configuration before the server
/// starts taking traffic.
#[derive(Debug, Clone, Default)]
pub struct RateCatalog {
	rates: Vec<ProviderRate>,
}

impl RateCatalog {
	pub fn empty() -> Self {
		Self::default()
	}

	pub fn push(&mut self, rate: ProviderRate) {
		self.rates.push(rate);
	}

	pub fn rates_for(&self, capability: Capability) -> impl Iterator<Item = &ProviderRate> {
		self.rates.iter().filter(move |r| r.capability == capability)
	}

	pub fn rate(&self, capability: Capability, provider: &str) -> Option<&ProviderRate> {
		self.rates.iter().find(|r| r.capability == capability && r.provider == provider)
	}

	/// Margin for a `(capability, provider)` pair, falling back to
	/// the platform default for unlisted pairs.
	pub fn margin(&self, capability: Capability, provider: &str) -> f64 {
		self.rate(capability, provider).map(|r| r.margin).unwrap_or(DEFAULT_MARGIN)
	}

	/// The wholesale table the platform ships with.
	pub fn standard() -> Self {
		fn row(provider: &str, capability: Capability, unit: RateUnit) -> ProviderRate {
			ProviderRate {
				provider: provider.to_owned(),
				capability,
				unit,
				margin: DEFAULT_MARGIN,
				eligibility: Eligibility::default(),
			}
		}

		let mut catalog = Self::empty();
		catalog.push(row(
			"openrouter",
			Capability::ChatCompletions,
			RateUnit::PerThousandTokens { input: 0.05, output: 0.15 },
		));
		catalog.push(row(
			"openrouter",
			Capability::Completions,
			RateUnit::PerThousandTokens { input: 0.05, output: 0.15 },
		));
		catalog.push(row(
			"openrouter",
			Capability::Embeddings,
			RateUnit::PerThousandTokens { input: 0.002, output: 0.0 },
		));
		catalog.push(row("deepgram", Capability::Stt, RateUnit::PerMinute(0.43)));
		catalog.push(row("elevenlabs", Capability::Tts, RateUnit::PerCharacter(0.003)));
		catalog.push(row("replicate", Capability::ImageGeneration, RateUnit::PerRequest(0.8)));
		catalog.push(row("replicate", Capability::VideoGeneration, RateUnit::PerMinute(30.0)));
		catalog.push(row("twilio", Capability::PhoneOutbound, RateUnit::PerMinute(1.4)));
		catalog.push(row("twilio", Capability::PhoneInbound, RateUnit::PerMinute(0.85)));
		catalog.push(row("twilio", Capability::SmsOutbound, RateUnit::PerRequest(0.79)));
		catalog.push(row("twilio", Capability::SmsInbound, RateUnit::PerRequest(0.75)));
		// MMS carries a higher margin than plain SMS.
		catalog.push(ProviderRate {
			margin: 1.4,
			..row("twilio", Capability::MmsOutbound, RateUnit::PerRequest(2.0))
		});
		catalog.push(ProviderRate {
			margin: 1.4,
			..row("twilio", Capability::MmsInbound, RateUnit::PerRequest(1.0))
		});
		catalog.push(row(
			"twilio",
			Capability::PhoneNumberMonthly,
			RateUnit::PerRequest(115.0),
		));
		catalog
	}
}

#[cfg(test)]
mod tests {
	use fleet_primitives::TenantId;

	use super::*;

	#[test]
	fn token_cost_splits_input_and_output() {
		let unit = RateUnit::PerThousandTokens { input: 0.05, output: 0.15 };
		let cost = unit.cost_for_tokens(1000, 2000);
		assert!((cost.get() - 0.35).abs() < 1e-9);
	}

	#[test]
	fn standard_table_covers_every_metered_capability() {
		let catalog = RateCatalog::standard();
		for capability in [
			Capability::ChatCompletions,
			Capability::Tts,
			Capability::Stt,
			Capability::SmsOutbound,
			Capability::MmsOutbound,
			Capability::PhoneOutbound,
			Capability::PhoneNumberMonthly,
		] {
			assert!(
				catalog.rates_for(capability).next().is_some(),
				"no rate for {capability}"
			);
		}
	}

	#[test]
	fn mms_margin_is_distinct_from_sms() {
		let catalog = RateCatalog::standard();
		assert_eq!(catalog.margin(Capability::SmsOutbound, "twilio"), DEFAULT_MARGIN);
		assert_eq!(catalog.margin(Capability::MmsOutbound, "twilio"), 1.4);
	}

	#[test]
	fn eligibility_checks_model_prefix_and_byok() {
		let eligibility = Eligibility {
			model_prefixes: vec!["anthropic/".to_owned()],
			tiers: None,
			requires_byok: true,
		};

		let mut request = RouteRequest::new(
			Capability::ChatCompletions,
			TenantId::from("t"),
			serde_json::json!({ "model": "anthropic/claude-sonnet" }),
		);
		assert!(!eligibility.matches(&request), "byok required");

		request.byok = true;
		assert!(eligibility.matches(&request));

		request.model_hint = Some("openai/gpt".to_owned());
		assert!(!eligibility.matches(&request), "wrong prefix");
	}
}
