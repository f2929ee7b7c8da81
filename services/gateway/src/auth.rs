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

//! Bearer-token authentication.
//!
//! Token metadata is loaded once at startup from environment
//! variables of the form `FLEET_TOKEN_<tenant>=<scope>:<secret>`,
//! plus the legacy shared `FLEET_API_TOKEN` which authenticates as
//! the reserved platform tenant with admin scope.

use std::{collections::HashMap, sync::Arc};

use axum::{
	extract::{Request, State},
	http::header,
	middleware::Next,
	response::Response,
};
use fleet_primitives::{TenantId, TokenScope, PLATFORM_TENANT};
use fleet_types::PlatformError;
use tracing::warn;

/// Identity attached to a request after the bearer middleware.
#[derive(Debug, Clone)]
pub struct AuthContext {
	pub tenant: TenantId,
	pub scope: TokenScope,
}

impl AuthContext {
	pub fn require(&self, scope: TokenScope) -> Result<(), PlatformError> {
		if self.scope.allows(scope) {
			Ok(())
		} else {
			Err(PlatformError::Forbidden(format!("{scope:?} scope required").to_lowercase()))
		}
	}
}

const TOKEN_PREFIX: &str = "FLEET_TOKEN_";
const LEGACY_TOKEN: &str = "FLEET_API_TOKEN";

/// Secret → identity table.
#[derive(Default)]
pub struct TokenTable {
	tokens: HashMap<String, AuthContext>,
}

impl TokenTable {
	/// Build the table from an environment snapshot. Malformed
	/// entries are skipped with a warning rather than refusing to
	/// boot.
	pub fn from_env_vars(vars: impl Iterator<Item = (String, String)>) -> Self {
		let mut tokens = HashMap::new();
		for (key, value) in vars {
			if key == LEGACY_TOKEN {
				if !value.is_empty() {
					tokens.insert(
						value,
						AuthContext {
							tenant: TenantId::from(PLATFORM_TENANT),
							scope: TokenScope::Admin,
						},
					);
				}
				continue;
			}
			let Some(tenant) = key.strip_prefix(TOKEN_PREFIX) else { continue };
			match value.split_once(':') {
				Some((scope, secret)) if !secret.is_empty() => match scope.parse::<TokenScope>() {
					Ok(scope) => {
						tokens.insert(
							secret.to_owned(),
							AuthContext { tenant: TenantId::from(tenant), scope },
						);
					},
					Err(err) => warn!(%key, %err, "skipping token with bad scope"),
				},
				_ => warn!(%key, "skipping malformed token, expected <scope>:<secret>"),
			}
		}
		Self { tokens }
	}

	pub fn insert(&mut self, secret: impl Into<String>, context: AuthContext) {
		self.tokens.insert(secret.into(), context);
	}

	pub fn resolve(&self, secret: &str) -> Option<&AuthContext> {
		self.tokens.get(secret)
	}

	pub fn is_empty(&self) -> bool {
		self.tokens.is_empty()
	}
}

/// Axum middleware enforcing `Authorization: Bearer` on a route tree
/// and stashing the resolved [`AuthContext`] as a request extension.
pub async fn require_bearer(
	State(tokens): State<Arc<TokenTable>>,
	mut request: Request,
	next: Next,
) -> Result<Response, PlatformError> {
	let header = request
		.headers()
		.get(header::AUTHORIZATION)
		.and_then(|value| value.to_str().ok())
		.ok_or(PlatformError::AuthMissing)?;

	let secret = header.strip_prefix("Bearer ").ok_or(PlatformError::AuthMissing)?;
	let context = tokens.resolve(secret).ok_or(PlatformError::AuthFailed)?.clone();

	request.extensions_mut().insert(context);
	Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn env<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Iterator<Item = (String, String)> + 'a {
		pairs.iter().map(|(k, v)| (k.to_string(), v.to_string()))
	}

	#[test]
	fn parses_scoped_tenant_tokens() {
		let table = TokenTable::from_env_vars(env(&[
			("FLEET_TOKEN_acme", "write:s3cret"),
			("FLEET_TOKEN_globex", "read:other"),
		]));

		let acme = table.resolve("s3cret").unwrap();
		assert_eq!(acme.tenant, TenantId::from("acme"));
		assert_eq!(acme.scope, TokenScope::Write);

		let globex = table.resolve("other").unwrap();
		assert_eq!(globex.scope, TokenScope::Read);
	}

	#[test]
	fn legacy_token_is_platform_admin() {
		let table = TokenTable::from_env_vars(env(&[("FLEET_API_TOKEN", "legacy")]));
		let context = table.resolve("legacy").unwrap();
		assert!(context.tenant.is_platform());
		assert_eq!(context.scope, TokenScope::Admin);
	}

	#[test]
	fn malformed_entries_are_skipped() {
		let table = TokenTable::from_env_vars(env(&[
			("FLEET_TOKEN_acme", "no-colon-here"),
			("FLEET_TOKEN_bad", "superuser:xyz"),
			("UNRELATED", "value"),
		]));
		assert!(table.is_empty());
	}

	#[test]
	fn scope_enforcement() {
		let reader =
			AuthContext { tenant: TenantId::from("acme"), scope: TokenScope::Read };
		assert!(reader.require(TokenScope::Read).is_ok());
		assert!(matches!(
			reader.require(TokenScope::Write),
			Err(PlatformError::Forbidden(_))
		));
	}
}
