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

use std::sync::Arc;

use axum::{
	extract::{Path, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	Extension, Json,
};
use fleet_gateway::AuthContext;
use fleet_primitives::{TenantId, TokenScope, PLATFORM_TENANT};
use fleet_types::PlatformError;
use serde::Deserialize;

use crate::{store::Role, RolesDeps};

/// The acting user behind a bearer token is the token's tenant; admin
/// endpoints require admin scope on top.
fn acting_user(auth: &AuthContext) -> Result<String, PlatformError> {
	auth.require(TokenScope::Admin)?;
	Ok(auth.tenant.to_string())
}

pub async fn list_roles(
	State(deps): State<Arc<RolesDeps>>,
	Extension(auth): Extension<AuthContext>,
	Path(tenant_id): Path<String>,
) -> Result<Response, PlatformError> {
	let _user = acting_user(&auth)?;
	Ok(Json(deps.roles.list(&TenantId::from(tenant_id))).into_response())
}

#[derive(Debug, Deserialize)]
pub struct GrantRequest {
	pub role: Role,
}

pub async fn grant_role(
	State(deps): State<Arc<RolesDeps>>,
	Extension(auth): Extension<AuthContext>,
	Path((tenant_id, user_id)): Path<(String, String)>,
	Json(request): Json<GrantRequest>,
) -> Result<Response, PlatformError> {
	let user = acting_user(&auth)?;
	deps.roles.grant(&TenantId::from(tenant_id), &user_id, request.role, &user)?;
	Ok(StatusCode::OK.into_response())
}

pub async fn revoke_role(
	State(deps): State<Arc<RolesDeps>>,
	Extension(auth): Extension<AuthContext>,
	Path((tenant_id, user_id)): Path<(String, String)>,
) -> Result<Response, PlatformError> {
	let _user = acting_user(&auth)?;
	deps.roles.revoke(&TenantId::from(tenant_id), &user_id)?;
	Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn list_platform_admins(
	State(deps): State<Arc<RolesDeps>>,
	Extension(auth): Extension<AuthContext>,
) -> Result<Response, PlatformError> {
	let _user = acting_user(&auth)?;
	Ok(Json(deps.roles.platform_admins()).into_response())
}

#[derive(Debug, Deserialize)]
pub struct PlatformAdminRequest {
	#[serde(rename = "userId")]
	pub user_id: String,
}

pub async fn grant_platform_admin(
	State(deps): State<Arc<RolesDeps>>,
	Extension(auth): Extension<AuthContext>,
	Json(request): Json<PlatformAdminRequest>,
) -> Result<Response, PlatformError> {
	let user = acting_user(&auth)?;
	deps.roles.grant(
		&TenantId::from(PLATFORM_TENANT),
		&request.user_id,
		Role::PlatformAdmin,
		&user,
	)?;
	Ok(StatusCode::OK.into_response())
}

pub async fn revoke_platform_admin(
	State(deps): State<Arc<RolesDeps>>,
	Extension(auth): Extension<AuthContext>,
	Path(user_id): Path<String>,
) -> Result<Response, PlatformError> {
	let _user = acting_user(&auth)?;
	deps.roles.revoke(&TenantId::from(PLATFORM_TENANT), &user_id)?;
	Ok(StatusCode::NO_CONTENT.into_response())
}
