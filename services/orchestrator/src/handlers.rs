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
use fleet_primitives::{BotId, NodeId, TokenScope};
use fleet_types::{
	profile::{BotProfile, ProfilePatch, SnapshotKind},
	PlatformError,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{manager::CreateBot, OrchestratorDeps};

pub async fn create_bot(
	State(deps): State<Arc<OrchestratorDeps>>,
	Extension(auth): Extension<AuthContext>,
	Json(request): Json<CreateBot>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Write)?;
	let (profile, dispatch) = deps.manager.create(&auth.tenant, request).await?;
	Ok((
		StatusCode::CREATED,
		Json(serde_json::json!({ "profile": profile, "dispatch": dispatch })),
	)
		.into_response())
}

pub async fn list_bots(
	State(deps): State<Arc<OrchestratorDeps>>,
	Extension(auth): Extension<AuthContext>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Read)?;
	Ok(Json(deps.manager.list_by_tenant(&auth.tenant)?).into_response())
}

pub async fn get_bot(
	State(deps): State<Arc<OrchestratorDeps>>,
	Extension(auth): Extension<AuthContext>,
	Path(bot_id): Path<BotId>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Read)?;
	let profile = authorized_bot(&deps, &auth, bot_id).await?;
	let instance = deps.manager.instance(bot_id);
	Ok(Json(serde_json::json!({ "profile": profile, "instance": instance })).into_response())
}

pub async fn update_bot(
	State(deps): State<Arc<OrchestratorDeps>>,
	Extension(auth): Extension<AuthContext>,
	Path(bot_id): Path<BotId>,
	Json(patch): Json<ProfilePatch>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Write)?;
	let _profile = authorized_bot(&deps, &auth, bot_id).await?;
	let updated = deps.manager.update(bot_id, patch).await?;
	Ok(Json(updated).into_response())
}

pub async fn delete_bot(
	State(deps): State<Arc<OrchestratorDeps>>,
	Extension(auth): Extension<AuthContext>,
	Path(bot_id): Path<BotId>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Write)?;
	let _profile = authorized_bot(&deps, &auth, bot_id).await?;
	deps.manager.delete(bot_id).await?;
	Ok(StatusCode::NO_CONTENT.into_response())
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
	pub node: String,
}

pub async fn move_bot(
	State(deps): State<Arc<OrchestratorDeps>>,
	Extension(auth): Extension<AuthContext>,
	Path(bot_id): Path<BotId>,
	Json(request): Json<MoveRequest>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Write)?;
	let _profile = authorized_bot(&deps, &auth, bot_id).await?;
	let instance = deps.manager.move_bot(bot_id, NodeId::from(request.node.as_str())).await?;
	Ok(Json(instance).into_response())
}

/// Ownership gate shared by the fleet surface: the bot must belong to
/// the caller's tenant (platform admins see everything).
pub async fn authorized_bot(
	deps: &OrchestratorDeps,
	auth: &AuthContext,
	bot_id: BotId,
) -> Result<BotProfile, PlatformError> {
	let profile = deps.manager.get(bot_id).await?;
	if profile.tenant != auth.tenant && !auth.scope.allows(TokenScope::Admin) {
		return Err(PlatformError::Forbidden("bot belongs to another tenant".into()));
	}
	Ok(profile)
}

pub async fn list_snapshots(
	State(deps): State<Arc<OrchestratorDeps>>,
	Extension(auth): Extension<AuthContext>,
	Path(bot_id): Path<BotId>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Read)?;
	let _profile = authorized_bot(&deps, &auth, bot_id).await?;
	Ok(Json(deps.snapshots.list(bot_id)).into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateSnapshotRequest {
	#[serde(default)]
	pub kind: Option<SnapshotKind>,
}

pub async fn create_snapshot(
	State(deps): State<Arc<OrchestratorDeps>>,
	Extension(auth): Extension<AuthContext>,
	Path(bot_id): Path<BotId>,
	body: Option<Json<CreateSnapshotRequest>>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Write)?;
	let profile = authorized_bot(&deps, &auth, bot_id).await?;

	let kind = body.and_then(|Json(b)| b.kind).unwrap_or(SnapshotKind::OnDemand);
	let tier = deps.directory.meta(&profile.tenant).tier;

	let snapshot = deps.snapshots.create(
		bot_id,
		&profile.tenant,
		tier,
		kind,
		format!("snapshots/{bot_id}/{}", Uuid::new_v4()),
		0,
	)?;
	Ok((StatusCode::CREATED, Json(snapshot)).into_response())
}

pub async fn delete_snapshot(
	State(deps): State<Arc<OrchestratorDeps>>,
	Extension(auth): Extension<AuthContext>,
	Path((bot_id, snap_id)): Path<(BotId, Uuid)>,
) -> Result<Response, PlatformError> {
	auth.require(TokenScope::Write)?;
	let profile = authorized_bot(&deps, &auth, bot_id).await?;

	deps.snapshots.delete(bot_id, snap_id, &profile.tenant)?;
	Ok(StatusCode::NO_CONTENT.into_response())
}
