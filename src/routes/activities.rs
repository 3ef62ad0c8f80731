// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity routes: creation cascade, populated reads and block updates.

use crate::error::Result;
use crate::models::{Activity, PopulatedActivity, PopulatedEnergyOwner};
use crate::services::activity::CreateActivityRequest;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use std::sync::Arc;

/// Routes mounted under `/activities`.
///
/// Path parameters at the same position share a name; the router rejects
/// sibling routes that bind one segment under two names.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_activities).post(create_activity))
        .route("/{id}", get(get_activity))
        .route(
            "/{id}/energy-owners/{energy_owner_id}",
            get(get_energy_owner),
        )
        .route("/{id}/energyOwners/{energy_owner_id}", put(block_activity))
}

async fn create_activity(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<CreateActivityRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PopulatedActivity>)> {
    let Json(request) = payload?;
    let activity = state.activity_service.create(request).await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

async fn list_activities(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PopulatedActivity>>> {
    Ok(Json(state.activity_service.list().await?))
}

async fn get_activity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PopulatedActivity>> {
    Ok(Json(state.activity_service.get(&id).await?))
}

async fn get_energy_owner(
    State(state): State<Arc<AppState>>,
    Path((id, energy_owner_id)): Path<(String, String)>,
) -> Result<Json<PopulatedEnergyOwner>> {
    let owner = state
        .activity_service
        .get_energy_owner(&id, &energy_owner_id)
        .await?;
    Ok(Json(owner))
}

/// Mark an activity blocked by the energy owner user in the path.
async fn block_activity(
    State(state): State<Arc<AppState>>,
    Path((id, energy_owner_id)): Path<(String, String)>,
) -> Result<Json<Activity>> {
    let activity = state.activity_service.block(&id, &energy_owner_id).await?;
    Ok(Json(activity))
}
