//! Driver availability and administrator approval handlers.

use axum::{
  Json,
  extract::{Path, Query, State},
};
use rodas_core::{
  driver::{ApprovalState, DriverProfile, DriverRecord},
  store::RideStore,
};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{ApiState, JsonBody, auth::Authenticated, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub approval_state: Option<ApprovalState>,
}

#[derive(Debug, Deserialize)]
pub struct ApprovalBody {
  pub approval_state: ApprovalState,
  #[serde(default)]
  pub note:           Option<String>,
}

/// `GET /drivers/me`
pub async fn me<S: RideStore + 'static>(
  State(state): State<ApiState<S>>,
  auth: Authenticated,
) -> Result<Json<DriverProfile>, ApiError> {
  let profile = state.coordinator.driver_profile(&auth.session.actor).await?;
  Ok(Json(profile))
}

/// `POST /drivers/me/toggle-online`
pub async fn toggle_online<S: RideStore + 'static>(
  State(state): State<ApiState<S>>,
  auth: Authenticated,
) -> Result<Json<Value>, ApiError> {
  let profile = state.coordinator.toggle_online(&auth.session.actor).await?;
  Ok(Json(json!({ "success": true, "online": profile.online })))
}

/// `GET /drivers[?approval_state=pending]` (administrators only)
pub async fn list<S: RideStore + 'static>(
  State(state): State<ApiState<S>>,
  auth: Authenticated,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<DriverRecord>>, ApiError> {
  let drivers =
    state.coordinator.list_drivers(&auth.session.actor, params.approval_state).await?;
  Ok(Json(drivers))
}

/// `POST /drivers/{id}/approval` (administrators only)
pub async fn set_approval<S: RideStore + 'static>(
  State(state): State<ApiState<S>>,
  auth: Authenticated,
  Path(id): Path<Uuid>,
  JsonBody(body): JsonBody<ApprovalBody>,
) -> Result<Json<Value>, ApiError> {
  let note = body.note.filter(|n| !n.trim().is_empty());
  let profile = state
    .coordinator
    .set_approval(&auth.session.actor, id, body.approval_state, note)
    .await?;
  Ok(Json(json!({ "success": true, "driver": profile })))
}
