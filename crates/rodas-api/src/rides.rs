//! Ride request and lifecycle handlers.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use rodas_core::{
  ride::{NewRide, Ride, RideStatus},
  store::RideStore,
};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{ApiState, JsonBody, auth::Authenticated, error::ApiError};

// ─── Query / body types ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub status: Option<RideStatus>,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status: RideStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelBody {
  #[serde(default)]
  pub reason: Option<String>,
}

// ─── Handlers ─────────────────────────────────────────────────────────────────

/// `GET /rides[?status=pending]`
///
/// Patients see their own rides, drivers see open requests plus the rides
/// assigned to them, administrators see everything.
pub async fn list<S: RideStore + 'static>(
  State(state): State<ApiState<S>>,
  auth: Authenticated,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Ride>>, ApiError> {
  let rides = state.coordinator.list_rides(&auth.session.actor, params.status).await?;
  Ok(Json(rides))
}

/// `POST /rides`
pub async fn create<S: RideStore + 'static>(
  State(state): State<ApiState<S>>,
  auth: Authenticated,
  JsonBody(body): JsonBody<NewRide>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
  let ride = state.coordinator.create_ride(&auth.session.actor, body).await?;
  Ok((
    StatusCode::CREATED,
    Json(json!({ "success": true, "ride_id": ride.ride_id, "ride": ride })),
  ))
}

/// `GET /rides/{id}`
pub async fn get_one<S: RideStore + 'static>(
  State(state): State<ApiState<S>>,
  auth: Authenticated,
  Path(id): Path<Uuid>,
) -> Result<Json<Ride>, ApiError> {
  let ride = state.coordinator.get_ride(&auth.session.actor, id).await?;
  Ok(Json(ride))
}

/// `POST /rides/{id}/accept`
pub async fn accept<S: RideStore + 'static>(
  State(state): State<ApiState<S>>,
  auth: Authenticated,
  Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
  let ride = state.coordinator.accept(&auth.session.actor, id).await?;
  Ok(Json(json!({
    "success":  true,
    "message":  "Ride accepted",
    "redirect": format!("/rides/{}", ride.ride_id),
  })))
}

/// `POST /rides/{id}/status` with `{"status": "in_progress"}`
pub async fn update_status<S: RideStore + 'static>(
  State(state): State<ApiState<S>>,
  auth: Authenticated,
  Path(id): Path<Uuid>,
  JsonBody(body): JsonBody<StatusBody>,
) -> Result<Json<Value>, ApiError> {
  let ride = state.coordinator.advance(&auth.session.actor, id, body.status).await?;
  Ok(Json(json!({ "success": true, "new_status": ride.status })))
}

/// `POST /rides/{id}/cancel`
pub async fn cancel<S: RideStore + 'static>(
  State(state): State<ApiState<S>>,
  auth: Authenticated,
  Path(id): Path<Uuid>,
  body: Option<JsonBody<CancelBody>>,
) -> Result<Json<Value>, ApiError> {
  let reason = body.and_then(|JsonBody(b)| b.reason).filter(|r| !r.trim().is_empty());
  let ride = state.coordinator.cancel(&auth.session.actor, id, reason).await?;
  Ok(Json(json!({ "success": true, "new_status": ride.status })))
}
