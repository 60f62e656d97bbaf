//! Rating handlers, nested under a ride.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use rodas_core::{
  rating::{NewRating, Rating},
  store::RideStore,
};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{ApiState, JsonBody, auth::Authenticated, error::ApiError};

/// `GET /rides/{id}/ratings`
pub async fn list<S: RideStore + 'static>(
  State(state): State<ApiState<S>>,
  auth: Authenticated,
  Path(ride_id): Path<Uuid>,
) -> Result<Json<Vec<Rating>>, ApiError> {
  let ratings = state.coordinator.list_ratings(&auth.session.actor, ride_id).await?;
  Ok(Json(ratings))
}

/// `POST /rides/{id}/ratings` with `{"score": 5, "comment": "..."}`
///
/// The direction follows from who is rating: the ride's patient rates the
/// driver and vice versa.
pub async fn create<S: RideStore + 'static>(
  State(state): State<ApiState<S>>,
  auth: Authenticated,
  Path(ride_id): Path<Uuid>,
  JsonBody(body): JsonBody<NewRating>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
  let rating = state.coordinator.submit_rating(&auth.session.actor, ride_id, body).await?;
  Ok((StatusCode::CREATED, Json(json!({ "success": true, "rating": rating }))))
}
