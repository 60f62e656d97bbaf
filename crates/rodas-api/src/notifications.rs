//! In-app notification handlers, polled by the client.

use axum::{
  Json,
  extract::{Path, Query, State},
};
use rodas_core::{notification::Notification, store::RideStore};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{ApiState, auth::Authenticated, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  #[serde(default)]
  pub unread: bool,
}

/// `GET /notifications[?unread=true]`, newest first.
pub async fn list<S: RideStore + 'static>(
  State(state): State<ApiState<S>>,
  auth: Authenticated,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Notification>>, ApiError> {
  let items = state.coordinator.notifications(&auth.session.actor, params.unread).await?;
  Ok(Json(items))
}

/// `GET /notifications/unread-count`
pub async fn unread_count<S: RideStore + 'static>(
  State(state): State<ApiState<S>>,
  auth: Authenticated,
) -> Result<Json<Value>, ApiError> {
  let count = state.coordinator.unread_count(&auth.session.actor).await?;
  Ok(Json(json!({ "count": count })))
}

/// `POST /notifications/{id}/read`
pub async fn mark_read<S: RideStore + 'static>(
  State(state): State<ApiState<S>>,
  auth: Authenticated,
  Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
  let notification = state.coordinator.mark_read(&auth.session.actor, id).await?;
  Ok(Json(json!({ "success": true, "notification": notification })))
}

/// `POST /notifications/read-all`
pub async fn read_all<S: RideStore + 'static>(
  State(state): State<ApiState<S>>,
  auth: Authenticated,
) -> Result<Json<Value>, ApiError> {
  let updated = state.coordinator.mark_all_read(&auth.session.actor).await?;
  Ok(Json(json!({ "success": true, "updated": updated })))
}
