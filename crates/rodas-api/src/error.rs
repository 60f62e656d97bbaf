//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Business-rule refusals are answered with `200 {"success": false, ...}`
//! so existing clients can render the message inline. Only malformed input,
//! missing credentials, unknown ids and infrastructure failures use a
//! non-2xx status.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use rodas_core::Error;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Message returned for every 500; the cause is only logged.
const INTERNAL_MESSAGE: &str = "internal error, please retry";

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Core(#[from] Error),

  /// The request body did not deserialize into the expected shape.
  #[error("invalid request body: {field}: {message}")]
  InvalidBody { field: String, message: String },

  #[error("password hashing failed: {0}")]
  Hashing(String),
}

/// Lift a store error into an [`ApiError`].
pub(crate) fn store_err<E: Into<Error>>(e: E) -> ApiError { ApiError::Core(e.into()) }

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let core = match self {
      ApiError::Core(e) => e,
      ApiError::InvalidBody { field, message } => {
        return invalid_input(&field, &message);
      }
      ApiError::Hashing(message) => {
        error!(error = %message, "password hashing failed");
        return internal();
      }
    };

    match core {
      Error::Validation { field, message } => invalid_input(field, &message),
      e @ (Error::Unauthenticated | Error::InvalidCredentials) => {
        let mut res = (
          StatusCode::UNAUTHORIZED,
          Json(json!({ "success": false, "message": e.to_string() })),
        )
          .into_response();
        res
          .headers_mut()
          .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        res
      }
      e @ Error::NotFound { .. } => (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "message": e.to_string() })),
      )
        .into_response(),
      e if e.is_infrastructure() => {
        error!(error = %e, "request failed");
        internal()
      }
      e => (StatusCode::OK, Json(json!({ "success": false, "message": e.to_string() })))
        .into_response(),
    }
  }
}

fn invalid_input(field: &str, message: &str) -> Response {
  (
    StatusCode::BAD_REQUEST,
    Json(json!({ "success": false, "field": field, "message": message })),
  )
    .into_response()
}

fn internal() -> Response {
  (
    StatusCode::INTERNAL_SERVER_ERROR,
    Json(json!({ "success": false, "message": INTERNAL_MESSAGE })),
  )
    .into_response()
}

#[cfg(test)]
mod tests {
  use super::*;
  use uuid::Uuid;

  fn status_of(e: Error) -> StatusCode { ApiError::from(e).into_response().status() }

  #[test]
  fn business_rules_are_200() {
    assert_eq!(status_of(Error::PermissionDenied), StatusCode::OK);
    assert_eq!(status_of(Error::NotApproved), StatusCode::OK);
    assert_eq!(status_of(Error::DuplicateRating), StatusCode::OK);
    assert_eq!(status_of(Error::RideNotCompleted), StatusCode::OK);
    assert_eq!(status_of(Error::NotRecipient), StatusCode::OK);
    assert_eq!(status_of(Error::invalid_transition("ride is not pending")), StatusCode::OK);
  }

  #[test]
  fn boundary_errors_keep_their_status() {
    assert_eq!(status_of(Error::validation("score", "out of range")), StatusCode::BAD_REQUEST);
    assert_eq!(status_of(Error::Unauthenticated), StatusCode::UNAUTHORIZED);
    assert_eq!(status_of(Error::InvalidCredentials), StatusCode::UNAUTHORIZED);
    assert_eq!(status_of(Error::ride_not_found(Uuid::new_v4())), StatusCode::NOT_FOUND);
  }

  #[test]
  fn malformed_bodies_are_400_with_field() {
    let res = ApiError::InvalidBody {
      field:   "scheduled_for".into(),
      message: "missing field `scheduled_for`".into(),
    }
    .into_response();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
  }

  #[test]
  fn store_failures_are_500() {
    let e = Error::Store("disk I/O error".into());
    assert_eq!(status_of(e), StatusCode::INTERNAL_SERVER_ERROR);
  }

  #[test]
  fn unauthorized_carries_challenge() {
    let res = ApiError::from(Error::Unauthenticated).into_response();
    assert_eq!(res.headers().get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");
  }
}
