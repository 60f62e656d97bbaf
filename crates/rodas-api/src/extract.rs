//! JSON body extractor that reports malformed input as a field-level 400.
//!
//! axum's own [`Json`] rejects bodies that don't match the target type with
//! a plain-text 422. [`JsonBody`] runs the same extraction and turns the
//! rejection into the `{success, field, message}` shape used for every other
//! validation failure.

use axum::{
  Json,
  extract::{FromRequest, OptionalFromRequest, Request, rejection::JsonRejection},
  http::header,
};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Field reported when a failure can't be pinned to a single key.
const WHOLE_BODY: &str = "body";

/// Prefix axum puts in front of serde's message for type mismatches.
const DATA_ERROR_PREFIX: &str = "Failed to deserialize the JSON body into the target type: ";

pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
  T: DeserializeOwned,
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
    match <Json<T> as FromRequest<S>>::from_request(req, state).await {
      Ok(Json(value)) => Ok(Self(value)),
      Err(rejection) => Err(invalid_body(&rejection)),
    }
  }
}

/// An absent body (no `Content-Type`) extracts as `None`; a present but
/// malformed one is still rejected.
impl<T, S> OptionalFromRequest<S> for JsonBody<T>
where
  T: DeserializeOwned,
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request(req: Request, state: &S) -> Result<Option<Self>, Self::Rejection> {
    if !req.headers().contains_key(header::CONTENT_TYPE) {
      return Ok(None);
    }
    <Self as FromRequest<S>>::from_request(req, state).await.map(Some)
  }
}

fn invalid_body(rejection: &JsonRejection) -> ApiError {
  let (field, message) = match rejection {
    JsonRejection::JsonDataError(e) => describe_data_error(&e.body_text()),
    JsonRejection::JsonSyntaxError(_) => {
      (WHOLE_BODY.to_owned(), "request body is not valid JSON".to_owned())
    }
    JsonRejection::MissingJsonContentType(_) => {
      (WHOLE_BODY.to_owned(), "expected `Content-Type: application/json`".to_owned())
    }
    _ => (WHOLE_BODY.to_owned(), "request body could not be read".to_owned()),
  };
  ApiError::InvalidBody { field, message }
}

/// Split serde's description of a type mismatch into the offending field and
/// a message without source positions.
///
/// Handles `missing field \`x\`` and the `path.to.field: ...` form produced
/// for nested values.
fn describe_data_error(text: &str) -> (String, String) {
  let detail = text.strip_prefix(DATA_ERROR_PREFIX).unwrap_or(text);
  let detail = match detail.find(" at line ") {
    Some(i) => &detail[..i],
    None => detail,
  };

  if let Some(rest) = detail.split("missing field `").nth(1)
    && let Some((name, _)) = rest.split_once('`')
  {
    let field = match detail.split_once(": missing field") {
      Some((path, _)) if is_path(path) => format!("{path}.{name}"),
      _ => name.to_owned(),
    };
    return (field, format!("missing field `{name}`"));
  }

  match detail.split_once(": ") {
    Some((path, message)) if is_path(path) => (path.to_owned(), message.to_owned()),
    _ => (WHOLE_BODY.to_owned(), detail.to_owned()),
  }
}

fn is_path(s: &str) -> bool {
  !s.is_empty()
    && s.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '[' | ']'))
}
