//! Password hashing, bearer sessions and the account handlers.
//!
//! Passwords are stored as argon2 PHC strings. A session token is 32 random
//! bytes, URL-safe base64 on the wire; only its SHA-256 digest reaches the
//! store.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
  Json,
  extract::{FromRequestParts, State},
  http::{HeaderMap, StatusCode, header, request::Parts},
};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use rand_core::{OsRng, RngCore};
use rodas_core::{
  Error,
  actor::{NewAccount, NewPatientProfile, NewProfile, Session, normalize_email},
  driver::NewDriverProfile,
  store::RideStore,
};
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::{
  ApiState, JsonBody,
  error::{ApiError, store_err},
};

const MIN_PASSWORD_LEN: usize = 8;

// ─── Passwords ───────────────────────────────────────────────────────────────

/// Hash `password` into an argon2 PHC string.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|h| h.to_string())
    .map_err(|e| ApiError::Hashing(e.to_string()))
}

/// `false` for a wrong password and for an unparsable stored hash alike.
pub fn verify_password(password: &str, phc: &str) -> bool {
  let Ok(parsed) = PasswordHash::new(phc) else { return false };
  Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
}

/// Minimum strength check applied to every new password.
pub fn require_password(password: &str) -> Result<(), Error> {
  if password.chars().count() < MIN_PASSWORD_LEN {
    return Err(Error::validation(
      "password",
      format!("must be at least {MIN_PASSWORD_LEN} characters"),
    ));
  }
  Ok(())
}

// ─── Tokens ──────────────────────────────────────────────────────────────────

/// A fresh bearer token.
pub fn new_token() -> String {
  let mut bytes = [0u8; 32];
  OsRng.fill_bytes(&mut bytes);
  URL_SAFE_NO_PAD.encode(bytes)
}

/// Hex SHA-256 of `token`, the form sessions are stored under.
pub fn token_digest(token: &str) -> String { hex::encode(Sha256::digest(token.as_bytes())) }

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
  headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .map(str::trim)
    .filter(|t| !t.is_empty())
}

// ─── Extractor ───────────────────────────────────────────────────────────────

/// The session behind the request's bearer token. Present in a handler's
/// arguments means the request was authenticated.
pub struct Authenticated {
  pub session:      Session,
  pub token_digest: String,
}

impl<S> FromRequestParts<ApiState<S>> for Authenticated
where
  S: RideStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &ApiState<S>,
  ) -> Result<Self, Self::Rejection> {
    let token = bearer_token(&parts.headers).ok_or(Error::Unauthenticated)?;
    let digest = token_digest(token);
    let session = state
      .coordinator
      .store()
      .resolve_session(&digest, Utc::now())
      .await
      .map_err(store_err)?
      .ok_or(Error::Unauthenticated)?;
    Ok(Self { session, token_digest: digest })
  }
}

// ─── Request bodies ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RegisterPatient {
  pub email:        String,
  pub display_name: String,
  pub password:     String,
  #[serde(flatten)]
  pub profile:      NewPatientProfile,
}

#[derive(Deserialize)]
pub struct RegisterDriver {
  pub email:        String,
  pub display_name: String,
  pub password:     String,
  #[serde(flatten)]
  pub profile:      NewDriverProfile,
}

#[derive(Deserialize)]
pub struct LoginRequest {
  pub email:    String,
  pub password: String,
}

// ─── Handlers ────────────────────────────────────────────────────────────────

async fn register<S: RideStore>(
  state: &ApiState<S>,
  email: String,
  display_name: String,
  password: &str,
  profile: NewProfile,
) -> Result<(StatusCode, Json<Value>), ApiError> {
  require_password(password)?;
  let password_hash = hash_password(password)?;
  let actor = state
    .coordinator
    .register(NewAccount { email, display_name, password_hash, profile })
    .await?;
  Ok((StatusCode::CREATED, Json(json!({ "success": true, "actor": actor }))))
}

/// `POST /auth/register/patient`
pub async fn register_patient<S: RideStore + 'static>(
  State(state): State<ApiState<S>>,
  JsonBody(body): JsonBody<RegisterPatient>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
  register(
    &state,
    body.email,
    body.display_name,
    &body.password,
    NewProfile::Patient(body.profile),
  )
  .await
}

/// `POST /auth/register/driver`
///
/// New drivers start pending approval and offline.
pub async fn register_driver<S: RideStore + 'static>(
  State(state): State<ApiState<S>>,
  JsonBody(body): JsonBody<RegisterDriver>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
  register(
    &state,
    body.email,
    body.display_name,
    &body.password,
    NewProfile::Driver(body.profile),
  )
  .await
}

/// `POST /auth/login`
///
/// Unknown e-mail, wrong password and deactivated account all fail with the
/// same message.
pub async fn login<S: RideStore + 'static>(
  State(state): State<ApiState<S>>,
  JsonBody(body): JsonBody<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
  let email = normalize_email(&body.email);
  let store = state.coordinator.store();

  let actor = match store.find_credentials(&email).await.map_err(store_err)? {
    Some((actor, phc)) if actor.active && verify_password(&body.password, &phc) => actor,
    _ => return Err(Error::InvalidCredentials.into()),
  };

  let token = new_token();
  let expires_at = Utc::now() + state.session_ttl;
  store
    .create_session(actor.actor_id, token_digest(&token), expires_at)
    .await
    .map_err(store_err)?;
  info!(actor = %actor.actor_id, role = actor.role.as_str(), "session opened");

  Ok(Json(json!({
    "success":    true,
    "token":      token,
    "expires_at": expires_at,
    "actor":      actor,
  })))
}

/// `POST /auth/logout`
pub async fn logout<S: RideStore + 'static>(
  State(state): State<ApiState<S>>,
  auth: Authenticated,
) -> Result<Json<Value>, ApiError> {
  state
    .coordinator
    .store()
    .revoke_session(&auth.token_digest)
    .await
    .map_err(store_err)?;
  info!(actor = %auth.session.actor.actor_id, "session closed");
  Ok(Json(json!({ "success": true })))
}

/// `GET /auth/me`
pub async fn me<S: RideStore + 'static>(
  State(state): State<ApiState<S>>,
  auth: Authenticated,
) -> Result<Json<Value>, ApiError> {
  let actor = auth.session.actor;
  let profile = state.coordinator.profile(&actor).await?;
  Ok(Json(json!({
    "actor":      actor,
    "profile":    profile,
    "expires_at": auth.session.expires_at,
  })))
}
