//! JSON REST API for Esperança Sobre Rodas.
//!
//! Exposes an axum [`Router`] backed by any [`RideStore`]. Every route except
//! registration and login expects `Authorization: Bearer <token>`; the token
//! is issued by `POST /auth/login`.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = rodas_api::api_router(ApiState::new(coordinator, ttl));
//! ```

pub mod auth;
pub mod drivers;
pub mod error;
pub mod extract;
pub mod notifications;
pub mod ratings;
pub mod rides;


use axum::{
  Router,
  routing::{get, post},
};
use rodas_core::{coordinator::Coordinator, store::RideStore};

pub use error::ApiError;
pub use extract::JsonBody;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct ApiState<S> {
  pub coordinator: Coordinator<S>,
  /// Lifetime of a session opened by `POST /auth/login`.
  pub session_ttl: chrono::Duration,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self { coordinator: self.coordinator.clone(), session_ttl: self.session_ttl }
  }
}

impl<S: RideStore> ApiState<S> {
  pub fn new(coordinator: Coordinator<S>, session_ttl: chrono::Duration) -> Self {
    Self { coordinator, session_ttl }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: ApiState<S>) -> Router<()>
where
  S: RideStore + 'static,
{
  Router::new()
    // Accounts
    .route("/auth/register/patient", post(auth::register_patient::<S>))
    .route("/auth/register/driver", post(auth::register_driver::<S>))
    .route("/auth/login", post(auth::login::<S>))
    .route("/auth/logout", post(auth::logout::<S>))
    .route("/auth/me", get(auth::me::<S>))
    // Rides
    .route("/rides", get(rides::list::<S>).post(rides::create::<S>))
    .route("/rides/{id}", get(rides::get_one::<S>))
    .route("/rides/{id}/accept", post(rides::accept::<S>))
    .route("/rides/{id}/status", post(rides::update_status::<S>))
    .route("/rides/{id}/cancel", post(rides::cancel::<S>))
    .route("/rides/{id}/ratings", get(ratings::list::<S>).post(ratings::create::<S>))
    // Drivers
    .route("/drivers", get(drivers::list::<S>))
    .route("/drivers/me", get(drivers::me::<S>))
    .route("/drivers/me/toggle-online", post(drivers::toggle_online::<S>))
    .route("/drivers/{id}/approval", post(drivers::set_approval::<S>))
    // Notifications
    .route("/notifications", get(notifications::list::<S>))
    .route("/notifications/unread-count", get(notifications::unread_count::<S>))
    .route("/notifications/read-all", post(notifications::read_all::<S>))
    .route("/notifications/{id}/read", post(notifications::mark_read::<S>))
    .with_state(state)
}
