//! Error types for `rodas-core`.
//!
//! Every guard failure in the ride lifecycle maps to one variant here. The API
//! layer decides how each variant is surfaced to clients.

use thiserror::Error;
use uuid::Uuid;

use crate::driver::ApprovalState;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid {field}: {message}")]
  Validation {
    field:   &'static str,
    message: String,
  },

  #[error("permission denied")]
  PermissionDenied,

  #[error("invalid transition: {0}")]
  InvalidTransition(String),

  #[error("driver approval cannot move from {from} to {to}")]
  InvalidApprovalTransition {
    from: ApprovalState,
    to:   ApprovalState,
  },

  #[error("driver is not approved to accept rides")]
  NotApproved,

  #[error("this ride has already been rated by this participant")]
  DuplicateRating,

  #[error("ride must be completed before it can be rated")]
  RideNotCompleted,

  #[error("notification belongs to another user")]
  NotRecipient,

  #[error("{entity} not found: {id}")]
  NotFound { entity: &'static str, id: Uuid },

  #[error("invalid e-mail or password")]
  InvalidCredentials,

  #[error("authentication required")]
  Unauthenticated,

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
    Self::Validation { field, message: message.into() }
  }

  pub fn invalid_transition(message: impl Into<String>) -> Self {
    Self::InvalidTransition(message.into())
  }

  pub fn ride_not_found(id: Uuid) -> Self {
    Self::NotFound { entity: "ride", id }
  }

  pub fn driver_not_found(id: Uuid) -> Self {
    Self::NotFound { entity: "driver", id }
  }

  pub fn actor_not_found(id: Uuid) -> Self {
    Self::NotFound { entity: "actor", id }
  }

  pub fn notification_not_found(id: Uuid) -> Self {
    Self::NotFound { entity: "notification", id }
  }

  /// `true` for failures caused by the store rather than by a business rule.
  pub fn is_infrastructure(&self) -> bool {
    matches!(self, Self::Store(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
