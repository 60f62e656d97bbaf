//! The `RideStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `rodas-store-sqlite`).
//! [`crate::coordinator::Coordinator`] and the HTTP layer depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  actor::{Actor, NewAccount, PatientProfile, Session},
  driver::{ApprovalState, DriverProfile, DriverRecord},
  lifecycle::Transition,
  notification::{NewNotification, Notification},
  rating::{NewRating, Rating},
  ride::{Ride, RideEvent, RideQuery},
};

/// Parameters for [`RideStore::list_notifications`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NotificationQuery {
  pub unread_only: bool,
  pub limit:       Option<usize>,
}

/// Abstraction over a ride-coordination store backend.
///
/// Guarded mutations (`apply_ride_event`, `submit_rating`,
/// `set_driver_approval`, `mark_notification_read`) must evaluate their guard
/// against freshly read state and commit atomically: either the whole change
/// lands or nothing does. Guard failures surface as the matching
/// [`crate::Error`] variant through `Self::Error`.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait RideStore: Send + Sync {
  type Error: Into<crate::Error> + std::error::Error + Send + Sync + 'static;

  // ── Accounts and sessions ─────────────────────────────────────────────

  /// Persist a new actor and its profile. The account is expected to be
  /// [normalized](NewAccount::normalized) already; an e-mail in use fails
  /// with a `Validation` error on `email`.
  fn register(
    &self,
    account: NewAccount,
  ) -> impl Future<Output = Result<Actor, Self::Error>> + Send + '_;

  fn get_actor(
    &self,
    actor_id: Uuid,
  ) -> impl Future<Output = Result<Option<Actor>, Self::Error>> + Send + '_;

  /// Look up an actor and its password hash by normalised e-mail.
  fn find_credentials<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<(Actor, String)>, Self::Error>> + Send + 'a;

  /// Store a session keyed by the digest of its bearer token.
  fn create_session(
    &self,
    actor_id: Uuid,
    token_digest: String,
    expires_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// The live session for `token_digest`, or `None` if unknown, expired or
  /// belonging to an inactive actor.
  fn resolve_session<'a>(
    &'a self,
    token_digest: &'a str,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Session>, Self::Error>> + Send + 'a;

  /// Returns `true` if a session was removed.
  fn revoke_session<'a>(
    &'a self,
    token_digest: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  fn get_patient_profile(
    &self,
    actor_id: Uuid,
  ) -> impl Future<Output = Result<Option<PatientProfile>, Self::Error>> + Send + '_;

  fn get_driver_profile(
    &self,
    actor_id: Uuid,
  ) -> impl Future<Output = Result<Option<DriverProfile>, Self::Error>> + Send + '_;

  // ── Drivers ───────────────────────────────────────────────────────────

  fn set_driver_online(
    &self,
    driver_id: Uuid,
    online: bool,
  ) -> impl Future<Output = Result<DriverProfile, Self::Error>> + Send + '_;

  /// Flip the online flag in a single statement.
  fn toggle_driver_online(
    &self,
    driver_id: Uuid,
  ) -> impl Future<Output = Result<DriverProfile, Self::Error>> + Send + '_;

  /// Apply [`DriverProfile::apply_approval`] to the stored profile.
  fn set_driver_approval(
    &self,
    driver_id: Uuid,
    to: ApprovalState,
    note: Option<String>,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<DriverProfile, Self::Error>> + Send + '_;

  fn list_drivers(
    &self,
    approval_state: Option<ApprovalState>,
  ) -> impl Future<Output = Result<Vec<DriverRecord>, Self::Error>> + Send + '_;

  // ── Rides ─────────────────────────────────────────────────────────────

  fn create_ride(&self, ride: Ride) -> impl Future<Output = Result<Ride, Self::Error>> + Send + '_;

  fn get_ride(
    &self,
    ride_id: Uuid,
  ) -> impl Future<Output = Result<Option<Ride>, Self::Error>> + Send + '_;

  /// Rides matching `query`, latest `scheduled_for` first.
  fn list_rides<'a>(
    &'a self,
    query: &'a RideQuery,
  ) -> impl Future<Output = Result<Vec<Ride>, Self::Error>> + Send + 'a;

  /// Run [`crate::lifecycle::apply`] against the stored ride and commit the
  /// result. A completed trip also bumps the driver's completed-ride count in
  /// the same transaction.
  fn apply_ride_event(
    &self,
    ride_id: Uuid,
    actor: Actor,
    event: RideEvent,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Transition, Self::Error>> + Send + '_;

  // ── Ratings ───────────────────────────────────────────────────────────

  /// Run [`crate::rating::prepare`] against the stored ride, enforce one
  /// rating per `(ride, evaluator, direction)`, and recompute the driver's
  /// average when a patient rates.
  fn submit_rating(
    &self,
    ride_id: Uuid,
    evaluator: Actor,
    input: NewRating,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Rating, Self::Error>> + Send + '_;

  fn list_ratings(
    &self,
    ride_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Rating>, Self::Error>> + Send + '_;

  // ── Notifications ─────────────────────────────────────────────────────

  fn insert_notification(
    &self,
    input: NewNotification,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Notification, Self::Error>> + Send + '_;

  /// Newest first.
  fn list_notifications(
    &self,
    recipient_id: Uuid,
    query: NotificationQuery,
  ) -> impl Future<Output = Result<Vec<Notification>, Self::Error>> + Send + '_;

  fn unread_count(
    &self,
    recipient_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// `NotRecipient` unless `reader_id` owns the notification. Marking an
  /// already-read notification succeeds and keeps the original `read_at`.
  fn mark_notification_read(
    &self,
    notification_id: Uuid,
    reader_id: Uuid,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Notification, Self::Error>> + Send + '_;

  /// Returns how many notifications changed.
  fn mark_all_read(
    &self,
    recipient_id: Uuid,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}
