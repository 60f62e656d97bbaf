//! Integration tests for `SqliteStore` against an in-memory database, driven
//! through the `Coordinator` where the behaviour spans several writes.

use std::{
  sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
  },
  time::Duration,
};

use chrono::{DateTime, NaiveDate, Utc};
use rodas_core::{
  Error as CoreError,
  actor::{Actor, NewAccount, NewPatientProfile, NewProfile, PatientProfile, Session},
  coordinator::Coordinator,
  dispatch::RetryPolicy,
  driver::{ApprovalState, DriverProfile, DriverRecord, NewDriverProfile},
  lifecycle::Transition,
  notification::{NewNotification, Notification, NotificationKind},
  rating::{NewRating, Rating, RatingDirection},
  ride::{NewRide, Place, Ride, RideEvent, RideQuery, RideStatus},
  store::{NotificationQuery, RideStore},
};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn coordinator() -> Coordinator<SqliteStore> {
  Coordinator::new(
    Arc::new(store().await),
    RetryPolicy { attempts: 2, backoff: Duration::from_millis(1) },
  )
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn patient_account(email: &str) -> NewAccount {
  NewAccount {
    email:         email.into(),
    display_name:  "Ana Lima".into(),
    password_hash: "hash".into(),
    profile:       NewProfile::Patient(NewPatientProfile {
      guardian_name:    "Maria Lima".into(),
      guardian_cpf:     "123.456.789-00".into(),
      guardian_phone:   "(11) 98888-7777".into(),
      needs_wheelchair: true,
      immunosuppressed: false,
      medical_notes:    String::new(),
      accept_terms:     true,
    }),
  }
}

fn driver_account(email: &str, name: &str) -> NewAccount {
  NewAccount {
    email:         email.into(),
    display_name:  name.into(),
    password_hash: "hash".into(),
    profile:       NewProfile::Driver(NewDriverProfile {
      vehicle_make:    "Fiat".into(),
      vehicle_model:   "Doblò".into(),
      vehicle_color:   "Branco".into(),
      vehicle_year:    Some(2019),
      vehicle_plate:   Some("abc1d23".into()),
      licence_number:  Some("01234567890".into()),
      licence_expires: None,
      accept_terms:    true,
    }),
  }
}

fn admin_account() -> NewAccount {
  NewAccount {
    email:         "coord@example.com".into(),
    display_name:  "Coordenação".into(),
    password_hash: "hash".into(),
    profile:       NewProfile::Administrator,
  }
}

fn ride_input() -> NewRide {
  NewRide {
    origin:           Place::address("Rua das Flores, 100"),
    destination:      Place::address("Hospital das Clínicas"),
    scheduled_for:    NaiveDate::from_ymd_opt(2026, 11, 3)
      .unwrap()
      .and_hms_opt(8, 30, 0)
      .unwrap(),
    passenger_count:  1,
    has_companion:    true,
    needs_wheelchair: None,
    notes:            "Bring the folding chair".into(),
  }
}

struct World {
  c:       Coordinator<SqliteStore>,
  admin:   Actor,
  patient: Actor,
  driver:  Actor,
}

/// A patient, an administrator and an approved, online driver.
async fn world() -> World {
  let c = coordinator().await;
  let admin = c.register(admin_account()).await.unwrap();
  let patient = c.register(patient_account("ana@example.com")).await.unwrap();
  let driver = ready_driver(&c, &admin, "bruno@example.com", "Bruno Costa").await;
  World { c, admin, patient, driver }
}

async fn ready_driver(
  c: &Coordinator<SqliteStore>,
  admin: &Actor,
  email: &str,
  name: &str,
) -> Actor {
  let driver = c.register(driver_account(email, name)).await.unwrap();
  c.set_approval(admin, driver.actor_id, ApprovalState::Approved, None).await.unwrap();
  c.set_online(&driver, true).await.unwrap();
  driver
}

async fn completed_ride(w: &World) -> Uuid {
  let ride = w.c.create_ride(&w.patient, ride_input()).await.unwrap();
  w.c.accept(&w.driver, ride.ride_id).await.unwrap();
  for status in [RideStatus::InProgress, RideStatus::DriverArrived, RideStatus::Completed] {
    w.c.advance(&w.driver, ride.ride_id, status).await.unwrap();
  }
  ride.ride_id
}

// ─── Accounts and sessions ───────────────────────────────────────────────────

#[tokio::test]
async fn register_normalizes_and_rejects_duplicate_email() {
  let c = coordinator().await;
  let actor = c.register(patient_account("  Ana@Example.com")).await.unwrap();
  assert_eq!(actor.email, "ana@example.com");

  let err = c.register(patient_account("ANA@example.com")).await.unwrap_err();
  assert!(matches!(err, CoreError::Validation { field: "email", .. }));

  let (found, hash) = c.store().find_credentials("ana@example.com").await.unwrap().unwrap();
  assert_eq!(found.actor_id, actor.actor_id);
  assert_eq!(hash, "hash");
}

#[tokio::test]
async fn new_driver_starts_pending_and_offline() {
  let s = store().await;
  let driver = s
    .register(driver_account("d@example.com", "Davi").normalized().unwrap())
    .await
    .unwrap();
  let profile = s.get_driver_profile(driver.actor_id).await.unwrap().unwrap();
  assert_eq!(profile.approval_state, ApprovalState::Pending);
  assert!(!profile.online);
  assert_eq!(profile.average_rating, Decimal::ZERO);
  assert_eq!(profile.completed_ride_count, 0);
  assert_eq!(profile.vehicle.plate.as_deref(), Some("ABC1D23"));
}

#[tokio::test]
async fn sessions_resolve_until_expired_or_revoked() {
  let s = store().await;
  let actor = s.register(admin_account()).await.unwrap();
  let now = Utc::now();

  s.create_session(actor.actor_id, "live".into(), now + chrono::Duration::hours(1))
    .await
    .unwrap();
  s.create_session(actor.actor_id, "stale".into(), now - chrono::Duration::seconds(1))
    .await
    .unwrap();

  let session = s.resolve_session("live", now).await.unwrap().unwrap();
  assert_eq!(session.actor.actor_id, actor.actor_id);
  assert!(s.resolve_session("stale", now).await.unwrap().is_none());
  assert!(s.resolve_session("unknown", now).await.unwrap().is_none());

  assert!(s.revoke_session("live").await.unwrap());
  assert!(!s.revoke_session("live").await.unwrap());
  assert!(s.resolve_session("live", now).await.unwrap().is_none());
}

// ─── Driver availability ─────────────────────────────────────────────────────

#[tokio::test]
async fn toggle_online_does_not_require_approval() {
  let c = coordinator().await;
  let driver = c.register(driver_account("d@example.com", "Davi")).await.unwrap();

  let profile = c.toggle_online(&driver).await.unwrap();
  assert!(profile.online);
  assert_eq!(profile.approval_state, ApprovalState::Pending);
  assert!(!profile.is_eligible_to_accept());

  let profile = c.toggle_online(&driver).await.unwrap();
  assert!(!profile.online);
}

#[tokio::test]
async fn only_drivers_toggle_online() {
  let c = coordinator().await;
  let patient = c.register(patient_account("ana@example.com")).await.unwrap();
  let err = c.toggle_online(&patient).await.unwrap_err();
  assert!(matches!(err, CoreError::PermissionDenied));
}

#[tokio::test]
async fn approval_flow_and_notifications() {
  let c = coordinator().await;
  let admin = c.register(admin_account()).await.unwrap();
  let driver = c.register(driver_account("d@example.com", "Davi")).await.unwrap();

  let err = c
    .set_approval(&driver, driver.actor_id, ApprovalState::Approved, None)
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::PermissionDenied));

  let approved = c
    .set_approval(&admin, driver.actor_id, ApprovalState::Approved, Some("docs ok".into()))
    .await
    .unwrap();
  let approved_at = approved.approved_at.unwrap();
  assert_eq!(approved.admin_notes, "docs ok");

  c.set_online(&driver, true).await.unwrap();
  let suspended = c
    .set_approval(&admin, driver.actor_id, ApprovalState::Suspended, None)
    .await
    .unwrap();
  assert!(!suspended.online);
  assert_eq!(suspended.approved_at, Some(approved_at));

  let err = c
    .set_approval(&admin, driver.actor_id, ApprovalState::Rejected, None)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    CoreError::InvalidApprovalTransition { from: ApprovalState::Suspended, to: ApprovalState::Rejected }
  ));

  let notes = c.notifications(&driver, false).await.unwrap();
  assert_eq!(notes.len(), 2);
  assert!(notes.iter().all(|n| n.kind == NotificationKind::DriverApproval));

  let pending = c.list_drivers(&admin, Some(ApprovalState::Pending)).await.unwrap();
  assert!(pending.is_empty());
  let all = c.list_drivers(&admin, None).await.unwrap();
  assert_eq!(all.len(), 1);
  assert_eq!(all[0].actor.email, "d@example.com");
}

// ─── Rides ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_ride_round_trips_and_defaults_wheelchair() {
  let w = world().await;
  let ride = w.c.create_ride(&w.patient, ride_input()).await.unwrap();
  assert_eq!(ride.status, RideStatus::Pending);
  assert!(ride.needs_wheelchair);

  let stored = w.c.get_ride(&w.patient, ride.ride_id).await.unwrap();
  assert_eq!(stored, ride);

  let err = w.c.create_ride(&w.driver, ride_input()).await.unwrap_err();
  assert!(matches!(err, CoreError::PermissionDenied));

  let mut bad = ride_input();
  bad.passenger_count = 0;
  let err = w.c.create_ride(&w.patient, bad).await.unwrap_err();
  assert!(matches!(err, CoreError::Validation { field: "passenger_count", .. }));
}

#[tokio::test]
async fn missing_ride_is_not_found() {
  let w = world().await;
  let id = Uuid::new_v4();
  let err = w.c.get_ride(&w.patient, id).await.unwrap_err();
  assert!(matches!(err, CoreError::NotFound { entity: "ride", .. }));
  let err = w.c.accept(&w.driver, id).await.unwrap_err();
  assert!(matches!(err, CoreError::NotFound { entity: "ride", .. }));
}

#[tokio::test]
async fn accept_then_skip_to_complete_is_rejected() {
  let w = world().await;
  let ride = w.c.create_ride(&w.patient, ride_input()).await.unwrap();

  let accepted = w.c.accept(&w.driver, ride.ride_id).await.unwrap();
  assert_eq!(accepted.status, RideStatus::Accepted);
  assert_eq!(accepted.driver_id, Some(w.driver.actor_id));

  let notes = w.c.notifications(&w.patient, true).await.unwrap();
  assert_eq!(notes.len(), 1);
  assert_eq!(notes[0].kind, NotificationKind::RideAccepted);
  assert_eq!(notes[0].ride_id, Some(ride.ride_id));

  let err = w.c.advance(&w.driver, ride.ride_id, RideStatus::Completed).await.unwrap_err();
  assert!(matches!(err, CoreError::InvalidTransition(_)));
  let stored = w.c.get_ride(&w.patient, ride.ride_id).await.unwrap();
  assert_eq!(stored.status, RideStatus::Accepted);
  assert!(stored.completed_at.is_none());
}

#[tokio::test]
async fn pending_driver_cannot_accept() {
  let w = world().await;
  let ride = w.c.create_ride(&w.patient, ride_input()).await.unwrap();

  let newbie = w.c.register(driver_account("c@example.com", "Carla")).await.unwrap();
  w.c.set_online(&newbie, true).await.unwrap();

  let err = w.c.accept(&newbie, ride.ride_id).await.unwrap_err();
  assert!(matches!(err, CoreError::NotApproved));
  assert_eq!(w.c.get_ride(&w.patient, ride.ride_id).await.unwrap(), ride);
}

#[tokio::test]
async fn concurrent_accepts_have_one_winner() {
  let w = world().await;
  let rival = ready_driver(&w.c, &w.admin, "c@example.com", "Carla").await;
  let ride = w.c.create_ride(&w.patient, ride_input()).await.unwrap();

  let (a, b) = tokio::join!(w.c.accept(&w.driver, ride.ride_id), w.c.accept(&rival, ride.ride_id));
  let winners = [a.is_ok(), b.is_ok()].into_iter().filter(|ok| *ok).count();
  assert_eq!(winners, 1);

  let loser = if a.is_ok() { b } else { a };
  assert!(matches!(loser.unwrap_err(), CoreError::InvalidTransition(_)));

  let stored = w.c.get_ride(&w.admin, ride.ride_id).await.unwrap();
  assert_eq!(stored.status, RideStatus::Accepted);
  assert!(stored.driver_id == Some(w.driver.actor_id) || stored.driver_id == Some(rival.actor_id));
}

#[tokio::test]
async fn full_trip_counts_completion_and_orders_timestamps() {
  let w = world().await;
  let ride_id = completed_ride(&w).await;

  let ride = w.c.get_ride(&w.driver, ride_id).await.unwrap();
  assert_eq!(ride.status, RideStatus::Completed);
  let (a, s, r, c) = (
    ride.accepted_at.unwrap(),
    ride.started_at.unwrap(),
    ride.arrived_at.unwrap(),
    ride.completed_at.unwrap(),
  );
  assert!(a <= s && s <= r && r <= c);

  let profile = w.c.driver_profile(&w.driver).await.unwrap();
  assert_eq!(profile.completed_ride_count, 1);

  let kinds: Vec<_> =
    w.c.notifications(&w.patient, false).await.unwrap().into_iter().map(|n| n.kind).collect();
  assert_eq!(kinds, [
    NotificationKind::RideCompleted,
    NotificationKind::DriverArrived,
    NotificationKind::TripStarted,
    NotificationKind::RideAccepted,
  ]);
}

#[tokio::test]
async fn cancelled_ride_accepts_no_further_events() {
  let w = world().await;
  let ride = w.c.create_ride(&w.patient, ride_input()).await.unwrap();
  w.c.accept(&w.driver, ride.ride_id).await.unwrap();

  let cancelled = w
    .c
    .cancel(&w.patient, ride.ride_id, Some("no longer needed".into()))
    .await
    .unwrap();
  assert_eq!(cancelled.status, RideStatus::Cancelled);
  let cancellation = cancelled.cancellation.unwrap();
  assert_eq!(cancellation.cancelled_by, w.patient.actor_id);
  assert_eq!(cancellation.reason.as_deref(), Some("no longer needed"));

  let driver_notes = w.c.notifications(&w.driver, false).await.unwrap();
  assert_eq!(driver_notes[0].kind, NotificationKind::RideCancelled);

  let rival = ready_driver(&w.c, &w.admin, "c@example.com", "Carla").await;
  let err = w.c.accept(&rival, ride.ride_id).await.unwrap_err();
  assert!(matches!(err, CoreError::InvalidTransition(_)));
  for status in [RideStatus::InProgress, RideStatus::Completed] {
    let err = w.c.advance(&w.driver, ride.ride_id, status).await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidTransition(_)));
  }
}

#[tokio::test]
async fn administrator_cancel_notifies_both_parties() {
  let w = world().await;
  let ride = w.c.create_ride(&w.patient, ride_input()).await.unwrap();
  w.c.accept(&w.driver, ride.ride_id).await.unwrap();

  w.c.cancel(&w.admin, ride.ride_id, None).await.unwrap();
  for actor in [&w.patient, &w.driver] {
    let notes = w.c.notifications(actor, true).await.unwrap();
    assert!(notes.iter().any(|n| n.kind == NotificationKind::RideCancelled));
  }
}

#[tokio::test]
async fn failed_guard_leaves_ride_untouched() {
  let w = world().await;
  let ride = w.c.create_ride(&w.patient, ride_input()).await.unwrap();

  let t = w
    .c
    .store()
    .apply_ride_event(ride.ride_id, w.patient.clone(), RideEvent::StartTrip, Utc::now())
    .await;
  assert!(t.is_err());
  assert_eq!(w.c.get_ride(&w.patient, ride.ride_id).await.unwrap(), ride);
}

#[tokio::test]
async fn ride_lists_are_role_scoped() {
  let w = world().await;
  let other_patient = w.c.register(patient_account("bia@example.com")).await.unwrap();
  let rival = ready_driver(&w.c, &w.admin, "c@example.com", "Carla").await;

  let mine = w.c.create_ride(&w.patient, ride_input()).await.unwrap();
  let theirs = w.c.create_ride(&other_patient, ride_input()).await.unwrap();
  let taken = w.c.create_ride(&other_patient, ride_input()).await.unwrap();
  w.c.accept(&rival, taken.ride_id).await.unwrap();

  let ids = |rides: Vec<Ride>| rides.into_iter().map(|r| r.ride_id).collect::<Vec<_>>();

  let patient_view = ids(w.c.list_rides(&w.patient, None).await.unwrap());
  assert_eq!(patient_view, [mine.ride_id]);

  let driver_view = ids(w.c.list_rides(&w.driver, None).await.unwrap());
  assert_eq!(driver_view.len(), 2);
  assert!(!driver_view.contains(&taken.ride_id));
  assert!(driver_view.contains(&theirs.ride_id));

  let rival_view = ids(w.c.list_rides(&rival, None).await.unwrap());
  assert!(rival_view.contains(&taken.ride_id));

  let all = w.c.list_rides(&w.admin, None).await.unwrap();
  assert_eq!(all.len(), 3);
  let accepted = w.c.list_rides(&w.admin, Some(RideStatus::Accepted)).await.unwrap();
  assert_eq!(ids(accepted), [taken.ride_id]);

  let err = w.c.get_ride(&w.driver, taken.ride_id).await.unwrap_err();
  assert!(matches!(err, CoreError::PermissionDenied));
}

// ─── Ratings ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn average_rating_across_three_rides() {
  let w = world().await;
  for score in [5, 4, 3] {
    let ride_id = completed_ride(&w).await;
    w.c
      .submit_rating(&w.patient, ride_id, NewRating { score, comment: String::new() })
      .await
      .unwrap();
  }
  let profile = w.c.driver_profile(&w.driver).await.unwrap();
  assert_eq!(profile.average_rating, Decimal::new(400, 2));
  assert_eq!(profile.average_rating.to_string(), "4.00");
  assert_eq!(profile.completed_ride_count, 3);

  let notes = w.c.notifications(&w.driver, true).await.unwrap();
  assert_eq!(notes.iter().filter(|n| n.kind == NotificationKind::RatingReceived).count(), 3);
}

#[tokio::test]
async fn average_rounds_half_up() {
  let w = world().await;
  for score in [4, 4, 5] {
    let ride_id = completed_ride(&w).await;
    w.c
      .submit_rating(&w.patient, ride_id, NewRating { score, comment: String::new() })
      .await
      .unwrap();
  }
  let profile = w.c.driver_profile(&w.driver).await.unwrap();
  assert_eq!(profile.average_rating.to_string(), "4.33");
}

#[tokio::test]
async fn second_rating_for_same_direction_is_duplicate() {
  let w = world().await;
  let ride_id = completed_ride(&w).await;

  w.c
    .submit_rating(&w.patient, ride_id, NewRating { score: 5, comment: "ótimo".into() })
    .await
    .unwrap();
  let err = w
    .c
    .submit_rating(&w.patient, ride_id, NewRating { score: 1, comment: String::new() })
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::DuplicateRating));

  // The driver rating the patient is a different direction.
  let back = w
    .c
    .submit_rating(&w.driver, ride_id, NewRating { score: 4, comment: String::new() })
    .await
    .unwrap();
  assert_eq!(back.direction, RatingDirection::DriverRatesPatient);
  assert_eq!(back.rated_id, w.patient.actor_id);

  let ratings = w.c.list_ratings(&w.patient, ride_id).await.unwrap();
  assert_eq!(ratings.len(), 2);
  let profile = w.c.driver_profile(&w.driver).await.unwrap();
  assert_eq!(profile.average_rating.to_string(), "5.00");
}

#[tokio::test]
async fn unfinished_or_foreign_rides_cannot_be_rated() {
  let w = world().await;
  let ride = w.c.create_ride(&w.patient, ride_input()).await.unwrap();
  let err = w
    .c
    .submit_rating(&w.patient, ride.ride_id, NewRating { score: 5, comment: String::new() })
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::RideNotCompleted));

  let ride_id = completed_ride(&w).await;
  let stranger = w.c.register(patient_account("x@example.com")).await.unwrap();
  let err = w
    .c
    .submit_rating(&stranger, ride_id, NewRating { score: 5, comment: String::new() })
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::PermissionDenied));
}

// ─── Notifications ───────────────────────────────────────────────────────────

#[tokio::test]
async fn mark_read_is_idempotent_and_owner_only() {
  let w = world().await;
  let n = w
    .c
    .store()
    .insert_notification(
      NewNotification::new(w.patient.actor_id, NotificationKind::System, "Olá", "Bem-vinda"),
      Utc::now(),
    )
    .await
    .unwrap();
  assert_eq!(w.c.unread_count(&w.patient).await.unwrap(), 1);

  let err = w.c.mark_read(&w.driver, n.notification_id).await.unwrap_err();
  assert!(matches!(err, CoreError::NotRecipient));

  let first = w.c.mark_read(&w.patient, n.notification_id).await.unwrap();
  assert!(first.read);
  let second = w.c.mark_read(&w.patient, n.notification_id).await.unwrap();
  assert!(second.read);
  assert_eq!(second.read_at, first.read_at);
  assert_eq!(w.c.unread_count(&w.patient).await.unwrap(), 0);

  let err = w.c.mark_read(&w.patient, Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(err, CoreError::NotFound { entity: "notification", .. }));
}

#[tokio::test]
async fn mark_all_read_reports_changes() {
  let s = store().await;
  let actor = s.register(admin_account()).await.unwrap();
  for title in ["a", "b", "c"] {
    s.insert_notification(
      NewNotification::new(actor.actor_id, NotificationKind::System, title, "body"),
      Utc::now(),
    )
    .await
    .unwrap();
  }

  let newest = s
    .list_notifications(actor.actor_id, NotificationQuery { unread_only: false, limit: Some(1) })
    .await
    .unwrap();
  assert_eq!(newest.len(), 1);
  assert_eq!(newest[0].title, "c");

  assert_eq!(s.mark_all_read(actor.actor_id, Utc::now()).await.unwrap(), 3);
  assert_eq!(s.mark_all_read(actor.actor_id, Utc::now()).await.unwrap(), 0);
  let unread = s
    .list_notifications(actor.actor_id, NotificationQuery { unread_only: true, limit: None })
    .await
    .unwrap();
  assert!(unread.is_empty());
}

// ─── Notification failures ───────────────────────────────────────────────────

/// A `SqliteStore` whose notification table refuses every insert.
struct NotificationsDown {
  inner:   SqliteStore,
  inserts: AtomicU32,
}

impl RideStore for NotificationsDown {
  type Error = CoreError;

  async fn register(&self, account: NewAccount) -> Result<Actor, CoreError> {
    self.inner.register(account).await.map_err(Into::into)
  }

  async fn get_actor(&self, actor_id: Uuid) -> Result<Option<Actor>, CoreError> {
    self.inner.get_actor(actor_id).await.map_err(Into::into)
  }

  async fn find_credentials(&self, email: &str) -> Result<Option<(Actor, String)>, CoreError> {
    self.inner.find_credentials(email).await.map_err(Into::into)
  }

  async fn create_session(
    &self,
    actor_id: Uuid,
    token_digest: String,
    expires_at: DateTime<Utc>,
  ) -> Result<(), CoreError> {
    self.inner.create_session(actor_id, token_digest, expires_at).await.map_err(Into::into)
  }

  async fn resolve_session(
    &self,
    token_digest: &str,
    now: DateTime<Utc>,
  ) -> Result<Option<Session>, CoreError> {
    self.inner.resolve_session(token_digest, now).await.map_err(Into::into)
  }

  async fn revoke_session(&self, token_digest: &str) -> Result<bool, CoreError> {
    self.inner.revoke_session(token_digest).await.map_err(Into::into)
  }

  async fn get_patient_profile(&self, actor_id: Uuid) -> Result<Option<PatientProfile>, CoreError> {
    self.inner.get_patient_profile(actor_id).await.map_err(Into::into)
  }

  async fn get_driver_profile(&self, actor_id: Uuid) -> Result<Option<DriverProfile>, CoreError> {
    self.inner.get_driver_profile(actor_id).await.map_err(Into::into)
  }

  async fn set_driver_online(
    &self,
    driver_id: Uuid,
    online: bool,
  ) -> Result<DriverProfile, CoreError> {
    self.inner.set_driver_online(driver_id, online).await.map_err(Into::into)
  }

  async fn toggle_driver_online(&self, driver_id: Uuid) -> Result<DriverProfile, CoreError> {
    self.inner.toggle_driver_online(driver_id).await.map_err(Into::into)
  }

  async fn set_driver_approval(
    &self,
    driver_id: Uuid,
    to: ApprovalState,
    note: Option<String>,
    at: DateTime<Utc>,
  ) -> Result<DriverProfile, CoreError> {
    self.inner.set_driver_approval(driver_id, to, note, at).await.map_err(Into::into)
  }

  async fn list_drivers(
    &self,
    approval_state: Option<ApprovalState>,
  ) -> Result<Vec<DriverRecord>, CoreError> {
    self.inner.list_drivers(approval_state).await.map_err(Into::into)
  }

  async fn create_ride(&self, ride: Ride) -> Result<Ride, CoreError> {
    self.inner.create_ride(ride).await.map_err(Into::into)
  }

  async fn get_ride(&self, ride_id: Uuid) -> Result<Option<Ride>, CoreError> {
    self.inner.get_ride(ride_id).await.map_err(Into::into)
  }

  async fn list_rides(&self, query: &RideQuery) -> Result<Vec<Ride>, CoreError> {
    self.inner.list_rides(query).await.map_err(Into::into)
  }

  async fn apply_ride_event(
    &self,
    ride_id: Uuid,
    actor: Actor,
    event: RideEvent,
    now: DateTime<Utc>,
  ) -> Result<Transition, CoreError> {
    self.inner.apply_ride_event(ride_id, actor, event, now).await.map_err(Into::into)
  }

  async fn submit_rating(
    &self,
    ride_id: Uuid,
    evaluator: Actor,
    input: NewRating,
    now: DateTime<Utc>,
  ) -> Result<Rating, CoreError> {
    self.inner.submit_rating(ride_id, evaluator, input, now).await.map_err(Into::into)
  }

  async fn list_ratings(&self, ride_id: Uuid) -> Result<Vec<Rating>, CoreError> {
    self.inner.list_ratings(ride_id).await.map_err(Into::into)
  }

  async fn insert_notification(
    &self,
    _input: NewNotification,
    _at: DateTime<Utc>,
  ) -> Result<Notification, CoreError> {
    self.inserts.fetch_add(1, Ordering::SeqCst);
    Err(CoreError::Store("database table is locked: notifications".into()))
  }

  async fn list_notifications(
    &self,
    recipient_id: Uuid,
    query: NotificationQuery,
  ) -> Result<Vec<Notification>, CoreError> {
    self.inner.list_notifications(recipient_id, query).await.map_err(Into::into)
  }

  async fn unread_count(&self, recipient_id: Uuid) -> Result<u64, CoreError> {
    self.inner.unread_count(recipient_id).await.map_err(Into::into)
  }

  async fn mark_notification_read(
    &self,
    notification_id: Uuid,
    reader_id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<Notification, CoreError> {
    self.inner.mark_notification_read(notification_id, reader_id, at).await.map_err(Into::into)
  }

  async fn mark_all_read(&self, recipient_id: Uuid, at: DateTime<Utc>) -> Result<u64, CoreError> {
    self.inner.mark_all_read(recipient_id, at).await.map_err(Into::into)
  }
}

#[tokio::test]
async fn failed_notification_keeps_the_transition() {
  let store = Arc::new(NotificationsDown { inner: store().await, inserts: AtomicU32::new(0) });
  let c = Coordinator::new(
    Arc::clone(&store),
    RetryPolicy { attempts: 2, backoff: Duration::from_millis(1) },
  );
  let admin = c.register(admin_account()).await.unwrap();
  let patient = c.register(patient_account("ana@example.com")).await.unwrap();
  let driver = c.register(driver_account("bruno@example.com", "Bruno Costa")).await.unwrap();

  // Approval lands even though its notification is dropped.
  let approved =
    c.set_approval(&admin, driver.actor_id, ApprovalState::Approved, None).await.unwrap();
  assert_eq!(approved.approval_state, ApprovalState::Approved);
  c.set_online(&driver, true).await.unwrap();
  let ride = c.create_ride(&patient, ride_input()).await.unwrap();

  let before = store.inserts.load(Ordering::SeqCst);
  let accepted = c.accept(&driver, ride.ride_id).await.unwrap();
  assert_eq!(accepted.status, RideStatus::Accepted);
  assert_eq!(store.inserts.load(Ordering::SeqCst) - before, 2);

  let stored = c.get_ride(&patient, ride.ride_id).await.unwrap();
  assert_eq!(stored.status, RideStatus::Accepted);
  assert_eq!(stored.driver_id, Some(driver.actor_id));
  assert!(c.notifications(&patient, false).await.unwrap().is_empty());
  assert_eq!(store.inner.unread_count(patient.actor_id).await.unwrap(), 0);
}
