//! Use-case layer: one method per user-facing operation.
//!
//! Every method takes the acting [`Actor`] explicitly, checks the role rules
//! that don't depend on stored state, hands the guarded mutation to the store
//! and then dispatches notifications for whatever committed.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::{
  Error, Result,
  actor::{Actor, NewAccount, Profile, Role},
  dispatch::{Dispatcher, RetryPolicy},
  driver::{ApprovalState, DriverProfile, DriverRecord},
  notification::{self, Notification},
  policy::{RideAction, can_act_on_ride, can_create_ride},
  rating::{NewRating, Rating},
  ride::{NewRide, Ride, RideEvent, RideQuery, RideStatus},
  store::{NotificationQuery, RideStore},
};

/// Lift a backend error into the domain taxonomy.
fn store_err<E: Into<Error>>(e: E) -> Error { e.into() }

pub struct Coordinator<S> {
  store:      Arc<S>,
  dispatcher: Dispatcher<S>,
}

impl<S> Clone for Coordinator<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), dispatcher: self.dispatcher.clone() }
  }
}

impl<S: RideStore> Coordinator<S> {
  pub fn new(store: Arc<S>, retry: RetryPolicy) -> Self {
    let dispatcher = Dispatcher::new(Arc::clone(&store), retry);
    Self { store, dispatcher }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn dispatcher(&self) -> &Dispatcher<S> { &self.dispatcher }

  // ── Accounts ──────────────────────────────────────────────────────────

  /// Validate and persist a new account. The password hash is computed by
  /// the caller.
  pub async fn register(&self, account: NewAccount) -> Result<Actor> {
    let account = account.normalized()?;
    let actor = self.store.register(account).await.map_err(store_err)?;
    info!(actor = %actor.actor_id, role = actor.role.as_str(), "account registered");
    Ok(actor)
  }

  /// The actor's role-specific profile.
  pub async fn profile(&self, actor: &Actor) -> Result<Profile> {
    match actor.role {
      Role::Patient => self
        .store
        .get_patient_profile(actor.actor_id)
        .await
        .map_err(store_err)?
        .map(Profile::Patient)
        .ok_or_else(|| Error::actor_not_found(actor.actor_id)),
      Role::Driver => self.driver_profile(actor).await.map(Profile::Driver),
      Role::Administrator => Ok(Profile::Administrator),
    }
  }

  // ── Drivers ───────────────────────────────────────────────────────────

  pub async fn driver_profile(&self, actor: &Actor) -> Result<DriverProfile> {
    require_role(actor, Role::Driver)?;
    self
      .store
      .get_driver_profile(actor.actor_id)
      .await
      .map_err(store_err)?
      .ok_or_else(|| Error::driver_not_found(actor.actor_id))
  }

  /// Set the driver's own online flag. Approval is not checked here; it is
  /// checked when a ride is accepted.
  pub async fn set_online(&self, actor: &Actor, online: bool) -> Result<DriverProfile> {
    require_role(actor, Role::Driver)?;
    let profile =
      self.store.set_driver_online(actor.actor_id, online).await.map_err(store_err)?;
    info!(driver = %actor.actor_id, online, "driver availability changed");
    Ok(profile)
  }

  pub async fn toggle_online(&self, actor: &Actor) -> Result<DriverProfile> {
    require_role(actor, Role::Driver)?;
    let profile = self.store.toggle_driver_online(actor.actor_id).await.map_err(store_err)?;
    info!(driver = %actor.actor_id, online = profile.online, "driver availability changed");
    Ok(profile)
  }

  pub async fn set_approval(
    &self,
    admin: &Actor,
    driver_id: Uuid,
    to: ApprovalState,
    note: Option<String>,
  ) -> Result<DriverProfile> {
    require_role(admin, Role::Administrator)?;
    let profile = self
      .store
      .set_driver_approval(driver_id, to, note, Utc::now())
      .await
      .map_err(store_err)?;
    info!(driver = %driver_id, admin = %admin.actor_id, state = to.as_str(), "driver approval changed");
    self.dispatcher.notify(notification::for_approval(driver_id, to)).await;
    Ok(profile)
  }

  pub async fn list_drivers(
    &self,
    admin: &Actor,
    approval_state: Option<ApprovalState>,
  ) -> Result<Vec<DriverRecord>> {
    require_role(admin, Role::Administrator)?;
    self.store.list_drivers(approval_state).await.map_err(store_err)
  }

  // ── Rides ─────────────────────────────────────────────────────────────

  pub async fn create_ride(&self, actor: &Actor, input: NewRide) -> Result<Ride> {
    can_create_ride(actor).require()?;
    let wheelchair = self
      .store
      .get_patient_profile(actor.actor_id)
      .await
      .map_err(store_err)?
      .is_some_and(|p| p.needs_wheelchair);
    let ride = Ride::new(actor.actor_id, input, wheelchair, Utc::now())?;
    let ride = self.store.create_ride(ride).await.map_err(store_err)?;
    info!(ride = %ride.ride_id, patient = %actor.actor_id, "ride requested");
    Ok(ride)
  }

  pub async fn get_ride(&self, actor: &Actor, ride_id: Uuid) -> Result<Ride> {
    let ride = self
      .store
      .get_ride(ride_id)
      .await
      .map_err(store_err)?
      .ok_or_else(|| Error::ride_not_found(ride_id))?;
    can_act_on_ride(actor, &ride, RideAction::View).require()?;
    Ok(ride)
  }

  /// Rides visible to `actor`. The status filter applies to every role.
  pub async fn list_rides(&self, actor: &Actor, status: Option<RideStatus>) -> Result<Vec<Ride>> {
    if !actor.active {
      return Err(Error::PermissionDenied);
    }
    let query = match actor.role {
      Role::Patient => RideQuery { patient_id: Some(actor.actor_id), status, ..Default::default() },
      Role::Driver => RideQuery {
        driver_id: Some(actor.actor_id),
        include_unassigned: true,
        status,
        ..Default::default()
      },
      Role::Administrator => RideQuery { status, ..Default::default() },
    };
    self.store.list_rides(&query).await.map_err(store_err)
  }

  /// Apply a lifecycle event and notify whoever it concerns.
  pub async fn apply_event(&self, actor: &Actor, ride_id: Uuid, event: RideEvent) -> Result<Ride> {
    let name = event.name();
    let transition = self
      .store
      .apply_ride_event(ride_id, actor.clone(), event, Utc::now())
      .await
      .map_err(store_err)?;
    info!(
      ride = %ride_id,
      actor = %actor.actor_id,
      event = name,
      from = transition.from.as_str(),
      to = transition.to().as_str(),
      "ride transition committed"
    );
    self.dispatcher.notify_all(notification::for_transition(&transition, actor)).await;
    Ok(transition.ride)
  }

  pub async fn accept(&self, driver: &Actor, ride_id: Uuid) -> Result<Ride> {
    self.apply_event(driver, ride_id, RideEvent::Accept).await
  }

  /// Move an accepted ride forward to `status` (`in_progress`,
  /// `driver_arrived` or `completed`).
  pub async fn advance(&self, driver: &Actor, ride_id: Uuid, status: RideStatus) -> Result<Ride> {
    let event = RideEvent::from_target_status(status)?;
    self.apply_event(driver, ride_id, event).await
  }

  pub async fn cancel(&self, actor: &Actor, ride_id: Uuid, reason: Option<String>) -> Result<Ride> {
    self.apply_event(actor, ride_id, RideEvent::Cancel { reason }).await
  }

  // ── Ratings ───────────────────────────────────────────────────────────

  pub async fn submit_rating(
    &self,
    evaluator: &Actor,
    ride_id: Uuid,
    input: NewRating,
  ) -> Result<Rating> {
    let rating = self
      .store
      .submit_rating(ride_id, evaluator.clone(), input, Utc::now())
      .await
      .map_err(store_err)?;
    info!(
      ride = %ride_id,
      evaluator = %evaluator.actor_id,
      direction = rating.direction.as_str(),
      score = rating.score,
      "rating recorded"
    );
    self.dispatcher.notify(notification::for_rating(&rating)).await;
    Ok(rating)
  }

  pub async fn list_ratings(&self, actor: &Actor, ride_id: Uuid) -> Result<Vec<Rating>> {
    self.get_ride(actor, ride_id).await?;
    self.store.list_ratings(ride_id).await.map_err(store_err)
  }

  // ── Notifications ─────────────────────────────────────────────────────

  pub async fn notifications(&self, actor: &Actor, unread_only: bool) -> Result<Vec<Notification>> {
    self
      .store
      .list_notifications(actor.actor_id, NotificationQuery { unread_only, limit: Some(100) })
      .await
      .map_err(store_err)
  }

  pub async fn unread_count(&self, actor: &Actor) -> Result<u64> {
    self.store.unread_count(actor.actor_id).await.map_err(store_err)
  }

  pub async fn mark_read(&self, actor: &Actor, notification_id: Uuid) -> Result<Notification> {
    self
      .store
      .mark_notification_read(notification_id, actor.actor_id, Utc::now())
      .await
      .map_err(store_err)
  }

  pub async fn mark_all_read(&self, actor: &Actor) -> Result<u64> {
    self.store.mark_all_read(actor.actor_id, Utc::now()).await.map_err(store_err)
  }
}

fn require_role(actor: &Actor, role: Role) -> Result<()> {
  if actor.active && actor.role == role { Ok(()) } else { Err(Error::PermissionDenied) }
}
