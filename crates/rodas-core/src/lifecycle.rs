//! The ride state machine.
//!
//! ```text
//! Pending ──accept──▶ Accepted ──start──▶ InProgress ──arrive──▶ DriverArrived ──complete──▶ Completed
//!    │                   │                    │
//!    └───────────────────┴────────cancel──────┴──▶ Cancelled
//! ```
//!
//! [`apply`] is pure: it checks every guard against the values handed in and
//! returns the next ride without touching storage. Stores run it inside a
//! transaction and commit the result with a compare-and-set on the
//! [`Transition::from`] state, so a ride whose stored state moved underneath
//! is never overwritten.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Error, Result,
  actor::Actor,
  driver::{ApprovalState, DriverProfile},
  policy::{RideAction, can_act_on_ride},
  ride::{Cancellation, Ride, RideEvent, RideStatus},
};

/// The outcome of a successful guard check.
#[derive(Debug, Clone)]
pub struct Transition {
  pub event:       RideEvent,
  pub actor_id:    Uuid,
  /// Status the stored ride must still have for the write to apply.
  pub from:        RideStatus,
  /// Driver the stored ride must still have for the write to apply.
  pub from_driver: Option<Uuid>,
  pub ride:        Ride,
}

impl Transition {
  pub fn to(&self) -> RideStatus { self.ride.status }

  /// Whether committing this transition finishes a trip for the driver.
  pub fn completes_trip(&self) -> bool { self.ride.status == RideStatus::Completed }
}

/// Check `event` against `ride` on behalf of `actor` and compute the next ride.
///
/// `driver` must be the acting driver's own profile for [`RideEvent::Accept`];
/// it is ignored for every other event.
pub fn apply(
  ride: &Ride,
  actor: &Actor,
  event: &RideEvent,
  driver: Option<&DriverProfile>,
  now: DateTime<Utc>,
) -> Result<Transition> {
  let action = match event {
    RideEvent::Accept => RideAction::Accept,
    RideEvent::Cancel { .. } => RideAction::Cancel,
    _ => RideAction::AdvanceStatus,
  };
  can_act_on_ride(actor, ride, action).require()?;

  // Lifecycle timestamps never go backwards, even if the clock does.
  let at = now.max(ride.last_transition_at());
  let mut next = ride.clone();
  next.updated_at = at;

  match event {
    RideEvent::Accept => {
      if ride.status != RideStatus::Pending || ride.driver_id.is_some() {
        return Err(Error::invalid_transition(format!(
          "ride must be pending and unassigned to be accepted (it is {})",
          ride.status
        )));
      }
      let profile = driver
        .filter(|p| p.actor_id == actor.actor_id)
        .ok_or_else(|| Error::driver_not_found(actor.actor_id))?;
      if profile.approval_state != ApprovalState::Approved {
        return Err(Error::NotApproved);
      }
      if !profile.is_eligible_to_accept() {
        return Err(Error::invalid_transition("driver must be online to accept rides"));
      }
      next.status = RideStatus::Accepted;
      next.driver_id = Some(actor.actor_id);
      next.accepted_at = Some(at);
    }
    RideEvent::StartTrip => {
      expect_status(ride, RideStatus::Accepted, "started")?;
      next.status = RideStatus::InProgress;
      next.started_at = Some(at);
    }
    RideEvent::MarkArrived => {
      expect_status(ride, RideStatus::InProgress, "marked as arrived")?;
      next.status = RideStatus::DriverArrived;
      next.arrived_at = Some(at);
    }
    RideEvent::Complete => {
      expect_status(ride, RideStatus::DriverArrived, "completed")?;
      next.status = RideStatus::Completed;
      next.completed_at = Some(at);
    }
    RideEvent::Cancel { reason } => {
      if !ride.status.is_cancellable() {
        return Err(Error::invalid_transition(format!(
          "ride must be pending, accepted or in progress to be cancelled (it is {})",
          ride.status
        )));
      }
      next.status = RideStatus::Cancelled;
      next.cancellation = Some(Cancellation {
        cancelled_by: actor.actor_id,
        cancelled_at: at,
        reason:       reason
          .as_deref()
          .map(str::trim)
          .filter(|r| !r.is_empty())
          .map(str::to_owned),
      });
    }
  }

  Ok(Transition {
    event: event.clone(),
    actor_id: actor.actor_id,
    from: ride.status,
    from_driver: ride.driver_id,
    ride: next,
  })
}

fn expect_status(ride: &Ride, expected: RideStatus, verb: &str) -> Result<()> {
  if ride.status == expected {
    Ok(())
  } else {
    Err(Error::invalid_transition(format!(
      "ride must be {expected} to be {verb} (it is {})",
      ride.status
    )))
  }
}
