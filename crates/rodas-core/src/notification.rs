//! User-facing notices produced by ride transitions and administrative
//! actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  actor::Actor,
  driver::ApprovalState,
  lifecycle::Transition,
  rating::Rating,
  ride::RideEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
  RideAccepted,
  TripStarted,
  DriverArrived,
  RideCompleted,
  RideCancelled,
  RatingReceived,
  DriverApproval,
  System,
}

impl NotificationKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::RideAccepted => "ride_accepted",
      Self::TripStarted => "trip_started",
      Self::DriverArrived => "driver_arrived",
      Self::RideCompleted => "ride_completed",
      Self::RideCancelled => "ride_cancelled",
      Self::RatingReceived => "rating_received",
      Self::DriverApproval => "driver_approval",
      Self::System => "system",
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
  pub notification_id: Uuid,
  pub recipient_id:    Uuid,
  pub kind:            NotificationKind,
  pub title:           String,
  pub body:            String,
  pub ride_id:         Option<Uuid>,
  pub read:            bool,
  pub read_at:         Option<DateTime<Utc>>,
  pub created_at:      DateTime<Utc>,
}

/// Input to [`crate::store::RideStore::insert_notification`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
  pub recipient_id: Uuid,
  pub kind:         NotificationKind,
  pub title:        String,
  pub body:         String,
  pub ride_id:      Option<Uuid>,
}

impl NewNotification {
  pub fn new(
    recipient_id: Uuid,
    kind: NotificationKind,
    title: impl Into<String>,
    body: impl Into<String>,
  ) -> Self {
    Self { recipient_id, kind, title: title.into(), body: body.into(), ride_id: None }
  }

  pub fn about_ride(mut self, ride_id: Uuid) -> Self {
    self.ride_id = Some(ride_id);
    self
  }
}

/// The notices a committed transition owes, addressed from `actor`'s point of
/// view.
pub fn for_transition(transition: &Transition, actor: &Actor) -> Vec<NewNotification> {
  let ride = &transition.ride;
  let who = actor.short_name();
  let when = ride.scheduled_for.format("%d/%m/%Y %H:%M");

  let to_patient = |kind, title: &str, body: String| {
    vec![NewNotification::new(ride.patient_id, kind, title, body).about_ride(ride.ride_id)]
  };

  match &transition.event {
    RideEvent::Accept => to_patient(
      NotificationKind::RideAccepted,
      "Ride accepted",
      format!("{who} accepted your ride scheduled for {when}."),
    ),
    RideEvent::StartTrip => to_patient(
      NotificationKind::TripStarted,
      "Trip started",
      format!("{who} is on the way to {}.", ride.origin.address),
    ),
    RideEvent::MarkArrived => to_patient(
      NotificationKind::DriverArrived,
      "Driver arrived",
      format!("{who} has arrived at {}.", ride.destination.address),
    ),
    RideEvent::Complete => to_patient(
      NotificationKind::RideCompleted,
      "Trip completed",
      format!("Your trip to {} is complete. You can now rate it.", ride.destination.address),
    ),
    RideEvent::Cancel { reason } => {
      let reason = reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(|r| format!(" Reason: {r}"))
        .unwrap_or_default();
      let body = format!("The ride scheduled for {when} was cancelled by {who}.{reason}");

      // Everyone involved except the canceller.
      [Some(ride.patient_id), transition.from_driver]
        .into_iter()
        .flatten()
        .filter(|id| *id != actor.actor_id)
        .map(|id| {
          NewNotification::new(id, NotificationKind::RideCancelled, "Ride cancelled", body.clone())
            .about_ride(ride.ride_id)
        })
        .collect()
    }
  }
}

pub fn for_rating(rating: &Rating) -> NewNotification {
  NewNotification::new(
    rating.rated_id,
    NotificationKind::RatingReceived,
    "New rating",
    format!("You received a rating of {} out of 5.", rating.score),
  )
  .about_ride(rating.ride_id)
}

pub fn for_approval(driver_id: Uuid, state: ApprovalState) -> NewNotification {
  let body = match state {
    ApprovalState::Approved => "Your registration was approved. Go online to start accepting rides.",
    ApprovalState::Rejected => "Your registration was not approved.",
    ApprovalState::Suspended => "Your account was suspended. Contact the coordination team.",
    ApprovalState::Pending => "Your registration is under review.",
  };
  NewNotification::new(driver_id, NotificationKind::DriverApproval, "Registration status", body)
}
