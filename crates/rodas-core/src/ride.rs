//! The ride aggregate.
//!
//! A ride is created by a patient in [`RideStatus::Pending`] and is never
//! deleted. Status and lifecycle timestamps only change through
//! [`crate::lifecycle::apply`].

use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
  Pending,
  Accepted,
  InProgress,
  DriverArrived,
  Completed,
  Cancelled,
}

impl RideStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Accepted => "accepted",
      Self::InProgress => "in_progress",
      Self::DriverArrived => "driver_arrived",
      Self::Completed => "completed",
      Self::Cancelled => "cancelled",
    }
  }

  /// States from which a ride may still be cancelled.
  pub fn is_cancellable(self) -> bool {
    matches!(self, Self::Pending | Self::Accepted | Self::InProgress)
  }

  pub fn is_terminal(self) -> bool { matches!(self, Self::Completed | Self::Cancelled) }
}

impl fmt::Display for RideStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for RideStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "pending" => Ok(Self::Pending),
      "accepted" => Ok(Self::Accepted),
      "in_progress" => Ok(Self::InProgress),
      "driver_arrived" => Ok(Self::DriverArrived),
      "completed" => Ok(Self::Completed),
      "cancelled" => Ok(Self::Cancelled),
      other => Err(Error::validation("status", format!("unknown ride status {other:?}"))),
    }
  }
}

// ─── Places ──────────────────────────────────────────────────────────────────

/// An address with an optional coordinate pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
  pub address:   String,
  #[serde(default)]
  pub latitude:  Option<f64>,
  #[serde(default)]
  pub longitude: Option<f64>,
}

impl Place {
  pub fn address(address: impl Into<String>) -> Self {
    Self { address: address.into(), latitude: None, longitude: None }
  }

  fn validate(&self, field: &'static str) -> Result<()> {
    if self.address.trim().is_empty() {
      return Err(Error::validation(field, "address must not be empty"));
    }
    match (self.latitude, self.longitude) {
      (None, None) => Ok(()),
      (Some(lat), Some(lon)) => {
        if !(-90.0..=90.0).contains(&lat) {
          Err(Error::validation(field, "latitude must be between -90 and 90"))
        } else if !(-180.0..=180.0).contains(&lon) {
          Err(Error::validation(field, "longitude must be between -180 and 180"))
        } else {
          Ok(())
        }
      }
      _ => Err(Error::validation(field, "latitude and longitude must be given together")),
    }
  }
}

// ─── Ride ────────────────────────────────────────────────────────────────────

/// Who cancelled a ride, when, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
  pub cancelled_by: Uuid,
  pub cancelled_at: DateTime<Utc>,
  pub reason:       Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ride {
  pub ride_id:          Uuid,
  pub patient_id:       Uuid,
  pub driver_id:        Option<Uuid>,
  pub origin:           Place,
  pub destination:      Place,
  /// Wall-clock pickup time as entered by the patient.
  pub scheduled_for:    NaiveDateTime,
  pub passenger_count:  u32,
  pub has_companion:    bool,
  pub needs_wheelchair: bool,
  pub notes:            String,
  pub status:           RideStatus,
  pub accepted_at:      Option<DateTime<Utc>>,
  pub started_at:       Option<DateTime<Utc>>,
  pub arrived_at:       Option<DateTime<Utc>>,
  pub completed_at:     Option<DateTime<Utc>>,
  pub cancellation:     Option<Cancellation>,
  pub created_at:       DateTime<Utc>,
  pub updated_at:       DateTime<Utc>,
}

impl Ride {
  /// Build a pending ride for `patient_id` from validated input.
  pub fn new(
    patient_id: Uuid,
    input: NewRide,
    default_wheelchair: bool,
    at: DateTime<Utc>,
  ) -> Result<Self> {
    input.validate()?;
    Ok(Self {
      ride_id: Uuid::new_v4(),
      patient_id,
      driver_id: None,
      origin: input.origin,
      destination: input.destination,
      scheduled_for: input.scheduled_for,
      passenger_count: input.passenger_count,
      has_companion: input.has_companion,
      needs_wheelchair: input.needs_wheelchair.unwrap_or(default_wheelchair),
      notes: input.notes.trim().to_owned(),
      status: RideStatus::Pending,
      accepted_at: None,
      started_at: None,
      arrived_at: None,
      completed_at: None,
      cancellation: None,
      created_at: at,
      updated_at: at,
    })
  }

  pub fn is_assigned_to(&self, driver_id: Uuid) -> bool { self.driver_id == Some(driver_id) }

  /// The latest lifecycle timestamp recorded so far.
  pub fn last_transition_at(&self) -> DateTime<Utc> {
    [self.accepted_at, self.started_at, self.arrived_at, self.completed_at]
      .into_iter()
      .flatten()
      .chain(self.cancellation.as_ref().map(|c| c.cancelled_at))
      .fold(self.created_at, std::cmp::max)
  }
}

/// Input to ride creation.
#[derive(Debug, Clone, Deserialize)]
pub struct NewRide {
  pub origin:           Place,
  pub destination:      Place,
  pub scheduled_for:    NaiveDateTime,
  #[serde(default = "one")]
  pub passenger_count:  u32,
  #[serde(default)]
  pub has_companion:    bool,
  /// Falls back to the patient profile when omitted.
  #[serde(default)]
  pub needs_wheelchair: Option<bool>,
  #[serde(default)]
  pub notes:            String,
}

fn one() -> u32 { 1 }

impl NewRide {
  pub fn validate(&self) -> Result<()> {
    self.origin.validate("origin")?;
    self.destination.validate("destination")?;
    if self.passenger_count == 0 {
      return Err(Error::validation("passenger_count", "at least one passenger is required"));
    }
    Ok(())
  }
}

// ─── Events ──────────────────────────────────────────────────────────────────

/// An actor-initiated request to move a ride along its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RideEvent {
  Accept,
  StartTrip,
  MarkArrived,
  Complete,
  Cancel { reason: Option<String> },
}

impl RideEvent {
  /// Map a driver's `{"status": ...}` update onto the event that produces it.
  pub fn from_target_status(status: RideStatus) -> Result<Self> {
    match status {
      RideStatus::InProgress => Ok(Self::StartTrip),
      RideStatus::DriverArrived => Ok(Self::MarkArrived),
      RideStatus::Completed => Ok(Self::Complete),
      other => Err(Error::validation(
        "status",
        format!("{other} cannot be set through a status update"),
      )),
    }
  }

  pub fn name(&self) -> &'static str {
    match self {
      Self::Accept => "accept",
      Self::StartTrip => "start_trip",
      Self::MarkArrived => "mark_arrived",
      Self::Complete => "complete",
      Self::Cancel { .. } => "cancel",
    }
  }
}

// ─── Queries ─────────────────────────────────────────────────────────────────

/// Parameters for [`crate::store::RideStore::list_rides`].
#[derive(Debug, Clone, Default)]
pub struct RideQuery {
  pub patient_id:         Option<Uuid>,
  /// Rides assigned to this driver.
  pub driver_id:          Option<Uuid>,
  /// Also include pending rides with no driver (OR-ed with `driver_id`).
  pub include_unassigned: bool,
  pub status:             Option<RideStatus>,
  pub limit:              Option<usize>,
}
