//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Instants are stored as fixed-width RFC 3339 UTC strings (nanosecond
//! precision, `Z` suffix) so that string order is time order. Enums are
//! stored by their `as_str` names. UUIDs are hyphenated lowercase strings.
//! Rating averages are decimal strings.

use std::str::FromStr as _;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use rodas_core::{
  actor::{Actor, PatientProfile, Role},
  driver::{ApprovalState, DriverProfile, Licence, Vehicle},
  notification::{Notification, NotificationKind},
  rating::{Rating, RatingDirection},
  ride::{Cancellation, Place, Ride, RideStatus},
};
use rust_decimal::Decimal;
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn decode_opt_uuid(s: Option<&str>) -> Result<Option<Uuid>> {
  s.map(decode_uuid).transpose()
}

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Nanos, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_opt_dt(dt: Option<DateTime<Utc>>) -> Option<String> { dt.map(encode_dt) }

pub fn decode_opt_dt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

const WALL_CLOCK: &str = "%Y-%m-%dT%H:%M:%S";

pub fn encode_wall_clock(dt: NaiveDateTime) -> String { dt.format(WALL_CLOCK).to_string() }

pub fn decode_wall_clock(s: &str) -> Result<NaiveDateTime> {
  NaiveDateTime::parse_from_str(s, WALL_CLOCK).map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

pub fn decode_decimal(s: &str) -> Result<Decimal> { Ok(Decimal::from_str(s)?) }

// ─── Enums ───────────────────────────────────────────────────────────────────

/// Find the variant of `all` whose stored name is `value`.
fn decode_variant<T: Copy>(
  column: &'static str,
  value: &str,
  all: &[T],
  name: fn(T) -> &'static str,
) -> Result<T> {
  all.iter().copied().find(|v| name(*v) == value).ok_or_else(|| Error::UnknownVariant {
    column,
    value: value.to_owned(),
  })
}

pub fn decode_role(s: &str) -> Result<Role> {
  decode_variant("role", s, &[Role::Patient, Role::Driver, Role::Administrator], Role::as_str)
}

pub fn decode_approval_state(s: &str) -> Result<ApprovalState> {
  use ApprovalState::*;
  decode_variant("approval_state", s, &[Pending, Approved, Rejected, Suspended], ApprovalState::as_str)
}

pub fn decode_ride_status(s: &str) -> Result<RideStatus> {
  use RideStatus::*;
  decode_variant(
    "status",
    s,
    &[Pending, Accepted, InProgress, DriverArrived, Completed, Cancelled],
    RideStatus::as_str,
  )
}

pub fn decode_direction(s: &str) -> Result<RatingDirection> {
  decode_variant(
    "direction",
    s,
    &[RatingDirection::PatientRatesDriver, RatingDirection::DriverRatesPatient],
    RatingDirection::as_str,
  )
}

pub fn decode_notification_kind(s: &str) -> Result<NotificationKind> {
  use NotificationKind::*;
  decode_variant(
    "kind",
    s,
    &[
      RideAccepted,
      TripStarted,
      DriverArrived,
      RideCompleted,
      RideCancelled,
      RatingReceived,
      DriverApproval,
      System,
    ],
    NotificationKind::as_str,
  )
}

// ─── Row types ───────────────────────────────────────────────────────────────
//
// Each `COLUMNS` constant lists the select order its `read` expects.

pub const ACTOR_COLUMNS: &str = "actor_id, email, display_name, role, active, created_at";

/// Raw strings read directly from an `actors` row.
pub struct RawActor {
  pub actor_id:     String,
  pub email:        String,
  pub display_name: String,
  pub role:         String,
  pub active:       bool,
  pub created_at:   String,
}

impl RawActor {
  /// Read the actor columns starting at column `base`.
  pub fn read(row: &Row<'_>, base: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      actor_id:     row.get(base)?,
      email:        row.get(base + 1)?,
      display_name: row.get(base + 2)?,
      role:         row.get(base + 3)?,
      active:       row.get(base + 4)?,
      created_at:   row.get(base + 5)?,
    })
  }

  pub fn into_actor(self) -> Result<Actor> {
    Ok(Actor {
      actor_id:     decode_uuid(&self.actor_id)?,
      email:        self.email,
      display_name: self.display_name,
      role:         decode_role(&self.role)?,
      active:       self.active,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

pub const PATIENT_COLUMNS: &str = "actor_id, guardian_name, guardian_cpf, guardian_phone, \
                                   needs_wheelchair, immunosuppressed, medical_notes, \
                                   terms_accepted_at";

pub struct RawPatientProfile {
  pub actor_id:          String,
  pub guardian_name:     String,
  pub guardian_cpf:      String,
  pub guardian_phone:    String,
  pub needs_wheelchair:  bool,
  pub immunosuppressed:  bool,
  pub medical_notes:     String,
  pub terms_accepted_at: String,
}

impl RawPatientProfile {
  pub fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      actor_id:          row.get(0)?,
      guardian_name:     row.get(1)?,
      guardian_cpf:      row.get(2)?,
      guardian_phone:    row.get(3)?,
      needs_wheelchair:  row.get(4)?,
      immunosuppressed:  row.get(5)?,
      medical_notes:     row.get(6)?,
      terms_accepted_at: row.get(7)?,
    })
  }

  pub fn into_profile(self) -> Result<PatientProfile> {
    Ok(PatientProfile {
      actor_id:          decode_uuid(&self.actor_id)?,
      guardian_name:     self.guardian_name,
      guardian_cpf:      self.guardian_cpf,
      guardian_phone:    self.guardian_phone,
      needs_wheelchair:  self.needs_wheelchair,
      immunosuppressed:  self.immunosuppressed,
      medical_notes:     self.medical_notes,
      terms_accepted_at: decode_dt(&self.terms_accepted_at)?,
    })
  }
}

/// Driver profile columns, qualified with `d.` so they can be joined.
pub const DRIVER_COLUMNS: &str = "d.actor_id, d.vehicle_make, d.vehicle_model, d.vehicle_color, \
                                  d.vehicle_year, d.vehicle_plate, d.licence_number, \
                                  d.licence_expires, d.approval_state, d.online, \
                                  d.average_rating, d.completed_ride_count, d.approved_at, \
                                  d.admin_notes, d.terms_accepted_at";

/// Number of columns in [`DRIVER_COLUMNS`].
pub const DRIVER_COLUMN_COUNT: usize = 15;

pub struct RawDriverProfile {
  pub actor_id:             String,
  pub vehicle_make:         String,
  pub vehicle_model:        String,
  pub vehicle_color:        String,
  pub vehicle_year:         Option<i32>,
  pub vehicle_plate:        Option<String>,
  pub licence_number:       Option<String>,
  pub licence_expires:      Option<String>,
  pub approval_state:       String,
  pub online:               bool,
  pub average_rating:       String,
  pub completed_ride_count: u32,
  pub approved_at:          Option<String>,
  pub admin_notes:          String,
  pub terms_accepted_at:    String,
}

impl RawDriverProfile {
  pub fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      actor_id:             row.get(0)?,
      vehicle_make:         row.get(1)?,
      vehicle_model:        row.get(2)?,
      vehicle_color:        row.get(3)?,
      vehicle_year:         row.get(4)?,
      vehicle_plate:        row.get(5)?,
      licence_number:       row.get(6)?,
      licence_expires:      row.get(7)?,
      approval_state:       row.get(8)?,
      online:               row.get(9)?,
      average_rating:       row.get(10)?,
      completed_ride_count: row.get(11)?,
      approved_at:          row.get(12)?,
      admin_notes:          row.get(13)?,
      terms_accepted_at:    row.get(14)?,
    })
  }

  pub fn into_profile(self) -> Result<DriverProfile> {
    Ok(DriverProfile {
      actor_id:             decode_uuid(&self.actor_id)?,
      vehicle:              Vehicle {
        make:  self.vehicle_make,
        model: self.vehicle_model,
        color: self.vehicle_color,
        year:  self.vehicle_year,
        plate: self.vehicle_plate,
      },
      licence:              Licence {
        number:     self.licence_number,
        expires_on: self.licence_expires.as_deref().map(decode_date).transpose()?,
      },
      approval_state:       decode_approval_state(&self.approval_state)?,
      online:               self.online,
      average_rating:       decode_decimal(&self.average_rating)?,
      completed_ride_count: self.completed_ride_count,
      approved_at:          decode_opt_dt(self.approved_at.as_deref())?,
      admin_notes:          self.admin_notes,
      terms_accepted_at:    decode_dt(&self.terms_accepted_at)?,
    })
  }
}

pub const RIDE_COLUMNS: &str = "ride_id, patient_id, driver_id, origin_address, origin_lat, \
                                origin_lon, dest_address, dest_lat, dest_lon, scheduled_for, \
                                passenger_count, has_companion, needs_wheelchair, notes, status, \
                                accepted_at, started_at, arrived_at, completed_at, cancelled_by, \
                                cancelled_at, cancel_reason, created_at, updated_at";

pub struct RawRide {
  pub ride_id:          String,
  pub patient_id:       String,
  pub driver_id:        Option<String>,
  pub origin_address:   String,
  pub origin_lat:       Option<f64>,
  pub origin_lon:       Option<f64>,
  pub dest_address:     String,
  pub dest_lat:         Option<f64>,
  pub dest_lon:         Option<f64>,
  pub scheduled_for:    String,
  pub passenger_count:  u32,
  pub has_companion:    bool,
  pub needs_wheelchair: bool,
  pub notes:            String,
  pub status:           String,
  pub accepted_at:      Option<String>,
  pub started_at:       Option<String>,
  pub arrived_at:       Option<String>,
  pub completed_at:     Option<String>,
  pub cancelled_by:     Option<String>,
  pub cancelled_at:     Option<String>,
  pub cancel_reason:    Option<String>,
  pub created_at:       String,
  pub updated_at:       String,
}

impl RawRide {
  pub fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      ride_id:          row.get(0)?,
      patient_id:       row.get(1)?,
      driver_id:        row.get(2)?,
      origin_address:   row.get(3)?,
      origin_lat:       row.get(4)?,
      origin_lon:       row.get(5)?,
      dest_address:     row.get(6)?,
      dest_lat:         row.get(7)?,
      dest_lon:         row.get(8)?,
      scheduled_for:    row.get(9)?,
      passenger_count:  row.get(10)?,
      has_companion:    row.get(11)?,
      needs_wheelchair: row.get(12)?,
      notes:            row.get(13)?,
      status:           row.get(14)?,
      accepted_at:      row.get(15)?,
      started_at:       row.get(16)?,
      arrived_at:       row.get(17)?,
      completed_at:     row.get(18)?,
      cancelled_by:     row.get(19)?,
      cancelled_at:     row.get(20)?,
      cancel_reason:    row.get(21)?,
      created_at:       row.get(22)?,
      updated_at:       row.get(23)?,
    })
  }

  pub fn into_ride(self) -> Result<Ride> {
    let cancellation = match (self.cancelled_by, self.cancelled_at) {
      (Some(by), Some(at)) => Some(Cancellation {
        cancelled_by: decode_uuid(&by)?,
        cancelled_at: decode_dt(&at)?,
        reason:       self.cancel_reason,
      }),
      _ => None,
    };

    Ok(Ride {
      ride_id: decode_uuid(&self.ride_id)?,
      patient_id: decode_uuid(&self.patient_id)?,
      driver_id: decode_opt_uuid(self.driver_id.as_deref())?,
      origin: Place {
        address:   self.origin_address,
        latitude:  self.origin_lat,
        longitude: self.origin_lon,
      },
      destination: Place {
        address:   self.dest_address,
        latitude:  self.dest_lat,
        longitude: self.dest_lon,
      },
      scheduled_for: decode_wall_clock(&self.scheduled_for)?,
      passenger_count: self.passenger_count,
      has_companion: self.has_companion,
      needs_wheelchair: self.needs_wheelchair,
      notes: self.notes,
      status: decode_ride_status(&self.status)?,
      accepted_at: decode_opt_dt(self.accepted_at.as_deref())?,
      started_at: decode_opt_dt(self.started_at.as_deref())?,
      arrived_at: decode_opt_dt(self.arrived_at.as_deref())?,
      completed_at: decode_opt_dt(self.completed_at.as_deref())?,
      cancellation,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

pub const RATING_COLUMNS: &str =
  "rating_id, ride_id, evaluator_id, rated_id, direction, score, comment, created_at";

pub struct RawRating {
  pub rating_id:    String,
  pub ride_id:      String,
  pub evaluator_id: String,
  pub rated_id:     String,
  pub direction:    String,
  pub score:        u8,
  pub comment:      String,
  pub created_at:   String,
}

impl RawRating {
  pub fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      rating_id:    row.get(0)?,
      ride_id:      row.get(1)?,
      evaluator_id: row.get(2)?,
      rated_id:     row.get(3)?,
      direction:    row.get(4)?,
      score:        row.get(5)?,
      comment:      row.get(6)?,
      created_at:   row.get(7)?,
    })
  }

  pub fn into_rating(self) -> Result<Rating> {
    Ok(Rating {
      rating_id:    decode_uuid(&self.rating_id)?,
      ride_id:      decode_uuid(&self.ride_id)?,
      evaluator_id: decode_uuid(&self.evaluator_id)?,
      rated_id:     decode_uuid(&self.rated_id)?,
      direction:    decode_direction(&self.direction)?,
      score:        self.score,
      comment:      self.comment,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

pub const NOTIFICATION_COLUMNS: &str =
  "notification_id, recipient_id, kind, title, body, ride_id, read, read_at, created_at";

pub struct RawNotification {
  pub notification_id: String,
  pub recipient_id:    String,
  pub kind:            String,
  pub title:           String,
  pub body:            String,
  pub ride_id:         Option<String>,
  pub read:            bool,
  pub read_at:         Option<String>,
  pub created_at:      String,
}

impl RawNotification {
  pub fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      notification_id: row.get(0)?,
      recipient_id:    row.get(1)?,
      kind:            row.get(2)?,
      title:           row.get(3)?,
      body:            row.get(4)?,
      ride_id:         row.get(5)?,
      read:            row.get(6)?,
      read_at:         row.get(7)?,
      created_at:      row.get(8)?,
    })
  }

  pub fn into_notification(self) -> Result<Notification> {
    Ok(Notification {
      notification_id: decode_uuid(&self.notification_id)?,
      recipient_id:    decode_uuid(&self.recipient_id)?,
      kind:            decode_notification_kind(&self.kind)?,
      title:           self.title,
      body:            self.body,
      ride_id:         decode_opt_uuid(self.ride_id.as_deref())?,
      read:            self.read,
      read_at:         decode_opt_dt(self.read_at.as_deref())?,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}
