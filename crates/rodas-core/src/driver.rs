//! Driver availability: approval state, online toggle and eligibility.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  actor::{require_not_expired, require_text},
};

// ─── Approval ────────────────────────────────────────────────────────────────

/// Administrative vetting state of a volunteer driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
  Pending,
  Approved,
  Rejected,
  Suspended,
}

impl ApprovalState {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Approved => "approved",
      Self::Rejected => "rejected",
      Self::Suspended => "suspended",
    }
  }

  /// Whether an administrator may move a driver from `self` to `to`.
  pub fn can_transition_to(self, to: ApprovalState) -> bool {
    use ApprovalState::*;
    matches!(
      (self, to),
      (Pending, Approved) | (Pending, Rejected) | (Approved, Suspended) | (Suspended, Approved)
    )
  }
}

impl fmt::Display for ApprovalState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

// ─── Profile ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
  pub make:  String,
  pub model: String,
  pub color: String,
  pub year:  Option<i32>,
  pub plate: Option<String>,
}

impl Vehicle {
  /// "make model color", as shown to patients.
  pub fn describe(&self) -> String { format!("{} {} {}", self.make, self.model, self.color) }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Licence {
  pub number:     Option<String>,
  pub expires_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverProfile {
  pub actor_id:             Uuid,
  pub vehicle:              Vehicle,
  pub licence:              Licence,
  pub approval_state:       ApprovalState,
  pub online:               bool,
  /// Mean of the scores patients gave this driver, two decimal places.
  pub average_rating:       Decimal,
  pub completed_ride_count: u32,
  pub approved_at:          Option<DateTime<Utc>>,
  pub admin_notes:          String,
  pub terms_accepted_at:    DateTime<Utc>,
}

impl DriverProfile {
  /// Approved and currently online. Checked when a ride is accepted, never
  /// when the driver toggles the online flag.
  pub fn is_eligible_to_accept(&self) -> bool {
    self.approval_state == ApprovalState::Approved && self.online
  }

  /// Apply an administrator's approval decision in place.
  ///
  /// `approved_at` is only written on entry to `Approved`; suspension also
  /// takes the driver offline.
  pub fn apply_approval(
    &mut self,
    to: ApprovalState,
    note: Option<String>,
    at: DateTime<Utc>,
  ) -> Result<()> {
    let from = self.approval_state;
    if !from.can_transition_to(to) {
      return Err(Error::InvalidApprovalTransition { from, to });
    }
    self.approval_state = to;
    if to == ApprovalState::Approved {
      self.approved_at = Some(at);
    }
    if to == ApprovalState::Suspended {
      self.online = false;
    }
    if let Some(note) = note.filter(|n| !n.trim().is_empty()) {
      self.admin_notes = note;
    }
    Ok(())
  }
}

/// A driver account joined with its profile, for administrative listings.
#[derive(Debug, Clone, Serialize)]
pub struct DriverRecord {
  pub actor:   crate::actor::Actor,
  pub profile: DriverProfile,
}

/// Input to driver registration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewDriverProfile {
  pub vehicle_make:    String,
  pub vehicle_model:   String,
  pub vehicle_color:   String,
  pub vehicle_year:    Option<i32>,
  pub vehicle_plate:   Option<String>,
  pub licence_number:  Option<String>,
  pub licence_expires: Option<NaiveDate>,
  #[serde(default)]
  pub accept_terms:    bool,
}

impl NewDriverProfile {
  pub fn validate(&self) -> Result<()> {
    require_text("vehicle_make", &self.vehicle_make)?;
    require_text("vehicle_model", &self.vehicle_model)?;
    require_text("vehicle_color", &self.vehicle_color)?;
    if let Some(plate) = &self.vehicle_plate
      && !is_valid_plate(plate)
    {
      return Err(Error::validation("vehicle_plate", "expected ABC-1234 or ABC1D23"));
    }
    require_not_expired("licence_expires", self.licence_expires, Utc::now().date_naive())?;
    if !self.accept_terms {
      return Err(Error::validation("accept_terms", "volunteer terms must be accepted"));
    }
    Ok(())
  }

  pub fn vehicle(&self) -> Vehicle {
    Vehicle {
      make:  self.vehicle_make.trim().to_owned(),
      model: self.vehicle_model.trim().to_owned(),
      color: self.vehicle_color.trim().to_owned(),
      year:  self.vehicle_year,
      plate: self.vehicle_plate.as_ref().map(|p| p.trim().to_uppercase()),
    }
  }

  pub fn licence(&self) -> Licence {
    Licence {
      number:     self.licence_number.clone(),
      expires_on: self.licence_expires,
    }
  }
}

/// Old-style `ABC-1234` / `ABC1234` or Mercosul `ABC1D23` plates.
fn is_valid_plate(plate: &str) -> bool {
  let p: Vec<char> = plate.trim().to_uppercase().chars().collect();
  let letters = |s: &[char]| s.iter().all(|c| c.is_ascii_uppercase());
  let digits = |s: &[char]| s.iter().all(|c| c.is_ascii_digit());
  match p.len() {
    8 => letters(&p[..3]) && p[3] == '-' && digits(&p[4..]),
    7 => {
      letters(&p[..3])
        && (digits(&p[3..]) || (p[3].is_ascii_digit() && p[4].is_ascii_uppercase() && digits(&p[5..])))
    }
    _ => false,
  }
}
