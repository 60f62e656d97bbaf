//! Actors, their roles and the role-specific profiles.
//!
//! An actor is the account behind every request. The role is fixed when the
//! account is registered; profile data lives alongside it one-to-one.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  driver::{DriverProfile, NewDriverProfile},
};

// ─── Role ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  Patient,
  Driver,
  Administrator,
}

impl Role {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Patient => "patient",
      Self::Driver => "driver",
      Self::Administrator => "administrator",
    }
  }
}

// ─── Actor ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
  pub actor_id:     Uuid,
  pub email:        String,
  pub display_name: String,
  pub role:         Role,
  pub active:       bool,
  pub created_at:   DateTime<Utc>,
}

impl Actor {
  pub fn is_patient(&self) -> bool { self.role == Role::Patient }

  pub fn is_driver(&self) -> bool { self.role == Role::Driver }

  pub fn is_administrator(&self) -> bool { self.role == Role::Administrator }

  /// First word of the display name, falling back to the e-mail local part.
  pub fn short_name(&self) -> &str {
    self
      .display_name
      .split_whitespace()
      .next()
      .unwrap_or_else(|| self.email.split('@').next().unwrap_or(&self.email))
  }
}

// ─── Patient profile ─────────────────────────────────────────────────────────

/// Guardian contact and accessibility data for a patient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientProfile {
  pub actor_id:          Uuid,
  pub guardian_name:     String,
  pub guardian_cpf:      String,
  pub guardian_phone:    String,
  pub needs_wheelchair:  bool,
  pub immunosuppressed:  bool,
  pub medical_notes:     String,
  pub terms_accepted_at: DateTime<Utc>,
}

/// Input to patient registration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPatientProfile {
  pub guardian_name:    String,
  pub guardian_cpf:     String,
  pub guardian_phone:   String,
  #[serde(default)]
  pub needs_wheelchair: bool,
  #[serde(default)]
  pub immunosuppressed: bool,
  #[serde(default)]
  pub medical_notes:    String,
  #[serde(default)]
  pub accept_terms:     bool,
}

impl NewPatientProfile {
  pub fn validate(&self) -> Result<()> {
    require_text("guardian_name", &self.guardian_name)?;
    require_cpf("guardian_cpf", &self.guardian_cpf)?;
    require_phone("guardian_phone", &self.guardian_phone)?;
    if !self.accept_terms {
      return Err(Error::validation("accept_terms", "terms of use must be accepted"));
    }
    Ok(())
  }
}

// ─── Registration ────────────────────────────────────────────────────────────

/// Which profile to create alongside a new account. The variant decides the
/// actor's role.
#[derive(Debug, Clone)]
pub enum NewProfile {
  Patient(NewPatientProfile),
  Driver(NewDriverProfile),
  Administrator,
}

impl NewProfile {
  pub fn role(&self) -> Role {
    match self {
      Self::Patient(_) => Role::Patient,
      Self::Driver(_) => Role::Driver,
      Self::Administrator => Role::Administrator,
    }
  }
}

/// Input to [`crate::store::RideStore::register`]. The password has already
/// been hashed by the caller.
#[derive(Debug, Clone)]
pub struct NewAccount {
  pub email:         String,
  pub display_name:  String,
  pub password_hash: String,
  pub profile:       NewProfile,
}

impl NewAccount {
  /// Trim and lower-case the e-mail and check every field of the profile.
  pub fn normalized(mut self) -> Result<Self> {
    self.email = normalize_email(&self.email);
    self.display_name = self.display_name.trim().to_owned();

    if !looks_like_email(&self.email) {
      return Err(Error::validation("email", "not a valid e-mail address"));
    }
    require_text("display_name", &self.display_name)?;

    match &self.profile {
      NewProfile::Patient(p) => p.validate()?,
      NewProfile::Driver(d) => d.validate()?,
      NewProfile::Administrator => {}
    }
    Ok(self)
  }
}

/// The role-specific profile of an actor.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "role", content = "profile", rename_all = "snake_case")]
pub enum Profile {
  Patient(PatientProfile),
  Driver(DriverProfile),
  Administrator,
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// A logged-in actor, resolved from a bearer token. Passed explicitly into
/// every operation.
#[derive(Debug, Clone)]
pub struct Session {
  pub actor:      Actor,
  pub expires_at: DateTime<Utc>,
}

// ─── Field checks ────────────────────────────────────────────────────────────

pub fn normalize_email(email: &str) -> String { email.trim().to_lowercase() }

fn looks_like_email(email: &str) -> bool {
  match email.split_once('@') {
    Some((local, domain)) => {
      !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
    }
    None => false,
  }
}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<()> {
  if value.trim().is_empty() {
    return Err(Error::validation(field, "must not be empty"));
  }
  Ok(())
}

/// `000.000.000-00`
fn require_cpf(field: &'static str, value: &str) -> Result<()> {
  if matches_mask(value, "ddd.ddd.ddd-dd") {
    Ok(())
  } else {
    Err(Error::validation(field, "expected format 000.000.000-00"))
  }
}

/// `(11) 99999-9999` or `(11) 9999-9999`
fn require_phone(field: &'static str, value: &str) -> Result<()> {
  if matches_mask(value, "(dd) ddddd-dddd") || matches_mask(value, "(dd) dddd-dddd") {
    Ok(())
  } else {
    Err(Error::validation(field, "expected format (11) 99999-9999"))
  }
}

/// `d` in the mask matches one ASCII digit; every other character must match
/// literally.
fn matches_mask(value: &str, mask: &str) -> bool {
  value.len() == mask.len()
    && value.chars().zip(mask.chars()).all(|(c, m)| match m {
      'd' => c.is_ascii_digit(),
      other => c == other,
    })
}

/// Licence expiry must not be in the past when given.
pub(crate) fn require_not_expired(
  field: &'static str,
  date: Option<NaiveDate>,
  today: NaiveDate,
) -> Result<()> {
  match date {
    Some(d) if d < today => Err(Error::validation(field, "date is in the past")),
    _ => Ok(()),
  }
}
