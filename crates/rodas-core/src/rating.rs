//! Post-ride ratings between a patient and their driver.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  actor::Actor,
  ride::{Ride, RideStatus},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingDirection {
  PatientRatesDriver,
  DriverRatesPatient,
}

impl RatingDirection {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::PatientRatesDriver => "patient_rates_driver",
      Self::DriverRatesPatient => "driver_rates_patient",
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
  pub rating_id:    Uuid,
  pub ride_id:      Uuid,
  pub evaluator_id: Uuid,
  pub rated_id:     Uuid,
  pub direction:    RatingDirection,
  pub score:        u8,
  pub comment:      String,
  pub created_at:   DateTime<Utc>,
}

/// Input to [`crate::store::RideStore::submit_rating`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewRating {
  pub score:   u8,
  #[serde(default)]
  pub comment: String,
}

impl NewRating {
  pub fn validate(&self) -> Result<()> {
    if !(1..=5).contains(&self.score) {
      return Err(Error::validation("score", "must be between 1 and 5"));
    }
    Ok(())
  }
}

/// Check the ride-level guards for `evaluator` rating `ride` and build the
/// rating. Uniqueness is the store's concern.
pub fn prepare(
  ride: &Ride,
  evaluator: &Actor,
  input: NewRating,
  at: DateTime<Utc>,
) -> Result<Rating> {
  input.validate()?;
  if !evaluator.active {
    return Err(Error::PermissionDenied);
  }
  if ride.status != RideStatus::Completed {
    return Err(Error::RideNotCompleted);
  }

  let (direction, rated_id) = if evaluator.actor_id == ride.patient_id {
    let driver_id = ride.driver_id.ok_or(Error::RideNotCompleted)?;
    (RatingDirection::PatientRatesDriver, driver_id)
  } else if ride.is_assigned_to(evaluator.actor_id) {
    (RatingDirection::DriverRatesPatient, ride.patient_id)
  } else {
    return Err(Error::PermissionDenied);
  };

  Ok(Rating {
    rating_id: Uuid::new_v4(),
    ride_id: ride.ride_id,
    evaluator_id: evaluator.actor_id,
    rated_id,
    direction,
    score: input.score,
    comment: input.comment.trim().to_owned(),
    created_at: at,
  })
}

/// Arithmetic mean rounded to two places, half away from zero, always carried
/// at scale 2 (so `4` reads `4.00`). An empty set averages to zero.
pub fn average(scores: &[u8]) -> Decimal {
  let mut avg = if scores.is_empty() {
    Decimal::ZERO
  } else {
    let sum: Decimal = scores.iter().map(|&s| Decimal::from(s)).sum();
    (sum / Decimal::from(scores.len()))
      .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
  };
  avg.rescale(2);
  avg
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{actor::Role, ride::tests::new_ride};

  fn actor(role: Role) -> Actor {
    Actor {
      actor_id:     Uuid::new_v4(),
      email:        "x@example.com".into(),
      display_name: "X".into(),
      role,
      active:       true,
      created_at:   Utc::now(),
    }
  }

  fn completed_ride(patient: &Actor, driver: &Actor) -> Ride {
    let mut ride = Ride::new(patient.actor_id, new_ride(), false, Utc::now()).unwrap();
    ride.driver_id = Some(driver.actor_id);
    ride.status = RideStatus::Completed;
    ride
  }

  #[test]
  fn average_rounds_half_up() {
    assert_eq!(average(&[5, 4, 3]), Decimal::new(400, 2));
    assert_eq!(average(&[4, 4, 5]), Decimal::new(433, 2));
    assert_eq!(average(&[5, 5, 4]), Decimal::new(467, 2));
    assert_eq!(average(&[4, 5]), Decimal::new(450, 2));
    assert_eq!(average(&[]), Decimal::ZERO);
    assert_eq!(average(&[5, 4, 3]).to_string(), "4.00");
    assert_eq!(average(&[4, 5]).to_string(), "4.50");
    assert_eq!(average(&[]).to_string(), "0.00");
  }

  #[test]
  fn direction_follows_evaluator() {
    let patient = actor(Role::Patient);
    let driver = actor(Role::Driver);
    let ride = completed_ride(&patient, &driver);

    let r = prepare(&ride, &patient, NewRating { score: 5, comment: "ótimo".into() }, Utc::now())
      .unwrap();
    assert_eq!(r.direction, RatingDirection::PatientRatesDriver);
    assert_eq!(r.rated_id, driver.actor_id);

    let r = prepare(&ride, &driver, NewRating { score: 4, comment: String::new() }, Utc::now())
      .unwrap();
    assert_eq!(r.direction, RatingDirection::DriverRatesPatient);
    assert_eq!(r.rated_id, patient.actor_id);
  }

  #[test]
  fn unfinished_ride_cannot_be_rated() {
    let patient = actor(Role::Patient);
    let driver = actor(Role::Driver);
    let mut ride = completed_ride(&patient, &driver);
    ride.status = RideStatus::DriverArrived;
    let err = prepare(&ride, &patient, NewRating { score: 5, comment: String::new() }, Utc::now())
      .unwrap_err();
    assert!(matches!(err, Error::RideNotCompleted));
  }

  #[test]
  fn outsiders_and_bad_scores_rejected() {
    let patient = actor(Role::Patient);
    let driver = actor(Role::Driver);
    let ride = completed_ride(&patient, &driver);

    let err = prepare(
      &ride,
      &actor(Role::Patient),
      NewRating { score: 3, comment: String::new() },
      Utc::now(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::PermissionDenied));

    let err = prepare(&ride, &patient, NewRating { score: 6, comment: String::new() }, Utc::now())
      .unwrap_err();
    assert!(matches!(err, Error::Validation { field: "score", .. }));
  }
}
