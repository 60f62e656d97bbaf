//! Role and ownership rules.
//!
//! Every check is a pure function of the actor and ride handed in; nothing is
//! cached between requests.

use crate::{
  Error, Result,
  actor::{Actor, Role},
  ride::{Ride, RideStatus},
};

/// What an actor intends to do with a ride.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RideAction {
  View,
  Modify,
  Accept,
  AdvanceStatus,
  Cancel,
  Rate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
  Allow,
  Deny,
}

impl Access {
  pub fn is_allowed(self) -> bool { self == Self::Allow }

  /// `Err(PermissionDenied)` unless allowed.
  pub fn require(self) -> Result<()> {
    match self {
      Self::Allow => Ok(()),
      Self::Deny => Err(Error::PermissionDenied),
    }
  }
}

impl From<bool> for Access {
  fn from(allowed: bool) -> Self { if allowed { Self::Allow } else { Self::Deny } }
}

pub fn role_of(actor: &Actor) -> Role { actor.role }

/// Only active patients may request rides.
pub fn can_create_ride(actor: &Actor) -> Access { (actor.active && actor.is_patient()).into() }

pub fn can_act_on_ride(actor: &Actor, ride: &Ride, action: RideAction) -> Access {
  if !actor.active {
    return Access::Deny;
  }

  let own_patient = ride.patient_id == actor.actor_id;
  let own_driver = ride.is_assigned_to(actor.actor_id);

  let allowed = match (role_of(actor), action) {
    (Role::Patient, RideAction::View | RideAction::Modify | RideAction::Cancel | RideAction::Rate) => {
      own_patient
    }
    (Role::Patient, RideAction::Accept | RideAction::AdvanceStatus) => false,

    (Role::Driver, RideAction::View) => {
      own_driver || (ride.status == RideStatus::Pending && ride.driver_id.is_none())
    }
    // Whether the ride can still be taken is a state guard, not a permission.
    (Role::Driver, RideAction::Accept) => true,
    (Role::Driver, RideAction::AdvanceStatus | RideAction::Cancel | RideAction::Rate) => own_driver,
    (Role::Driver, RideAction::Modify) => false,

    (Role::Administrator, RideAction::View | RideAction::Cancel) => true,
    (Role::Administrator, _) => false,
  };
  allowed.into()
}
