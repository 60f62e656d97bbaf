//! [`SqliteStore`], the SQLite implementation of [`RideStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rodas_core::{
  actor::{Actor, NewAccount, NewProfile, PatientProfile, Session},
  driver::{ApprovalState, DriverProfile, DriverRecord},
  lifecycle::{self, Transition},
  notification::{NewNotification, Notification},
  rating::{self, NewRating, Rating, RatingDirection},
  ride::{Ride, RideEvent, RideQuery},
  store::{NotificationQuery, RideStore},
};
use rusqlite::{Connection, OptionalExtension as _, Transaction, TransactionBehavior};
use tracing::debug;
use uuid::Uuid;

use crate::{
  Result,
  encode::{
    ACTOR_COLUMNS, DRIVER_COLUMN_COUNT, DRIVER_COLUMNS, NOTIFICATION_COLUMNS, PATIENT_COLUMNS,
    RATING_COLUMNS, RIDE_COLUMNS, RawActor, RawDriverProfile, RawNotification, RawPatientProfile,
    RawRating, RawRide, decode_dt, encode_date, encode_dt, encode_opt_dt, encode_uuid,
    encode_wall_clock,
  },
  schema::SCHEMA,
};

type CoreError = rodas_core::Error;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A ride coordination store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    let version: i64 = self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(conn.query_row("PRAGMA user_version", [], |r| r.get(0))?)
      })
      .await?;
    debug!(version, "schema ready");
    Ok(())
  }

  /// Run a read-only closure on the connection thread.
  async fn read<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }

  /// Run `f` inside a `BEGIN IMMEDIATE` transaction, committing only if it
  /// returns `Ok`. Domain errors raised by `f` roll the transaction back and
  /// are returned unchanged.
  async fn with_tx<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&Transaction<'_>) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx);
        if out.is_ok() {
          tx.commit()?;
        }
        Ok(out)
      })
      .await?
  }
}

// ─── Row access ──────────────────────────────────────────────────────────────
//
// Synchronous helpers shared by the transactional methods below. They take a
// plain `Connection` so they work both on a transaction and outside one.

fn load_actor(conn: &Connection, id: &str) -> Result<Option<Actor>> {
  conn
    .query_row(
      &format!("SELECT {ACTOR_COLUMNS} FROM actors WHERE actor_id = ?1"),
      [id],
      |row| RawActor::read(row, 0),
    )
    .optional()?
    .map(RawActor::into_actor)
    .transpose()
}

fn load_patient(conn: &Connection, id: &str) -> Result<Option<PatientProfile>> {
  conn
    .query_row(
      &format!("SELECT {PATIENT_COLUMNS} FROM patient_profiles WHERE actor_id = ?1"),
      [id],
      RawPatientProfile::read,
    )
    .optional()?
    .map(RawPatientProfile::into_profile)
    .transpose()
}

fn load_driver(conn: &Connection, id: &str) -> Result<Option<DriverProfile>> {
  conn
    .query_row(
      &format!("SELECT {DRIVER_COLUMNS} FROM driver_profiles d WHERE d.actor_id = ?1"),
      [id],
      RawDriverProfile::read,
    )
    .optional()?
    .map(RawDriverProfile::into_profile)
    .transpose()
}

fn require_driver(conn: &Connection, id: Uuid) -> Result<DriverProfile> {
  load_driver(conn, &encode_uuid(id))?.ok_or_else(|| CoreError::driver_not_found(id).into())
}

fn load_ride(conn: &Connection, id: &str) -> Result<Option<Ride>> {
  conn
    .query_row(&format!("SELECT {RIDE_COLUMNS} FROM rides WHERE ride_id = ?1"), [id], RawRide::read)
    .optional()?
    .map(RawRide::into_ride)
    .transpose()
}

fn require_ride(conn: &Connection, id: Uuid) -> Result<Ride> {
  load_ride(conn, &encode_uuid(id))?.ok_or_else(|| CoreError::ride_not_found(id).into())
}

fn load_notification(conn: &Connection, id: &str) -> Result<Option<Notification>> {
  conn
    .query_row(
      &format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE notification_id = ?1"),
      [id],
      RawNotification::read,
    )
    .optional()?
    .map(RawNotification::into_notification)
    .transpose()
}

fn insert_ride(conn: &Connection, ride: &Ride) -> Result<()> {
  let cancellation = ride.cancellation.as_ref();
  conn.execute(
    &format!(
      "INSERT INTO rides ({RIDE_COLUMNS}) VALUES (
         ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
         ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24
       )"
    ),
    rusqlite::params![
      encode_uuid(ride.ride_id),
      encode_uuid(ride.patient_id),
      ride.driver_id.map(encode_uuid),
      ride.origin.address,
      ride.origin.latitude,
      ride.origin.longitude,
      ride.destination.address,
      ride.destination.latitude,
      ride.destination.longitude,
      encode_wall_clock(ride.scheduled_for),
      ride.passenger_count,
      ride.has_companion,
      ride.needs_wheelchair,
      ride.notes,
      ride.status.as_str(),
      encode_opt_dt(ride.accepted_at),
      encode_opt_dt(ride.started_at),
      encode_opt_dt(ride.arrived_at),
      encode_opt_dt(ride.completed_at),
      cancellation.map(|c| encode_uuid(c.cancelled_by)),
      cancellation.map(|c| encode_dt(c.cancelled_at)),
      cancellation.and_then(|c| c.reason.clone()),
      encode_dt(ride.created_at),
      encode_dt(ride.updated_at),
    ],
  )?;
  Ok(())
}

/// Write the lifecycle columns of `t.ride`, but only if the stored ride is
/// still in `t.from` with driver `t.from_driver`. Returns `false` if it moved.
fn commit_transition(conn: &Connection, t: &Transition) -> Result<bool> {
  let ride = &t.ride;
  let cancellation = ride.cancellation.as_ref();
  let changed = conn.execute(
    "UPDATE rides SET
       driver_id = ?1, status = ?2,
       accepted_at = ?3, started_at = ?4, arrived_at = ?5, completed_at = ?6,
       cancelled_by = ?7, cancelled_at = ?8, cancel_reason = ?9,
       updated_at = ?10
     WHERE ride_id = ?11 AND status = ?12 AND driver_id IS ?13",
    rusqlite::params![
      ride.driver_id.map(encode_uuid),
      ride.status.as_str(),
      encode_opt_dt(ride.accepted_at),
      encode_opt_dt(ride.started_at),
      encode_opt_dt(ride.arrived_at),
      encode_opt_dt(ride.completed_at),
      cancellation.map(|c| encode_uuid(c.cancelled_by)),
      cancellation.map(|c| encode_dt(c.cancelled_at)),
      cancellation.and_then(|c| c.reason.clone()),
      encode_dt(ride.updated_at),
      encode_uuid(ride.ride_id),
      t.from.as_str(),
      t.from_driver.map(encode_uuid),
    ],
  )?;
  Ok(changed == 1)
}

/// Recompute a driver's average from every score patients gave them.
fn refresh_driver_average(conn: &Connection, driver_id: &str) -> Result<()> {
  let scores = conn
    .prepare(
      "SELECT score FROM ratings
       WHERE rated_id = ?1 AND direction = ?2",
    )?
    .query_map(
      rusqlite::params![driver_id, RatingDirection::PatientRatesDriver.as_str()],
      |row| row.get::<_, u8>(0),
    )?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let average = rating::average(&scores);
  conn.execute(
    "UPDATE driver_profiles SET average_rating = ?1 WHERE actor_id = ?2",
    rusqlite::params![average.to_string(), driver_id],
  )?;
  debug!(driver = driver_id, %average, ratings = scores.len(), "driver average refreshed");
  Ok(())
}

// ─── RideStore impl ──────────────────────────────────────────────────────────

impl RideStore for SqliteStore {
  type Error = crate::Error;

  // ── Accounts and sessions ─────────────────────────────────────────────────

  async fn register(&self, account: NewAccount) -> Result<Actor> {
    let actor = Actor {
      actor_id:     Uuid::new_v4(),
      email:        account.email,
      display_name: account.display_name,
      role:         account.profile.role(),
      active:       true,
      created_at:   Utc::now(),
    };
    let password_hash = account.password_hash;
    let profile = account.profile;

    self
      .with_tx(move |tx| {
        let taken = tx
          .query_row("SELECT 1 FROM actors WHERE email = ?1", [&actor.email], |_| Ok(()))
          .optional()?
          .is_some();
        if taken {
          return Err(CoreError::validation("email", "this e-mail is already registered").into());
        }

        let id = encode_uuid(actor.actor_id);
        let at = encode_dt(actor.created_at);
        tx.execute(
          "INSERT INTO actors (actor_id, email, display_name, role, password_hash, active, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)",
          rusqlite::params![id, actor.email, actor.display_name, actor.role.as_str(), password_hash, at],
        )?;

        match profile {
          NewProfile::Patient(p) => {
            tx.execute(
              &format!("INSERT INTO patient_profiles ({PATIENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
              rusqlite::params![
                id,
                p.guardian_name.trim(),
                p.guardian_cpf,
                p.guardian_phone,
                p.needs_wheelchair,
                p.immunosuppressed,
                p.medical_notes.trim(),
                at,
              ],
            )?;
          }
          NewProfile::Driver(d) => {
            let vehicle = d.vehicle();
            let licence = d.licence();
            tx.execute(
              "INSERT INTO driver_profiles (
                 actor_id, vehicle_make, vehicle_model, vehicle_color, vehicle_year,
                 vehicle_plate, licence_number, licence_expires, terms_accepted_at
               ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
              rusqlite::params![
                id,
                vehicle.make,
                vehicle.model,
                vehicle.color,
                vehicle.year,
                vehicle.plate,
                licence.number,
                licence.expires_on.map(encode_date),
                at,
              ],
            )?;
          }
          NewProfile::Administrator => {}
        }
        Ok(actor)
      })
      .await
  }

  async fn get_actor(&self, actor_id: Uuid) -> Result<Option<Actor>> {
    let id = encode_uuid(actor_id);
    self.read(move |conn| load_actor(conn, &id)).await
  }

  async fn find_credentials(&self, email: &str) -> Result<Option<(Actor, String)>> {
    let email = email.to_owned();
    let raw: Option<(RawActor, String)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {ACTOR_COLUMNS}, password_hash FROM actors WHERE email = ?1"),
              [email],
              |row| Ok((RawActor::read(row, 0)?, row.get(6)?)),
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(|(actor, hash)| Ok((actor.into_actor()?, hash))).transpose()
  }

  async fn create_session(
    &self,
    actor_id: Uuid,
    token_digest: String,
    expires_at: DateTime<Utc>,
  ) -> Result<()> {
    let id = encode_uuid(actor_id);
    let now = encode_dt(Utc::now());
    let expires = encode_dt(expires_at);
    self
      .conn
      .call(move |conn| {
        // Expired sessions are swept whenever a new one is issued.
        conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", [&now])?;
        conn.execute(
          "INSERT INTO sessions (token_digest, actor_id, created_at, expires_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![token_digest, id, now, expires],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn resolve_session(
    &self,
    token_digest: &str,
    now: DateTime<Utc>,
  ) -> Result<Option<Session>> {
    let digest = token_digest.to_owned();
    let now = encode_dt(now);
    let raw: Option<(RawActor, String)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT a.actor_id, a.email, a.display_name, a.role, a.active, a.created_at,
                      s.expires_at
               FROM sessions s
               JOIN actors a ON a.actor_id = s.actor_id
               WHERE s.token_digest = ?1 AND s.expires_at > ?2 AND a.active = 1",
              rusqlite::params![digest, now],
              |row| Ok((RawActor::read(row, 0)?, row.get(6)?)),
            )
            .optional()?,
        )
      })
      .await?;

    raw
      .map(|(actor, expires_at)| {
        Ok(Session { actor: actor.into_actor()?, expires_at: decode_dt(&expires_at)? })
      })
      .transpose()
  }

  async fn revoke_session(&self, token_digest: &str) -> Result<bool> {
    let digest = token_digest.to_owned();
    let removed = self
      .conn
      .call(move |conn| Ok(conn.execute("DELETE FROM sessions WHERE token_digest = ?1", [digest])?))
      .await?;
    Ok(removed > 0)
  }

  async fn get_patient_profile(&self, actor_id: Uuid) -> Result<Option<PatientProfile>> {
    let id = encode_uuid(actor_id);
    self.read(move |conn| load_patient(conn, &id)).await
  }

  async fn get_driver_profile(&self, actor_id: Uuid) -> Result<Option<DriverProfile>> {
    let id = encode_uuid(actor_id);
    self.read(move |conn| load_driver(conn, &id)).await
  }

  // ── Drivers ───────────────────────────────────────────────────────────────

  async fn set_driver_online(&self, driver_id: Uuid, online: bool) -> Result<DriverProfile> {
    self
      .with_tx(move |tx| {
        tx.execute(
          "UPDATE driver_profiles SET online = ?1 WHERE actor_id = ?2",
          rusqlite::params![online, encode_uuid(driver_id)],
        )?;
        require_driver(tx, driver_id)
      })
      .await
  }

  async fn toggle_driver_online(&self, driver_id: Uuid) -> Result<DriverProfile> {
    self
      .with_tx(move |tx| {
        tx.execute(
          "UPDATE driver_profiles SET online = NOT online WHERE actor_id = ?1",
          [encode_uuid(driver_id)],
        )?;
        require_driver(tx, driver_id)
      })
      .await
  }

  async fn set_driver_approval(
    &self,
    driver_id: Uuid,
    to: ApprovalState,
    note: Option<String>,
    at: DateTime<Utc>,
  ) -> Result<DriverProfile> {
    self
      .with_tx(move |tx| {
        let mut profile = require_driver(tx, driver_id)?;
        let from = profile.approval_state;
        profile.apply_approval(to, note, at)?;

        let changed = tx.execute(
          "UPDATE driver_profiles
           SET approval_state = ?1, online = ?2, approved_at = ?3, admin_notes = ?4
           WHERE actor_id = ?5 AND approval_state = ?6",
          rusqlite::params![
            profile.approval_state.as_str(),
            profile.online,
            encode_opt_dt(profile.approved_at),
            profile.admin_notes,
            encode_uuid(driver_id),
            from.as_str(),
          ],
        )?;
        if changed != 1 {
          return Err(CoreError::InvalidApprovalTransition { from, to }.into());
        }
        Ok(profile)
      })
      .await
  }

  async fn list_drivers(&self, approval_state: Option<ApprovalState>) -> Result<Vec<DriverRecord>> {
    let state = approval_state.map(ApprovalState::as_str);
    let raws: Vec<(RawDriverProfile, RawActor)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {DRIVER_COLUMNS},
                  a.actor_id, a.email, a.display_name, a.role, a.active, a.created_at
           FROM driver_profiles d
           JOIN actors a ON a.actor_id = d.actor_id
           WHERE (?1 IS NULL OR d.approval_state = ?1)
           ORDER BY a.created_at"
        ))?;
        let rows = stmt
          .query_map([state], |row| {
            Ok((RawDriverProfile::read(row)?, RawActor::read(row, DRIVER_COLUMN_COUNT)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(profile, actor)| {
        Ok(DriverRecord { actor: actor.into_actor()?, profile: profile.into_profile()? })
      })
      .collect()
  }

  // ── Rides ─────────────────────────────────────────────────────────────────

  async fn create_ride(&self, ride: Ride) -> Result<Ride> {
    self
      .with_tx(move |tx| {
        insert_ride(tx, &ride)?;
        Ok(ride)
      })
      .await
  }

  async fn get_ride(&self, ride_id: Uuid) -> Result<Option<Ride>> {
    let id = encode_uuid(ride_id);
    self.read(move |conn| load_ride(conn, &id)).await
  }

  async fn list_rides(&self, query: &RideQuery) -> Result<Vec<Ride>> {
    let patient = query.patient_id.map(encode_uuid);
    let driver = query.driver_id.map(encode_uuid);
    let unassigned = query.include_unassigned;
    let status = query.status.map(|s| s.as_str());
    // SQLite treats a negative LIMIT as "no limit".
    let limit = query.limit.map_or(-1, |l| l as i64);

    let raws: Vec<RawRide> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RIDE_COLUMNS} FROM rides
           WHERE (?1 IS NULL OR patient_id = ?1)
             AND ((?2 IS NULL AND NOT ?3)
                  OR driver_id = ?2
                  OR (?3 AND status = 'pending' AND driver_id IS NULL))
             AND (?4 IS NULL OR status = ?4)
           ORDER BY scheduled_for DESC, created_at DESC
           LIMIT ?5"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![patient, driver, unassigned, status, limit], RawRide::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRide::into_ride).collect()
  }

  async fn apply_ride_event(
    &self,
    ride_id: Uuid,
    actor: Actor,
    event: RideEvent,
    now: DateTime<Utc>,
  ) -> Result<Transition> {
    self
      .with_tx(move |tx| {
        let ride = require_ride(tx, ride_id)?;
        let driver = if event == RideEvent::Accept && actor.is_driver() {
          load_driver(tx, &encode_uuid(actor.actor_id))?
        } else {
          None
        };

        let transition = lifecycle::apply(&ride, &actor, &event, driver.as_ref(), now)?;

        if !commit_transition(tx, &transition)? {
          return Err(
            CoreError::invalid_transition("ride was changed by someone else, reload and retry")
              .into(),
          );
        }
        if transition.completes_trip()
          && let Some(driver_id) = transition.ride.driver_id
        {
          tx.execute(
            "UPDATE driver_profiles SET completed_ride_count = completed_ride_count + 1
             WHERE actor_id = ?1",
            [encode_uuid(driver_id)],
          )?;
        }
        Ok(transition)
      })
      .await
  }

  // ── Ratings ───────────────────────────────────────────────────────────────

  async fn submit_rating(
    &self,
    ride_id: Uuid,
    evaluator: Actor,
    input: NewRating,
    now: DateTime<Utc>,
  ) -> Result<Rating> {
    self
      .with_tx(move |tx| {
        let ride = require_ride(tx, ride_id)?;
        let rating = rating::prepare(&ride, &evaluator, input, now)?;

        let ride_id = encode_uuid(rating.ride_id);
        let evaluator_id = encode_uuid(rating.evaluator_id);
        let rated_id = encode_uuid(rating.rated_id);
        let direction = rating.direction.as_str();

        let exists = tx
          .query_row(
            "SELECT 1 FROM ratings WHERE ride_id = ?1 AND evaluator_id = ?2 AND direction = ?3",
            rusqlite::params![ride_id, evaluator_id, direction],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if exists {
          return Err(CoreError::DuplicateRating.into());
        }

        tx.execute(
          &format!("INSERT INTO ratings ({RATING_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
          rusqlite::params![
            encode_uuid(rating.rating_id),
            ride_id,
            evaluator_id,
            rated_id,
            direction,
            rating.score,
            rating.comment,
            encode_dt(rating.created_at),
          ],
        )?;

        if rating.direction == RatingDirection::PatientRatesDriver {
          refresh_driver_average(tx, &rated_id)?;
        }
        Ok(rating)
      })
      .await
  }

  async fn list_ratings(&self, ride_id: Uuid) -> Result<Vec<Rating>> {
    let id = encode_uuid(ride_id);
    let raws: Vec<RawRating> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RATING_COLUMNS} FROM ratings WHERE ride_id = ?1 ORDER BY created_at"
        ))?;
        let rows = stmt.query_map([id], RawRating::read)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawRating::into_rating).collect()
  }

  // ── Notifications ─────────────────────────────────────────────────────────

  async fn insert_notification(
    &self,
    input: NewNotification,
    at: DateTime<Utc>,
  ) -> Result<Notification> {
    let notification = Notification {
      notification_id: Uuid::new_v4(),
      recipient_id:    input.recipient_id,
      kind:            input.kind,
      title:           input.title,
      body:            input.body,
      ride_id:         input.ride_id,
      read:            false,
      read_at:         None,
      created_at:      at,
    };

    let id = encode_uuid(notification.notification_id);
    let recipient = encode_uuid(notification.recipient_id);
    let kind = notification.kind.as_str();
    let title = notification.title.clone();
    let body = notification.body.clone();
    let ride = notification.ride_id.map(encode_uuid);
    let created = encode_dt(at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "INSERT INTO notifications ({NOTIFICATION_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, NULL, ?7)"
          ),
          rusqlite::params![id, recipient, kind, title, body, ride, created],
        )?;
        Ok(())
      })
      .await?;

    Ok(notification)
  }

  async fn list_notifications(
    &self,
    recipient_id: Uuid,
    query: NotificationQuery,
  ) -> Result<Vec<Notification>> {
    let id = encode_uuid(recipient_id);
    let limit = query.limit.map_or(-1, |l| l as i64);
    let unread_only = query.unread_only;

    let raws: Vec<RawNotification> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {NOTIFICATION_COLUMNS} FROM notifications
           WHERE recipient_id = ?1 AND (NOT ?2 OR read = 0)
           ORDER BY created_at DESC, rowid DESC
           LIMIT ?3"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id, unread_only, limit], RawNotification::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawNotification::into_notification).collect()
  }

  async fn unread_count(&self, recipient_id: Uuid) -> Result<u64> {
    let id = encode_uuid(recipient_id);
    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1 AND read = 0",
          [id],
          |r| r.get(0),
        )?)
      })
      .await?;
    Ok(count.max(0) as u64)
  }

  async fn mark_notification_read(
    &self,
    notification_id: Uuid,
    reader_id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<Notification> {
    self
      .with_tx(move |tx| {
        let id = encode_uuid(notification_id);
        let mut notification = load_notification(tx, &id)?
          .ok_or_else(|| CoreError::notification_not_found(notification_id))?;
        if notification.recipient_id != reader_id {
          return Err(CoreError::NotRecipient.into());
        }
        if !notification.read {
          tx.execute(
            "UPDATE notifications SET read = 1, read_at = ?1
             WHERE notification_id = ?2 AND read = 0",
            rusqlite::params![encode_dt(at), id],
          )?;
          notification.read = true;
          notification.read_at = Some(at);
        }
        Ok(notification)
      })
      .await
  }

  async fn mark_all_read(&self, recipient_id: Uuid, at: DateTime<Utc>) -> Result<u64> {
    let id = encode_uuid(recipient_id);
    let at = encode_dt(at);
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE notifications SET read = 1, read_at = ?1
           WHERE recipient_id = ?2 AND read = 0",
          rusqlite::params![at, id],
        )?)
      })
      .await?;
    Ok(changed as u64)
  }
}
