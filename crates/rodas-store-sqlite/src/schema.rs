//! SQL schema for the ride coordination store.
//!
//! Executed once at connection startup; `PRAGMA user_version` records the
//! layout so later migrations can be gated on it.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS actors (
    actor_id      TEXT PRIMARY KEY,
    email         TEXT NOT NULL UNIQUE,   -- trimmed, lower-case
    display_name  TEXT NOT NULL,
    role          TEXT NOT NULL,          -- 'patient' | 'driver' | 'administrator'
    password_hash TEXT NOT NULL,          -- argon2 PHC string
    active        INTEGER NOT NULL DEFAULT 1,
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS patient_profiles (
    actor_id          TEXT PRIMARY KEY REFERENCES actors(actor_id),
    guardian_name     TEXT NOT NULL,
    guardian_cpf      TEXT NOT NULL,
    guardian_phone    TEXT NOT NULL,
    needs_wheelchair  INTEGER NOT NULL DEFAULT 0,
    immunosuppressed  INTEGER NOT NULL DEFAULT 0,
    medical_notes     TEXT NOT NULL DEFAULT '',
    terms_accepted_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS driver_profiles (
    actor_id             TEXT PRIMARY KEY REFERENCES actors(actor_id),
    vehicle_make         TEXT NOT NULL,
    vehicle_model        TEXT NOT NULL,
    vehicle_color        TEXT NOT NULL,
    vehicle_year         INTEGER,
    vehicle_plate        TEXT,
    licence_number       TEXT,
    licence_expires      TEXT,            -- YYYY-MM-DD
    approval_state       TEXT NOT NULL DEFAULT 'pending',
    online               INTEGER NOT NULL DEFAULT 0,
    average_rating       TEXT NOT NULL DEFAULT '0.00',
    completed_ride_count INTEGER NOT NULL DEFAULT 0 CHECK (completed_ride_count >= 0),
    approved_at          TEXT,
    admin_notes          TEXT NOT NULL DEFAULT '',
    terms_accepted_at    TEXT NOT NULL
);

-- Rides are never deleted. Status only moves through guarded updates.
CREATE TABLE IF NOT EXISTS rides (
    ride_id          TEXT PRIMARY KEY,
    patient_id       TEXT NOT NULL REFERENCES actors(actor_id),
    driver_id        TEXT REFERENCES actors(actor_id),
    origin_address   TEXT NOT NULL,
    origin_lat       REAL,
    origin_lon       REAL,
    dest_address     TEXT NOT NULL,
    dest_lat         REAL,
    dest_lon         REAL,
    scheduled_for    TEXT NOT NULL,       -- local wall clock, YYYY-MM-DDTHH:MM:SS
    passenger_count  INTEGER NOT NULL CHECK (passenger_count >= 1),
    has_companion    INTEGER NOT NULL DEFAULT 0,
    needs_wheelchair INTEGER NOT NULL DEFAULT 0,
    notes            TEXT NOT NULL DEFAULT '',
    status           TEXT NOT NULL,
    accepted_at      TEXT,
    started_at       TEXT,
    arrived_at       TEXT,
    completed_at     TEXT,
    cancelled_by     TEXT REFERENCES actors(actor_id),
    cancelled_at     TEXT,
    cancel_reason    TEXT,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ratings (
    rating_id    TEXT PRIMARY KEY,
    ride_id      TEXT NOT NULL REFERENCES rides(ride_id),
    evaluator_id TEXT NOT NULL REFERENCES actors(actor_id),
    rated_id     TEXT NOT NULL REFERENCES actors(actor_id),
    direction    TEXT NOT NULL,          -- 'patient_rates_driver' | 'driver_rates_patient'
    score        INTEGER NOT NULL CHECK (score BETWEEN 1 AND 5),
    comment      TEXT NOT NULL DEFAULT '',
    created_at   TEXT NOT NULL,
    UNIQUE (ride_id, evaluator_id, direction)
);

CREATE TABLE IF NOT EXISTS notifications (
    notification_id TEXT PRIMARY KEY,
    recipient_id    TEXT NOT NULL REFERENCES actors(actor_id),
    kind            TEXT NOT NULL,
    title           TEXT NOT NULL,
    body            TEXT NOT NULL,
    ride_id         TEXT REFERENCES rides(ride_id),
    read            INTEGER NOT NULL DEFAULT 0,
    read_at         TEXT,
    created_at      TEXT NOT NULL
);

-- Only the SHA-256 digest of a bearer token is ever stored.
CREATE TABLE IF NOT EXISTS sessions (
    token_digest TEXT PRIMARY KEY,
    actor_id     TEXT NOT NULL REFERENCES actors(actor_id),
    created_at   TEXT NOT NULL,
    expires_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS rides_patient_idx         ON rides(patient_id);
CREATE INDEX IF NOT EXISTS rides_driver_idx          ON rides(driver_id);
CREATE INDEX IF NOT EXISTS rides_status_idx          ON rides(status);
CREATE INDEX IF NOT EXISTS ratings_rated_idx         ON ratings(rated_id, direction);
CREATE INDEX IF NOT EXISTS notifications_recipient_idx ON notifications(recipient_id, read);
CREATE INDEX IF NOT EXISTS sessions_actor_idx        ON sessions(actor_id);

PRAGMA user_version = 1;
";
