//! HTTP server wiring for Esperança Sobre Rodas.
//!
//! Loads [`ServerConfig`], builds the coordinator over any [`RideStore`] and
//! mounts the JSON API behind a request-tracing layer. The binary in
//! `main.rs` is a thin shell around this crate.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use axum::Router;
use rodas_api::{ApiState, auth};
use rodas_core::{
  actor::{Actor, NewAccount, NewProfile},
  coordinator::Coordinator,
  dispatch::RetryPolicy,
  store::RideStore,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `RODAS_*` environment variables. Every field has a default.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                    String,
  #[serde(default = "default_port")]
  pub port:                    u16,
  #[serde(default = "default_store_path")]
  pub store_path:              PathBuf,
  #[serde(default = "default_session_ttl_hours")]
  pub session_ttl_hours:       i64,
  /// Attempts per notification before it is logged as dropped.
  #[serde(default = "default_notification_attempts")]
  pub notification_attempts:   u32,
  /// Base delay between attempts; grows linearly.
  #[serde(default = "default_notification_backoff_ms")]
  pub notification_backoff_ms: u64,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/rodas/rodas.db") }
fn default_session_ttl_hours() -> i64 { 12 }
fn default_notification_attempts() -> u32 { 3 }
fn default_notification_backoff_ms() -> u64 { 200 }

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                    default_host(),
      port:                    default_port(),
      store_path:              default_store_path(),
      session_ttl_hours:       default_session_ttl_hours(),
      notification_attempts:   default_notification_attempts(),
      notification_backoff_ms: default_notification_backoff_ms(),
    }
  }
}

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn retry_policy(&self) -> RetryPolicy {
    RetryPolicy {
      attempts: self.notification_attempts,
      backoff:  Duration::from_millis(self.notification_backoff_ms),
    }
  }

  pub fn session_ttl(&self) -> chrono::Duration { chrono::Duration::hours(self.session_ttl_hours) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Application ──────────────────────────────────────────────────────────────

/// Shared handler state for `store` under `config`.
pub fn build_state<S: RideStore>(store: Arc<S>, config: &ServerConfig) -> ApiState<S> {
  ApiState::new(Coordinator::new(store, config.retry_policy()), config.session_ttl())
}

/// The complete application router.
pub fn app<S: RideStore + 'static>(state: ApiState<S>) -> Router {
  rodas_api::api_router(state).layer(TraceLayer::new_for_http())
}

/// Register an administrator account. There is no HTTP route for this.
pub async fn create_admin<S: RideStore>(
  coordinator: &Coordinator<S>,
  email: &str,
  name: &str,
  password: &str,
) -> anyhow::Result<Actor> {
  auth::require_password(password)?;
  let password_hash = auth::hash_password(password)?;
  let actor = coordinator
    .register(NewAccount {
      email: email.to_owned(),
      display_name: name.to_owned(),
      password_hash,
      profile: NewProfile::Administrator,
    })
    .await?;
  Ok(actor)
}
