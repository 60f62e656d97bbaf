//! Best-effort delivery of notifications.
//!
//! Dispatch always happens after the triggering change has committed, so a
//! storage failure here can never undo a ride transition. Failed inserts are
//! retried with linear backoff and, once attempts run out, logged at `error`
//! level rather than dropped silently.

use std::{future::Future, sync::Arc, time::Duration};

use chrono::Utc;
use tracing::{error, warn};

use crate::{
  notification::{NewNotification, Notification},
  store::RideStore,
};

/// Retry policy for notification inserts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
  /// Total tries, including the first. Zero is treated as one.
  pub attempts: u32,
  /// Delay before retry `n` is `backoff * n`.
  pub backoff:  Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self { Self { attempts: 3, backoff: Duration::from_millis(200) } }
}

/// Run `op` until it succeeds or `policy.attempts` is exhausted, returning
/// the last error in that case.
pub async fn with_retries<T, E, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, E>
where
  F: FnMut(u32) -> Fut,
  Fut: Future<Output = Result<T, E>>,
  E: std::fmt::Display,
{
  let attempts = policy.attempts.max(1);
  let mut attempt = 1;
  loop {
    match op(attempt).await {
      Ok(value) => return Ok(value),
      Err(e) if attempt < attempts => {
        warn!(attempt, attempts, error = %e, "retrying");
        tokio::time::sleep(policy.backoff * attempt).await;
        attempt += 1;
      }
      Err(e) => return Err(e),
    }
  }
}

pub struct Dispatcher<S> {
  store:  Arc<S>,
  policy: RetryPolicy,
}

impl<S> Clone for Dispatcher<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store), policy: self.policy } }
}

impl<S: RideStore> Dispatcher<S> {
  pub fn new(store: Arc<S>, policy: RetryPolicy) -> Self { Self { store, policy } }

  /// Persist one notification. Returns `None` when every attempt failed.
  pub async fn notify(&self, input: NewNotification) -> Option<Notification> {
    let recipient = input.recipient_id;
    let kind = input.kind.as_str();
    let ride = input.ride_id;

    let result = with_retries(self.policy, |_| {
      let input = input.clone();
      async move { self.store.insert_notification(input, Utc::now()).await }
    })
    .await;

    match result {
      Ok(n) => Some(n),
      Err(e) => {
        error!(
          %recipient,
          kind,
          ride = ?ride,
          error = %e,
          "notification dropped after {} attempts",
          self.policy.attempts.max(1)
        );
        None
      }
    }
  }

  /// Persist each notification in order; failures don't stop the rest.
  pub async fn notify_all(&self, inputs: Vec<NewNotification>) -> Vec<Notification> {
    let mut delivered = Vec::with_capacity(inputs.len());
    for input in inputs {
      if let Some(n) = self.notify(input).await {
        delivered.push(n);
      }
    }
    delivered
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicU32, Ordering};

  use super::*;

  fn quick(attempts: u32) -> RetryPolicy {
    RetryPolicy { attempts, backoff: Duration::from_millis(1) }
  }

  #[tokio::test]
  async fn succeeds_after_transient_failures() {
    let calls = AtomicU32::new(0);
    let out: Result<u32, String> = with_retries(quick(3), |attempt| {
      calls.fetch_add(1, Ordering::SeqCst);
      async move { if attempt < 3 { Err("busy".to_owned()) } else { Ok(attempt) } }
    })
    .await;
    assert_eq!(out, Ok(3));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn gives_up_after_last_attempt() {
    let calls = AtomicU32::new(0);
    let out: Result<(), String> = with_retries(quick(2), |_| {
      calls.fetch_add(1, Ordering::SeqCst);
      async { Err("disk full".to_owned()) }
    })
    .await;
    assert_eq!(out, Err("disk full".to_owned()));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn zero_attempts_still_tries_once() {
    let calls = AtomicU32::new(0);
    let _: Result<(), &str> = with_retries(quick(0), |_| {
      calls.fetch_add(1, Ordering::SeqCst);
      async { Err("nope") }
    })
    .await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }
}
