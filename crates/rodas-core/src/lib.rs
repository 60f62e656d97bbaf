//! Core types and trait definitions for the Esperança Sobre Rodas ride
//! coordination service.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod actor;
pub mod coordinator;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod lifecycle;
pub mod notification;
pub mod policy;
pub mod rating;
pub mod ride;
pub mod store;

pub use error::{Error, Result};
