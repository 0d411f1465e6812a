//! Core domain + application logic for the Keyword Forward Bot.
//!
//! This crate is intentionally framework-agnostic. Telegram lives behind the
//! [`ports::ChatPort`] trait, implemented in the adapter crate, so the relay
//! state machine can be driven by an in-memory fake in tests.

pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod ports;
pub mod relay;
pub mod replies;

pub use errors::{Error, Result};
