//! The sequential forwarding state machine.
//!
//! [`RelayState`] holds the configuration and the progress cursor;
//! [`Relay`] wraps it in the locks that make concurrent triggers safe and
//! implements the single forward attempt.

mod forward;
mod state;

pub use forward::{ForwardOutcome, Relay};
pub use state::{NotReady, RangeStatus, RelayState, StatusSnapshot, DEFAULT_KEYWORD};
