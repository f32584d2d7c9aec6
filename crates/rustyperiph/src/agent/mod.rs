//! Pairing agent
//!
//! The daemon runs the pairing protocol itself and calls back into an agent
//! for every decision that needs the user: confirming a passkey, typing one,
//! or authorizing a device. This module provides:
//! - Association model negotiation from both parties' I/O capabilities
//! - Per-device pairing sessions and their state machine
//! - Deferred decisions, so a slow user never blocks the executor
//! - The [`Agent`] trait with the built-in [`NoIoAgent`] and [`YesNoAgent`]
//! - [`PairingAgent`], which registers an agent with the daemon
//!
//! Out-of-band pairing is not supported.

mod decision;
mod handler;
mod manager;
mod pairing;
mod types;

// Re-export public API
pub use self::decision::{pending, DecisionCanceller, DecisionResolver, PendingDecision};
pub use self::handler::{Agent, NoIoAgent, YesNoAgent};
pub use self::manager::PairingAgent;
pub use self::pairing::*;
pub use self::types::*;

#[cfg(test)]
mod tests;
