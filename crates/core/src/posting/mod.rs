//! Posting state machine.
//!
//! Binds journal entries to approval requests and exposes the lifecycle
//! transitions applications call.

pub mod error;
pub mod machine;

#[cfg(test)]
mod machine_props;

pub use error::PostingError;
pub use machine::{PostingAction, PostingStateMachine};
