//! Core business logic for Ledgerline.
//!
//! Pure domain modules carry no web or database dependencies; the engine
//! reaches storage and the surrounding services only through the ports.
//!
//! # Modules
//!
//! - `currency` - Exchange rates, conversion and the shared balance tolerance
//! - `journal` - Journal entries and their validation
//! - `approval` - Generic multi-step approval workflows
//! - `posting` - The journal entry lifecycle state machine
//! - `fx` - Open items, FX revaluation and settlement
//! - `audit` - Append-only audit trail
//! - `ports` - Store and collaborator traits
//! - `memory` - In-memory implementations of every port
//! - `engine` - `GlEngine`, the transactional orchestrator

pub mod approval;
pub mod audit;
pub mod currency;
pub mod engine;
pub mod error;
pub mod fx;
pub mod journal;
pub mod memory;
pub mod ports;
pub mod posting;

pub use engine::{Caller, Collaborators, GlEngine, LedgerPolicy};
pub use error::{ErrorKind, GlError, GlResult};
