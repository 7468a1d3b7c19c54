//! Journal entry model.
//!
//! # Modules
//!
//! - `types` - Entry, line, draft and status types
//! - `error` - Validation reason codes
//! - `validation` - Ordered structural/referential/arithmetic/semantic checks
//! - `reversal` - Mirrored reversing entries

pub mod error;
pub mod reversal;
pub mod types;
pub mod validation;

#[cfg(test)]
mod validation_props;

pub use error::JournalValidationError;
pub use reversal::{ReversalInput, ReversalService};
pub use types::{
    AccountRef, EntryKind, JournalEntry, JournalEntryDraft, JournalLine, JournalLineInput,
    JournalSnapshot, JournalStatus, JournalTotals, SubledgerKind, SubledgerLink, TaxDetail,
};
pub use validation::{AccountInfo, JournalValidator, ValidatedEntry};
