//! Multi-currency revaluation: open items, revaluation batches and
//! settlement of realized gains and losses.

pub mod error;
pub mod revaluation;
#[cfg(test)]
mod revaluation_props;
pub mod types;

pub use error::FxError;
pub use revaluation::{FxRevaluationService, RevaluationInput, Settlement, SettlementInput};
pub use types::{
    BatchKey, BatchKind, BatchStatus, FxAccounts, FxRevaluationBatch, FxRevaluationEntry,
    GainLossTag, OpenItem, RevaluationMethod, RevaluationScope,
};
