//! In-memory adapters for every port.

pub mod directory;
pub mod store;

pub use directory::{
    PeriodWindow, RecordingNotifier, StaticAccounts, StaticIdentities, StaticPeriods, StaticRates,
};
pub use store::MemoryStore;
