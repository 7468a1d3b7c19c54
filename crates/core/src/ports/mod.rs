//! Ports to the store and the external collaborators.
//!
//! Domain modules stay synchronous and pure; the engine gathers what they
//! need through these traits.

pub mod collaborators;
pub mod error;
pub mod store;

pub use collaborators::{
    AccountDirectory, ExchangeRateSource, IdentityProvider, Notification, NotificationChannel,
    NotificationEvent, PeriodService,
};
#[cfg(test)]
pub use collaborators::MockNotificationChannel;
pub use error::{CollaboratorError, NotificationError, StoreError};
pub use store::{LedgerStore, LedgerTx};
