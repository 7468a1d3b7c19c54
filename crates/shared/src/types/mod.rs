//! Common types used across the application.

pub mod actor;
pub mod id;
pub mod money;
pub mod pagination;

pub use actor::Actor;
pub use id::*;
pub use money::{CurrencyCode, CurrencyCodeError, Money};
pub use pagination::{PageMeta, PageRequest, PageResponse};
