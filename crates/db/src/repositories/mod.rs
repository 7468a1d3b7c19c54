//! Repository functions over a tenant-scoped transaction.
//!
//! Each module maps one aggregate between its `SeaORM` rows and the domain
//! types; [`crate::store::PgTx`] composes them into the ledger's unit of work.

pub mod approval;
pub mod audit;
pub mod convert;
pub mod fx;
pub mod journal;
