//! Translation of database failures into store and collaborator errors.

use sea_orm::{DbErr, SqlErr};

use ledgerline_core::ports::{CollaboratorError, StoreError};

/// Maps a `SeaORM` error; unique-index violations become `Duplicate`.
pub fn store_error(err: DbErr) -> StoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => StoreError::Duplicate(detail),
        _ => StoreError::Backend(err.to_string()),
    }
}

/// A stored value that no longer parses into its domain type.
pub fn corrupt(column: &str, value: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(format!("unreadable {column} value '{value}'"))
}

/// Maps a `SeaORM` error raised while answering for `service`.
pub fn collaborator_error(service: &'static str, err: &DbErr) -> CollaboratorError {
    CollaboratorError::Unavailable {
        service,
        message: err.to_string(),
    }
}
