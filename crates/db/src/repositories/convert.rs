//! Column-level conversions shared by the repositories.

use chrono::{DateTime, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use ledgerline_core::ports::StoreError;
use ledgerline_shared::types::{Actor, CurrencyCode, UserId};

use crate::error::corrupt;

/// Splits an actor into its stored discriminator and user id.
pub fn actor_columns(actor: Actor) -> (String, Option<Uuid>) {
    (actor.kind_str().to_string(), actor.user_id().map(UserId::into_inner))
}

/// Rebuilds an actor from its stored columns.
pub fn actor_from(kind: &str, id: Option<Uuid>) -> Actor {
    Actor::from_parts(kind, id.map(UserId::from_uuid))
}

/// Rebuilds an optional actor; a missing discriminator means no actor.
pub fn optional_actor(kind: Option<&str>, id: Option<Uuid>) -> Option<Actor> {
    kind.map(|kind| actor_from(kind, id))
}

pub fn to_db_time(at: DateTime<Utc>) -> DateTimeWithTimeZone {
    at.fixed_offset()
}

pub fn from_db_time(at: DateTimeWithTimeZone) -> DateTime<Utc> {
    at.with_timezone(&Utc)
}

pub fn currency(column: &str, value: &str) -> Result<CurrencyCode, StoreError> {
    CurrencyCode::new(value.trim()).map_err(|_| corrupt(column, value))
}

/// Parses a stored enum value with the domain type's own parser.
pub fn parse_enum<T>(column: &str, value: &str, parse: fn(&str) -> Option<T>) -> Result<T, StoreError> {
    parse(value).ok_or_else(|| corrupt(column, value))
}

pub fn to_i32(column: &str, value: u32) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| corrupt(column, value))
}

pub fn to_u32(column: &str, value: i32) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| corrupt(column, value))
}

pub fn to_json<T: Serialize>(column: &str, value: &T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(value).map_err(|e| corrupt(column, e))
}

pub fn from_json<T: DeserializeOwned>(column: &str, value: serde_json::Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|e| corrupt(column, e))
}
