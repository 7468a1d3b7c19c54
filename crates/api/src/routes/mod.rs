//! API route definitions.

use std::str::FromStr;

use axum::{Router, body::Bytes, middleware};
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::{AppState, middleware::auth_middleware};

pub mod approvals;
pub mod audit;
pub mod fx;
pub mod health;
pub mod journal_entries;

/// Creates the API router: `/health` is public, everything else needs a
/// bearer token.
#[allow(clippy::needless_pass_by_value)]
pub fn api_routes_with_state(state: AppState) -> Router<AppState> {
    let protected_routes = Router::new()
        .merge(journal_entries::routes())
        .merge(approvals::routes())
        .merge(fx::routes())
        .merge(audit::routes())
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(health::routes())
        .merge(protected_routes)
}

/// Parses a path id, answering 400 in the usual error shape when malformed.
pub(crate) fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid {what} id '{raw}'")))
}

/// Decodes an optional JSON body; an empty body yields the default.
pub(crate) fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    json(body)
}

/// Decodes a required JSON body.
pub(crate) fn json<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Invalid request body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerline_shared::types::JournalEntryId;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Body {
        version: Option<i64>,
    }

    #[test]
    fn test_empty_body_is_default() {
        let parsed: Body = optional_json(&Bytes::from_static(b"  ")).unwrap();
        assert_eq!(parsed, Body::default());
    }

    #[test]
    fn test_optional_body_is_parsed() {
        let parsed: Body = optional_json(&Bytes::from_static(br#"{"version": 3}"#)).unwrap();
        assert_eq!(parsed.version, Some(3));
    }

    #[test]
    fn test_malformed_id_is_bad_request() {
        let err = parse_id::<JournalEntryId>("not-a-uuid", "journal entry").unwrap_err();
        assert!(matches!(err, ApiError::App(ledgerline_shared::AppError::BadRequest(_))));
    }
}
