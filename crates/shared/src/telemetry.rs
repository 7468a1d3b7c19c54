//! Tracing subscriber setup shared by the binaries.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,ledgerline=debug";

/// Installs the global subscriber. `LOG_FORMAT=json` switches to one JSON
/// object per line; anything else gives the human-readable format.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    if json_requested(std::env::var("LOG_FORMAT").ok().as_deref()) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn json_requested(format: Option<&str>) -> bool {
    format.is_some_and(|f| f.trim().eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some("json"), true)]
    #[case(Some(" JSON "), true)]
    #[case(Some("pretty"), false)]
    #[case(None, false)]
    fn test_json_requested(#[case] format: Option<&str>, #[case] expected: bool) {
        assert_eq!(json_requested(format), expected);
    }
}
