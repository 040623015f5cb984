//! Tracing setup for the `flowc` binary.
//!
//! Logs go to stderr in compact form without timestamps. `RUST_LOG`, when
//! set, replaces the configured level.

use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry};

/// Build the filter for `level`, letting `RUST_LOG` take precedence.
pub fn filter(level: &str, debug: bool) -> EnvFilter {
    let level = if debug { "debug" } else { level };
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install the global subscriber. Returns false if one was already set.
pub fn init(level: &str, debug: bool) -> bool {
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(debug)
        .compact()
        .with_filter(filter(level, debug));

    Registry::default().with(layer).try_init().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_rejected() {
        init("warn", false);
        assert!(!init("debug", true));
    }
}
