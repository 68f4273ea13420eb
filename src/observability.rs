//! Tracing setup.
//!
//! The subscriber is installed once per process. Format is a config concern
//! (`HostConfig::log_format`), not read from the environment here; the filter
//! honors `RUST_LOG` and otherwise defaults to this crate at info with
//! everything else at warn, so provider/HTTP internals stay quiet unless
//! asked for.

use crate::types::config::LogFormat;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static TRACING_INIT: OnceLock<()> = OnceLock::new();

fn default_filter() -> EnvFilter {
    EnvFilter::new("warn,gatehost=info")
}

/// Install the global subscriber. Later calls are no-ops, so the chosen
/// format is whichever the first caller passed.
pub fn init_tracing(format: LogFormat) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter());

        let result = match format {
            LogFormat::Json => tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_current_span(false))
                .try_init(),
            LogFormat::Text => tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().with_target(false))
                .try_init(),
        };

        if let Err(err) = result {
            eprintln!("tracing init skipped: {err}");
        }
    });
}
