//! Logging setup shared by the Critterkeep binaries and tests.

use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber at INFO.
pub fn init() {
    init_with_level(Level::INFO);
}

/// Initialize the tracing subscriber with a specific log level for the
/// `critterkeep*` targets. `RUST_LOG` still applies to everything else.
///
/// Safe to call more than once; later calls are ignored.
///
/// # Examples
///
/// ```
/// use critterkeep_common::logging;
///
/// logging::init_with_level(tracing::Level::DEBUG);
/// ```
pub fn init_with_level(level: Level) {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("critterkeep={}", level).parse() {
        filter = filter.add_directive(directive);
    }

    // try_init: a global subscriber may already be set (tests, embedding)
    let result = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_thread_ids(true)
                .with_thread_names(true),
        )
        .with(filter)
        .try_init();

    if result.is_ok() {
        info!("Logging initialized at level: {}", level);
    }
}
