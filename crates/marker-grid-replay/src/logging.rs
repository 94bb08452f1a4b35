/*!
Logging setup for the replay tool.

`RUST_LOG` is respected when set. Otherwise debug builds default to `debug` and
release builds to `info`. Log lines go to stderr so stdout stays machine-readable.
*/

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

fn default_directives() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

pub fn setup_logging() {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) => EnvFilter::new(directives),
        Err(_) => EnvFilter::new(default_directives()),
    };

    let fmt_layer = fmt::layer().with_writer(std::io::stderr).with_filter(filter);
    tracing_subscriber::registry().with(fmt_layer).init();

    #[cfg(feature = "profiling")]
    tracing::info!("Logging initialized (profiling spans routed through tracing)");
    #[cfg(not(feature = "profiling"))]
    tracing::debug!("Logging initialized");
}
