//! Logging initialization.
//!
//! Installs a `tracing-subscriber` registry with an [`EnvFilter`] and a fmt
//! layer chosen by [`LoggingConfig`]. `RUST_LOG` takes precedence over the
//! configured level.

use std::sync::Once;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

static INIT: Once = Once::new();

/// Initialize logging once per process; later calls are no-ops.
///
/// Uses `try_init`, so an embedding application that already installed a
/// global subscriber keeps its own.
pub fn init_logging(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.level));
        let registry = tracing_subscriber::registry().with(filter);

        let result = match config.format {
            LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
            LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
            LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        };
        if let Err(e) = result {
            tracing::debug!(error = %e, "global subscriber already set");
        }
    });
}

/// Span for work on behalf of one node.
pub fn node_span(node_name: Option<&str>) -> tracing::Span {
    tracing::info_span!("raft_store", node = node_name.unwrap_or("local"))
}
