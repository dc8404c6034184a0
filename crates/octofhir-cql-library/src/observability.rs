//! Log filter control driven by [`LoggingConfig`].
//!
//! Library code only emits `tracing` events. [`init_tracing`] installs a fmt
//! subscriber for hosts that have none; later calls only move the level.

use crate::config::LoggingConfig;
use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

type FilterHandle = reload::Handle<EnvFilter, Registry>;

static FILTER_HANDLE: OnceLock<FilterHandle> = OnceLock::new();

/// Install the subscriber on first use, honouring `RUST_LOG` over the
/// configured level. Once installed, apply the configured level instead.
///
/// Returns `false` when another subscriber was already installed.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    if FILTER_HANDLE.get().is_some() {
        apply_logging_level(&config.level);
        return true;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let (layer, handle) = reload::Layer::new(filter);
    let installed = tracing_subscriber::registry()
        .with(layer)
        .with(fmt::layer())
        .try_init()
        .is_ok();

    if installed {
        let _ = FILTER_HANDLE.set(handle);
    } else {
        tracing::debug!("A tracing subscriber is already installed, leaving it in place");
    }
    installed
}

/// Replace the active filter. No-op unless [`init_tracing`] installed the
/// subscriber.
pub fn apply_logging_level(level: &str) {
    let Some(handle) = FILTER_HANDLE.get() else {
        return;
    };
    if let Err(e) = handle.modify(|filter| *filter = EnvFilter::new(level)) {
        tracing::warn!(level, error = %e, "Failed to change log level");
    }
}

/// Directives of the filter installed by [`init_tracing`].
pub fn active_filter() -> Option<String> {
    FILTER_HANDLE
        .get()
        .and_then(|handle| handle.with_current(ToString::to_string).ok())
}
