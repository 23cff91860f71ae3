//! Tracing/logging initialization from `RuntimeConfig`.

use crate::{LogFormat, RuntimeConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Wires `tracing-subscriber`'s `EnvFilter` (falling back to `config.logging.level`,
/// which itself defaults to `info`) with a text or JSON layer, selected by
/// `config.logging.format`, and sets it as the global default.
///
/// Idempotent: a second call after the global subscriber is already set is a
/// no-op rather than a panic.
pub fn init_tracing(config: &RuntimeConfig) {
    let env_filter = EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    let _ = match config.logging.format {
        LogFormat::Json => tracing::subscriber::set_global_default(registry.with(fmt::layer().json())),
        LogFormat::Text => tracing::subscriber::set_global_default(registry.with(fmt::layer())),
    };
}
