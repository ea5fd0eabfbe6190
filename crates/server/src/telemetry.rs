//! Tracing subscriber initialization.
//!
//! Installs a [`tracing_subscriber`] registry with an [`EnvFilter`] read from
//! `RUST_LOG` (default `info`) and the standard `fmt` layer. Audit records
//! written by the `log` backend arrive here under the `procgate::audit`
//! target and can be filtered separately.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize the global tracing subscriber.
///
/// Calling this twice is harmless: the second installation attempt is
/// ignored.
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
