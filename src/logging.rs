//! A small `tracing-subscriber` initializer for binaries and tests that
//! want human-readable output, mirroring the `Registry`/`EnvFilter`
//! setup used by this codebase's example producers/consumers.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Installs a global `tracing` subscriber that writes to stdout,
/// honoring `RUST_LOG` and otherwise defaulting to `info`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init() {
    let _ = Registry::default()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}
