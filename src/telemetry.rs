//! Log output setup for the CLI and long-running hosts.

use tracing_subscriber::{prelude::*, EnvFilter};

/// Installs the global subscriber. `RUST_LOG` wins over `default_level`.
/// Returns false if a subscriber was already installed.
pub fn init(default_level: &str) -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()
        .is_ok()
}
