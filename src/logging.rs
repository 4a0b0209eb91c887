//! Subscriber installation for binaries. The library itself only emits
//! `tracing` events and never installs a global subscriber.

use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;

impl LoggingConfig {
    /// Installs a global subscriber writing to stderr. `RUST_LOG` wins over
    /// the configured level. Returns `false` when a subscriber was already set.
    pub fn init(&self) -> bool {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.format.as_str() {
            "json" => fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init()
                .is_ok(),
            _ => fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init()
                .is_ok(),
        }
    }
}
