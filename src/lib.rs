pub mod codec;
pub mod config;
pub mod db;
pub mod models;
pub mod reconcile;
pub mod sink;
pub mod soap;
pub mod worker;

mod credential_audit;

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}
