pub mod api;
pub mod audit;
pub mod clients;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod render;
pub mod security;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{Error, Result};
pub use state::SharedState;

use tracing::info;
use tracing_subscriber::EnvFilter;

/// Initializes logging, opens the store and serves the HTTP API until the
/// process is told to stop.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!(
        "vmbroker v{} starting (service: {})",
        env!("CARGO_PKG_VERSION"),
        config.general.service
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = SharedState::new(config).await?;
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
