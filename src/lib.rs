pub mod dashboard;
pub mod error;
pub mod export;
pub mod poller;
pub mod sahha_api;
pub mod server;
pub mod state;
pub mod store;
pub mod synthesis;
pub mod types;
pub mod webhook;

use std::net::SocketAddr;
use std::sync::Arc;

use error::PulseError;
use state::AppState;

/// Start the refresh loop and HTTP server; returns after Ctrl-C.
pub fn run() -> Result<(), PulseError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let state = Arc::new(AppState::new());
        let config = state.current_config();
        let addr: SocketAddr = config.server.bind_addr.parse().map_err(|e| {
            PulseError::Configuration(format!(
                "Invalid bindAddr '{}': {}",
                config.server.bind_addr, e
            ))
        })?;

        if config.sahha.is_complete() {
            log::info!("Sahha credentials found ({:?})", config.sahha.environment);
        } else {
            log::info!(
                "No Sahha credentials; serving {} demo profiles",
                config.demo_profile_count
            );
        }

        let refresh = tokio::spawn(poller::run_refresh_loop(state.clone()));

        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::warn!("Ctrl-C handler unavailable: {e}");
                std::future::pending::<()>().await;
            }
            log::info!("Shutdown requested");
        };

        let served = server::serve(state, addr, shutdown).await;
        refresh.abort();
        served
    })
}
