use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use xssnake_server::config::ServerConfig;
use xssnake_server::{build_app, spawn_ticker};

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("XSSNAKE_LOG_JSON").is_ok_and(|v| v == "1" || v == "true") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = ServerConfig::load();
    config.validate();

    let addr = config.listen_addr.clone();
    let tick_rate_hz = config.tick_rate_hz;
    let (app, state) = build_app(config);
    let ticker = spawn_ticker(Arc::clone(&state.rooms), tick_rate_hz);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        },
    };
    tracing::info!(addr = %addr, tick_rate_hz, "xssnake server listening");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutting down");
    };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        tracing::error!(error = %e, "Server error");
    }
    ticker.abort();
}
