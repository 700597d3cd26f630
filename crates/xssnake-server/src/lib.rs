pub mod config;
pub mod game_loop;
pub mod health;
pub mod rate_limit;
pub mod room;
pub mod room_manager;
pub mod state;
pub mod timers;
pub mod ws;

use axum::Router;
use tower_http::cors::CorsLayer;

use config::ServerConfig;
use state::AppState;

pub use game_loop::spawn_ticker;

/// Build the Axum router and application state from a config. The caller
/// starts the ticker with [`spawn_ticker`].
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    let state = AppState::new(config);

    let app = Router::new()
        .route("/ws", axum::routing::get(ws::ws_handler))
        .route("/health", axum::routing::get(health::health_check))
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    (app, state)
}
