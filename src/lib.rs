pub mod types;
pub mod error;
pub mod config;
pub mod seeding;
pub mod match_set;
pub mod bracket;
pub mod store;
pub mod bracket_commands;
mod single_elim;
mod double_elim;
mod advance;
mod retract;
#[cfg(test)]
mod test_support;

pub use bracket::{clear_winner, generate_bracket, list_matches, set_winner};
pub use error::{BracketError, BracketResult};
pub use match_set::MatchSet;

use bracket_commands::*;
use config::*;
use store::TournamentStore;

use std::{fs, sync::Arc};
use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

// ── Bracket HTTP server ────────────────────────────────────────────────

pub fn bracket_router(state: BracketServerState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tournaments", get(list_tournaments).post(create_tournament))
        .route("/tournaments/:id", get(get_tournament))
        .route("/tournaments/:id/generate", post(generate))
        .route("/tournaments/:id/matches", get(list_tournament_matches))
        .route(
            "/tournaments/:id/matches/:match_id/winner",
            post(set_match_winner).delete(clear_match_winner),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn start_bracket_server(state: BracketServerState, addr: &str) {
    let app = bracket_router(state);
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("bracket server failed to bind {addr}: {e}");
            return;
        }
    };
    info!("bracket server listening at http://{addr}/");
    if let Err(e) = axum::serve(listener, app).await {
        error!("bracket server error: {e}");
    }
}

// ── Entry point ────────────────────────────────────────────────────────

pub fn run() {
    load_env_file();
    let (config, config_error) = match load_config_inner() {
        Ok(config) => (config, None),
        Err(e) => (apply_env_defaults(AppConfig::default()), Some(e)),
    };

    // Initialize tracing with a daily rolling file
    let logs_dir = config.logs_dir();
    fs::create_dir_all(&logs_dir).ok();
    let file_appender = tracing_appender::rolling::daily(&logs_dir, "bracket.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();
    info!("Bracket engine starting");
    if let Some(e) = config_error {
        warn!("{e}; falling back to defaults");
    }
    log_env_warnings(&config);

    let store = match TournamentStore::load(config.data_dir()) {
        Ok(store) => store,
        Err(e) => {
            error!("failed to open tournament store: {e}");
            return;
        }
    };
    let state = BracketServerState {
        store: Arc::new(store),
        defaults: config.default_settings(),
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to start async runtime: {e}");
            return;
        }
    };
    runtime.block_on(start_bracket_server(state, config.bind_addr()));
}
