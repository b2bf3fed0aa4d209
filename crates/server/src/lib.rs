pub mod config;
pub mod error;
pub mod inbox;
pub mod routes;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Router,
};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;

/// Largest accepted upload body
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Build the HTTP router with its shared state attached.
pub fn app(pool: PgPool, config: Config) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/healthz", get(routes::health::healthz))
        .route(
            "/upload_pgn",
            post(routes::upload::upload_pgn).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/metrics", get(routes::metrics::metrics))
        .route("/api/stats", get(routes::metrics::stats))
        .layer(Extension(pool))
        .layer(Extension(config))
        .layer(cors)
}
