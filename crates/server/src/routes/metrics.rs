use std::fmt::Write;

use analysis_worker::db::{fetch_stats, Stats};
use axum::{
    http::header,
    response::{IntoResponse, Response},
    Extension, Json,
};
use sqlx::PgPool;

use crate::error::AppError;

/// Prometheus text exposition format
const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// GET /metrics
pub async fn metrics(Extension(pool): Extension<PgPool>) -> Result<Response, AppError> {
    let stats = fetch_stats(&pool).await?;
    Ok(([(header::CONTENT_TYPE, CONTENT_TYPE)], render_metrics(&stats)).into_response())
}

/// GET /api/stats
pub async fn stats(Extension(pool): Extension<PgPool>) -> Result<Json<Stats>, AppError> {
    Ok(Json(fetch_stats(&pool).await?))
}

/// Render the aggregates as gauges.
pub fn render_metrics(stats: &Stats) -> String {
    let gauges: [(&str, &str, f64); 4] = [
        ("games_total", "Total games analyzed", stats.games as f64),
        ("moves_total", "Total moves across all games", stats.moves as f64),
        ("blunders_total", "Moves tagged as blunders", stats.blunders as f64),
        ("avg_loss", "Mean centipawn loss per move", stats.avg_loss),
    ];

    let mut out = String::new();
    for (name, help, value) in gauges {
        // Writing to a String cannot fail
        let _ = writeln!(out, "# HELP {name} {help}");
        let _ = writeln!(out, "# TYPE {name} gauge");
        let _ = writeln!(out, "{name} {value}");
    }
    out
}
