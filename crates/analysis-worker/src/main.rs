//! Analysis worker
//!
//! Watches the intake directory for PGN batch files and analyzes them with a
//! native Stockfish process.

use analysis_worker::config::WorkerConfig;
use analysis_worker::db::{create_pool, run_migrations, PgStore};
use analysis_worker::intake::{IntakeSettings, QueueRunner};
use analysis_worker::stockfish::StockfishLauncher;
use tokio::sync::watch;
use tracing::{info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load .env file for local dev
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // --once: a single poll cycle, then exit
    let once = std::env::args().skip(1).any(|arg| arg == "--once");

    let config = WorkerConfig::load()?;
    info!(
        pgn_dir = %config.pgn_dir.display(),
        stockfish_path = %config.stockfish_path,
        depth = config.depth,
        "Worker config loaded"
    );

    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;
    info!("Database ready");

    tokio::fs::create_dir_all(&config.pgn_dir).await?;

    let mut runner = QueueRunner::new(
        PgStore::new(pool),
        StockfishLauncher::new(&config),
        IntakeSettings::from(&config),
    );

    if once {
        let report = runner.run_cycle().await?;
        info!(
            done = report.done,
            retry = report.retry,
            failed = report.failed,
            "Single cycle finished"
        );
        return Ok(());
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown signal received, finishing current file");
        let _ = stop_tx.send(true);
    });

    runner.run(stop_rx).await;
    Ok(())
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
                return;
            }
            Err(e) => warn!(error = %e, "SIGTERM handler unavailable, using Ctrl-C only"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Ctrl-C handler failed");
        std::future::pending::<()>().await;
    }
}
