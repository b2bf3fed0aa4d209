//! Intake queue runner
//!
//! Polls a directory for `*.pgn` batch files and processes each one at most
//! once: every game in a file is written inside one sink transaction, and the
//! file is renamed to `*.done` only after that transaction commits. Any error
//! before the commit leaves the file in place for the next cycle.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::analysis::Severity;
use crate::analyzer::analyze_game;
use crate::config::WorkerConfig;
use crate::db::{store_game, BatchKey, GameSink, Store};
use crate::error::WorkerError;
use crate::oracle::{Oracle, OracleFactory};

const PENDING_EXT: &str = "pgn";
const DONE_EXT: &str = "done";
const FAILED_EXT: &str = "failed";

/// Lifecycle of a batch file, encoded in its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    /// `*.pgn`, waiting for a cycle
    Pending,
    /// Held by the runner; still named `*.pgn` on disk
    Processing,
    /// `*.done`, committed
    Done,
    /// `*.failed`, given up after too many attempts
    Failed,
}

impl FileState {
    pub fn as_str(self) -> &'static str {
        match self {
            FileState::Pending => "pending",
            FileState::Processing => "processing",
            FileState::Done => "done",
            FileState::Failed => "failed",
        }
    }

    /// State implied by a file's extension, if it is an intake file at all.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            PENDING_EXT => Some(FileState::Pending),
            DONE_EXT => Some(FileState::Done),
            FAILED_EXT => Some(FileState::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Knobs the runner needs from [`WorkerConfig`].
#[derive(Debug, Clone)]
pub struct IntakeSettings {
    pub pgn_dir: PathBuf,
    pub poll_interval: Duration,
    pub max_attempts: Option<u32>,
}

impl From<&WorkerConfig> for IntakeSettings {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            pgn_dir: config.pgn_dir.clone(),
            poll_interval: config.poll_interval,
            max_attempts: config.max_attempts,
        }
    }
}

/// Outcome counts of one poll cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub done: usize,
    pub retry: usize,
    pub failed: usize,
}

impl CycleReport {
    pub fn is_empty(&self) -> bool {
        self.done + self.retry + self.failed == 0
    }
}

/// List pending batch files in `dir`, sorted by name.
pub fn list_pending(dir: &Path) -> Result<Vec<PathBuf>, WorkerError> {
    let dir = glob::Pattern::escape(&dir.to_string_lossy());
    let pattern = format!("{dir}/*.{PENDING_EXT}");

    let mut files = Vec::new();
    for entry in glob::glob(&pattern)? {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Skipping unreadable intake entry"),
        }
    }
    files.sort();
    Ok(files)
}

/// Where a pending file goes once it reaches `state`.
pub fn renamed(path: &Path, state: FileState) -> PathBuf {
    match state {
        FileState::Done => path.with_extension(DONE_EXT),
        FileState::Failed => path.with_extension(FAILED_EXT),
        FileState::Pending | FileState::Processing => path.with_extension(PENDING_EXT),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

pub struct QueueRunner<S, F> {
    store: S,
    oracles: F,
    settings: IntakeSettings,
    attempts: HashMap<PathBuf, u32>,
}

impl<S, F> QueueRunner<S, F>
where
    S: Store,
    F: OracleFactory,
{
    pub fn new(store: S, oracles: F, settings: IntakeSettings) -> Self {
        Self {
            store,
            oracles,
            settings,
            attempts: HashMap::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn oracles(&self) -> &F {
        &self.oracles
    }

    /// Poll until `shutdown` flips to `true`. A file in flight is always
    /// finished before the runner stops.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            dir = %self.settings.pgn_dir.display(),
            interval_secs = self.settings.poll_interval.as_secs(),
            "Intake runner started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.cycle(Some(&shutdown)).await {
                Ok(report) if !report.is_empty() => info!(
                    done = report.done,
                    retry = report.retry,
                    failed = report.failed,
                    "Poll cycle finished"
                ),
                Ok(_) => {}
                Err(e) => error!(error = %e, "Failed to list intake directory"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
                changed = shutdown.changed() => {
                    // Sender gone: nobody can ask us to stop any more, keep polling.
                    if changed.is_err() {
                        tokio::time::sleep(self.settings.poll_interval).await;
                    }
                }
            }
        }

        info!("Intake runner stopped");
    }

    /// Process every pending file once.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, WorkerError> {
        self.cycle(None).await
    }

    async fn cycle(
        &mut self,
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> Result<CycleReport, WorkerError> {
        let mut report = CycleReport::default();
        let pending = list_pending(&self.settings.pgn_dir)?;

        // Files removed from outside lose their failure history.
        self.attempts.retain(|path, _| pending.contains(path));

        for path in pending {
            if shutdown.is_some_and(|rx| *rx.borrow()) {
                debug!("Shutdown requested, leaving remaining files pending");
                break;
            }

            match self.process_file(&path).await {
                FileState::Done => report.done += 1,
                FileState::Failed => report.failed += 1,
                FileState::Pending | FileState::Processing => report.retry += 1,
            }
        }

        Ok(report)
    }

    /// Drive one file to its next state. Errors are logged, never returned.
    pub async fn process_file(&mut self, path: &Path) -> FileState {
        let name = file_name(path);
        debug!(file = %name, state = %FileState::Processing, "Picked up batch file");

        let outcome = match self.ingest(path, &name).await {
            Ok(games) => {
                info!(file = %name, games, "Batch committed");
                self.transition(path, &name, FileState::Done).await
            }
            Err(e) => {
                error!(file = %name, error = %e, "Batch failed, nothing committed");
                self.record_failure(path, &name).await
            }
        };

        if outcome != FileState::Pending {
            self.attempts.remove(path);
        }
        outcome
    }

    /// Analyze and commit every game in the file. Returns the number of games.
    async fn ingest(&self, path: &Path, name: &str) -> Result<usize, WorkerError> {
        let bytes = tokio::fs::read(path).await?;
        let key = BatchKey::new(name, &bytes);

        // Committed earlier but the rename never happened
        if self.store.is_committed(&key).await? {
            warn!(file = %name, digest = %key.digest, "Batch already committed, only renaming");
            return Ok(0);
        }

        let games = chess_core::parse_games(bytes.as_slice())?;
        debug!(file = %name, games = games.len(), "Parsed batch");

        let mut oracle = self.oracles.open().await?;
        let mut batch = self.store.begin(&key).await?;

        for (idx, game) in games.iter().enumerate() {
            let analysis = analyze_game(&mut oracle, game).await?;
            let game_id = store_game(&mut batch, &analysis).await?;

            let blunders = analysis
                .moves
                .iter()
                .filter(|m| m.severity == Severity::Blunder)
                .count();
            info!(
                file = %name,
                game = idx + 1,
                game_id,
                white = analysis.summary.white.as_deref().unwrap_or("?"),
                black = analysis.summary.black.as_deref().unwrap_or("?"),
                plies = analysis.summary.total_ply,
                blunders,
                "Game analyzed"
            );
        }

        batch.commit().await?;
        oracle.close().await;
        Ok(games.len())
    }

    async fn record_failure(&mut self, path: &Path, name: &str) -> FileState {
        let attempts = self.attempts.entry(path.to_path_buf()).or_insert(0);
        *attempts += 1;
        let attempts = *attempts;

        match self.settings.max_attempts {
            Some(max) if attempts >= max => {
                warn!(file = %name, attempts, "Giving up on batch file");
                self.transition(path, name, FileState::Failed).await
            }
            _ => {
                debug!(file = %name, attempts, "Batch left pending");
                FileState::Pending
            }
        }
    }

    /// Rename a pending file. A failed rename keeps it pending, and an
    /// existing target is never overwritten.
    async fn transition(&self, path: &Path, name: &str, state: FileState) -> FileState {
        let target = renamed(path, state);
        match tokio::fs::try_exists(&target).await {
            Ok(false) => {}
            Ok(true) => {
                error!(
                    file = %name,
                    target = %target.display(),
                    "Target name already taken, leaving batch file pending"
                );
                return FileState::Pending;
            }
            Err(e) => {
                error!(file = %name, error = %e, "Failed to check rename target");
                return FileState::Pending;
            }
        }

        match tokio::fs::rename(path, &target).await {
            Ok(()) => {
                debug!(file = %name, state = %state, "Batch file renamed");
                state
            }
            Err(e) => {
                error!(file = %name, state = %state, error = %e, "Failed to rename batch file");
                FileState::Pending
            }
        }
    }
}
