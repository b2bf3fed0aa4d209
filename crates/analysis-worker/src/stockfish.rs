//! Stockfish engine wrapper using UCI protocol (async I/O)

use std::future::Future;
use std::time::Duration;

use shakmaty::{fen::Fen, Chess, EnPassantMode};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use tracing::debug;

use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::oracle::{Oracle, OracleFactory, Score};

/// Stockfish engine instance
pub struct StockfishEngine {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    depth: u32,
    timeout: Option<Duration>,
}

impl StockfishEngine {
    /// Spawn a new Stockfish process and initialize UCI
    pub async fn new(
        path: &str,
        depth: u32,
        timeout: Option<Duration>,
    ) -> Result<Self, WorkerError> {
        let mut process = Command::new(path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| WorkerError::Stockfish(format!("Failed to spawn Stockfish: {e}")))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| WorkerError::Stockfish("Stockfish stdin unavailable".into()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| WorkerError::Stockfish("Stockfish stdout unavailable".into()))?;

        let mut engine = Self {
            process,
            stdin,
            stdout: BufReader::new(stdout),
            depth,
            timeout,
        };

        // Initialize UCI
        engine.send("uci").await?;
        bounded(timeout, engine.wait_for("uciok")).await?;

        // Configure for analysis
        engine.send("setoption name Threads value 1").await?;
        engine.send("setoption name UCI_AnalyseMode value true").await?;
        engine.send("isready").await?;
        bounded(timeout, engine.wait_for("readyok")).await?;

        Ok(engine)
    }

    /// Send a command to Stockfish
    async fn send(&mut self, cmd: &str) -> Result<(), WorkerError> {
        debug!(cmd, "SF <");
        self.stdin
            .write_all(format!("{cmd}\n").as_bytes())
            .await
            .map_err(|e| WorkerError::Stockfish(format!("Failed to write to Stockfish: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| WorkerError::Stockfish(format!("Failed to flush stdin: {e}")))?;
        Ok(())
    }

    async fn read_line(&mut self, line: &mut String) -> Result<(), WorkerError> {
        line.clear();
        let bytes = self
            .stdout
            .read_line(line)
            .await
            .map_err(|e| WorkerError::Stockfish(format!("Failed to read from Stockfish: {e}")))?;
        if bytes == 0 {
            return Err(WorkerError::Stockfish("Stockfish closed its output".into()));
        }
        Ok(())
    }

    /// Wait for a specific response line
    async fn wait_for(&mut self, expected: &str) -> Result<(), WorkerError> {
        let mut line = String::new();
        loop {
            self.read_line(&mut line).await?;
            let trimmed = line.trim();
            debug!(line = trimmed, "SF >");
            if trimmed == expected {
                return Ok(());
            }
        }
    }

    /// Read search output up to `bestmove`, keeping the deepest exact score
    async fn read_search(&mut self) -> Result<Score, WorkerError> {
        let mut score = None;
        let mut line = String::new();
        loop {
            self.read_line(&mut line).await?;
            let trimmed = line.trim();

            if trimmed.starts_with("info") {
                if let Some(parsed) = parse_score(trimmed) {
                    score = Some(parsed);
                }
            } else if trimmed.starts_with("bestmove") {
                debug!(line = trimmed, "SF >");
                break;
            }
        }

        score.ok_or_else(|| WorkerError::Stockfish("Search finished without a score".into()))
    }

    /// Send quit command and wait for process to exit
    pub async fn quit(&mut self) {
        let _ = self.send("quit").await;
        let _ = self.process.wait().await;
    }
}

impl Oracle for StockfishEngine {
    async fn evaluate(&mut self, position: &Chess) -> Result<Score, WorkerError> {
        let fen = Fen::from_position(position, EnPassantMode::Legal);
        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!("go depth {}", self.depth)).await?;

        let timeout = self.timeout;
        bounded(timeout, self.read_search()).await
    }

    async fn new_game(&mut self) -> Result<(), WorkerError> {
        self.send("ucinewgame").await?;
        self.send("isready").await?;
        let timeout = self.timeout;
        bounded(timeout, self.wait_for("readyok")).await
    }

    async fn close(mut self) {
        self.quit().await;
    }
}

/// Spawns one engine process per batch file.
#[derive(Clone, Debug)]
pub struct StockfishLauncher {
    path: String,
    depth: u32,
    timeout: Option<Duration>,
}

impl StockfishLauncher {
    pub fn new(config: &WorkerConfig) -> Self {
        Self {
            path: config.stockfish_path.clone(),
            depth: config.depth,
            timeout: config.oracle_timeout,
        }
    }
}

impl OracleFactory for StockfishLauncher {
    type Oracle = StockfishEngine;

    async fn open(&self) -> Result<StockfishEngine, WorkerError> {
        StockfishEngine::new(&self.path, self.depth, self.timeout).await
    }
}

impl Drop for StockfishEngine {
    fn drop(&mut self) {
        // Best-effort synchronous kill in drop
        let _ = self.process.start_kill();
    }
}

async fn bounded<T, F>(limit: Option<Duration>, fut: F) -> Result<T, WorkerError>
where
    F: Future<Output = Result<T, WorkerError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| WorkerError::OracleTimeout(limit))?,
        None => fut.await,
    }
}

/// Parse the score of an `info` line. Bound scores and `info string` are ignored.
fn parse_score(line: &str) -> Option<Score> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.get(1) == Some(&"string")
        || parts.contains(&"lowerbound")
        || parts.contains(&"upperbound")
    {
        return None;
    }
    let idx = parts.iter().position(|p| *p == "score")?;
    let value: i32 = parts.get(idx + 2)?.parse().ok()?;
    match *parts.get(idx + 1)? {
        "cp" => Some(Score::Cp(value)),
        "mate" => Some(Score::Mate(value)),
        _ => None,
    }
}
