//! Worker configuration from environment variables

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::WorkerError;

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Database connection URL
    pub database_url: String,

    /// Directory watched for `*.pgn` batch files
    pub pgn_dir: PathBuf,

    /// Path to Stockfish binary
    pub stockfish_path: String,

    /// Fixed search depth per position
    pub depth: u32,

    /// Sleep between directory polls
    pub poll_interval: Duration,

    /// Upper bound on a single evaluation; `None` waits forever
    pub oracle_timeout: Option<Duration>,

    /// Consecutive failures before a file is moved aside as `*.failed`.
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, WorkerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, WorkerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| WorkerError::Config("DATABASE_URL not set".into()))?;

        let pgn_dir = lookup("PGN_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/data/inbox"));

        let stockfish_path =
            lookup("STOCKFISH_PATH").unwrap_or_else(|| "/usr/local/bin/stockfish".to_string());

        let depth = parse_or(&lookup, "ENGINE_DEPTH", 12)?;
        if depth == 0 {
            return Err(WorkerError::Config("ENGINE_DEPTH must be at least 1".into()));
        }

        let poll_interval = Duration::from_secs(parse_or(&lookup, "POLL_INTERVAL_SECS", 3)?);

        // 0 disables the timeout
        let oracle_timeout = match parse_or(&lookup, "ORACLE_TIMEOUT_SECS", 60)? {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let max_attempts = match lookup("MAX_ATTEMPTS") {
            Some(v) => Some(v.parse::<u32>().map_err(|_| {
                WorkerError::Config(format!("MAX_ATTEMPTS is not a number: {v}"))
            })?)
            .filter(|n| *n > 0),
            None => None,
        };

        Ok(Self {
            database_url,
            pgn_dir,
            stockfish_path,
            depth,
            poll_interval,
            oracle_timeout,
            max_attempts,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, WorkerError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| WorkerError::Config(format!("{key} is not a number: {v}"))),
        None => Ok(default),
    }
}
