#![allow(dead_code)]

//! Shared fixtures: an in-memory sink and a scripted oracle.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use analysis_worker::db::{BatchKey, GameSink, Store};
use analysis_worker::intake::IntakeSettings;
use analysis_worker::oracle::{Oracle, OracleFactory, Score};
use analysis_worker::{GameSummary, MoveRecord, WorkerError};
use shakmaty::Chess;

pub const TWO_GAMES: &str = r#"[Event "Club night"]
[White "Alice"]
[Black "Bob"]
[Result "*"]

1. e4 e5 *

[Event "Club night"]
[White "Carol"]
[Black "Dave"]
[Result "*"]

1. d4 d5 *
"#;

pub const FOUR_PLY: &str = r#"[White "Alice"]
[Black "Bob"]
[Result "*"]

1. e4 e5 2. Nf3 Nc6 *
"#;

#[derive(Debug, Clone)]
pub struct GameRow {
    pub id: i64,
    pub source_file: String,
    pub digest: String,
    pub summary: GameSummary,
}

#[derive(Debug, Clone)]
pub struct MoveRow {
    pub game_id: i64,
    pub record: MoveRecord,
}

#[derive(Debug, Default)]
pub struct Tables {
    pub games: Vec<GameRow>,
    pub moves: Vec<MoveRow>,
    next_id: i64,
}

/// One-shot sink failures, consumed by the next batch that hits them.
#[derive(Debug, Default)]
pub struct Faults {
    /// Fail the n-th `insert_move` of a batch (1-based)
    pub move_at: Option<usize>,
    /// Fail the next commit
    pub commit: bool,
}

/// Sink whose batches become visible only on commit.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<Mutex<Faults>>,
}

impl MemoryStore {
    pub fn fail_move_at(&self, n: usize) {
        self.faults.lock().unwrap().move_at = Some(n);
    }

    pub fn fail_next_commit(&self) {
        self.faults.lock().unwrap().commit = true;
    }

    /// Commit a batch of header-only games, as if a past run got that far.
    pub async fn seed(&self, key: &BatchKey, games: usize) {
        let mut batch = self.begin(key).await.unwrap();
        for _ in 0..games {
            let summary = GameSummary {
                white: None,
                black: None,
                result: None,
                total_ply: 0,
            };
            batch.insert_game(&summary).await.unwrap();
        }
        batch.commit().await.unwrap();
    }

    pub fn games(&self) -> Vec<GameRow> {
        self.tables.lock().unwrap().games.clone()
    }

    pub fn moves(&self) -> Vec<MoveRow> {
        self.tables.lock().unwrap().moves.clone()
    }
}

pub struct MemoryBatch {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<Mutex<Faults>>,
    key: BatchKey,
    games: Vec<GameRow>,
    moves: Vec<MoveRow>,
    next_id: i64,
}

impl Store for MemoryStore {
    type Batch = MemoryBatch;

    async fn begin(&self, key: &BatchKey) -> Result<MemoryBatch, WorkerError> {
        let next_id = self.tables.lock().unwrap().next_id;
        Ok(MemoryBatch {
            tables: self.tables.clone(),
            faults: self.faults.clone(),
            key: key.clone(),
            games: Vec::new(),
            moves: Vec::new(),
            next_id,
        })
    }

    async fn is_committed(&self, key: &BatchKey) -> Result<bool, WorkerError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .games
            .iter()
            .any(|g| g.source_file == key.source_file && g.digest == key.digest))
    }
}

impl GameSink for MemoryBatch {
    async fn insert_game(&mut self, summary: &GameSummary) -> Result<i64, WorkerError> {
        self.next_id += 1;
        self.games.push(GameRow {
            id: self.next_id,
            source_file: self.key.source_file.clone(),
            digest: self.key.digest.clone(),
            summary: summary.clone(),
        });
        Ok(self.next_id)
    }

    async fn insert_move(&mut self, game_id: i64, record: &MoveRecord) -> Result<(), WorkerError> {
        {
            let mut faults = self.faults.lock().unwrap();
            if faults.move_at == Some(self.moves.len() + 1) {
                faults.move_at = None;
                return Err(WorkerError::Database(sqlx::Error::PoolTimedOut));
            }
        }
        self.moves.push(MoveRow {
            game_id,
            record: record.clone(),
        });
        Ok(())
    }

    async fn commit(self) -> Result<(), WorkerError> {
        if std::mem::take(&mut self.faults.lock().unwrap().commit) {
            return Err(WorkerError::Database(sqlx::Error::WorkerCrashed));
        }
        let mut tables = self.tables.lock().unwrap();
        tables.next_id = tables.next_id.max(self.next_id);
        tables.games.extend(self.games);
        tables.moves.extend(self.moves);
        Ok(())
    }
}

/// Behavior of one oracle handed out by [`ScriptedFactory`].
#[derive(Debug, Clone)]
pub enum Plan {
    /// Side-to-move centipawns, in request order
    Scores(Vec<i32>),
    /// Same score for every request
    Constant(i32),
    /// Answer `n` requests with 0, then fail
    FailAfter(usize),
}

#[derive(Default)]
pub struct Counters {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub evaluations: AtomicUsize,
}

pub struct ScriptedOracle {
    scores: VecDeque<i32>,
    plan: Plan,
    calls: usize,
    counters: Arc<Counters>,
}

impl Oracle for ScriptedOracle {
    async fn evaluate(&mut self, _position: &Chess) -> Result<Score, WorkerError> {
        self.calls += 1;
        self.counters.evaluations.fetch_add(1, Ordering::SeqCst);
        match &self.plan {
            Plan::Scores(_) => self
                .scores
                .pop_front()
                .map(Score::Cp)
                .ok_or_else(|| WorkerError::Stockfish("script exhausted".into())),
            Plan::Constant(cp) => Ok(Score::Cp(*cp)),
            Plan::FailAfter(n) if self.calls <= *n => Ok(Score::Cp(0)),
            Plan::FailAfter(_) => Err(WorkerError::Stockfish("engine crashed".into())),
        }
    }

    async fn close(self) {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hands out oracles following queued plans; `fallback` once the queue is empty.
pub struct ScriptedFactory {
    plans: Mutex<VecDeque<Plan>>,
    fallback: Plan,
    pub counters: Arc<Counters>,
}

impl ScriptedFactory {
    pub fn new(plans: Vec<Plan>, fallback: Plan) -> Self {
        Self {
            plans: Mutex::new(plans.into()),
            fallback,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn always(plan: Plan) -> Self {
        Self::new(Vec::new(), plan)
    }

    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }
}

impl OracleFactory for ScriptedFactory {
    type Oracle = ScriptedOracle;

    async fn open(&self) -> Result<ScriptedOracle, WorkerError> {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        let plan = self
            .plans
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        let scores = match &plan {
            Plan::Scores(values) => values.iter().copied().collect(),
            _ => VecDeque::new(),
        };
        Ok(ScriptedOracle {
            scores,
            plan,
            calls: 0,
            counters: self.counters.clone(),
        })
    }
}

pub fn settings(dir: &Path, max_attempts: Option<u32>) -> IntakeSettings {
    IntakeSettings {
        pgn_dir: dir.to_path_buf(),
        poll_interval: Duration::from_millis(20),
        max_attempts,
    }
}

pub fn write_batch(dir: &Path, name: &str, pgn: &str) {
    std::fs::write(dir.join(name), pgn).unwrap();
}

/// File names in `dir`, sorted.
pub fn listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
