//! Upload staging for the intake directory
//!
//! Bytes land in `<uuid>.pgn.part` first and become `<uuid>.pgn` with a
//! single rename, so the worker never sees a half-written batch.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

const PART_SUFFIX: &str = ".part";

pub struct Upload {
    file: File,
    part: PathBuf,
    target: PathBuf,
    name: String,
    bytes: u64,
}

impl Upload {
    /// Open a fresh staging file in `inbox`, creating the directory if needed.
    pub async fn create(inbox: &Path) -> io::Result<Self> {
        fs::create_dir_all(inbox).await?;

        let name = format!("{}.pgn", Uuid::new_v4());
        let target = inbox.join(&name);
        let part = inbox.join(format!("{name}{PART_SUFFIX}"));
        let file = File::create(&part).await?;

        Ok(Self {
            file,
            part,
            target,
            name,
            bytes: 0,
        })
    }

    pub async fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.file.write_all(chunk).await?;
        self.bytes += chunk.len() as u64;
        Ok(())
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes
    }

    /// Flush to disk and publish under the final name.
    pub async fn finish(mut self) -> io::Result<String> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        fs::rename(&self.part, &self.target).await?;
        Ok(self.name)
    }

    /// Drop the staging file.
    pub async fn abort(self) {
        drop(self.file);
        if let Err(e) = fs::remove_file(&self.part).await {
            tracing::warn!(file = %self.part.display(), error = %e, "Failed to remove partial upload");
        }
    }
}
