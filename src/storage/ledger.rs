//! Append-only audit ledger.
//!
//! Every completed run is written as one JSON object per line. Appends are
//! serialized through an async mutex and written with a single `write_all`,
//! so records from concurrent runs never interleave. A failed write is cut
//! back off the file; if that is impossible the next record starts on a
//! fresh line, so one torn record never swallows the next.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::PipelineRun;
use crate::error::AlignmentResult;

/// Durable store for completed pipeline runs.
#[async_trait]
pub trait AuditLedger: Send + Sync {
    /// Append one record.
    async fn append(&self, run: &PipelineRun) -> AlignmentResult<()>;

    /// Find the record for a run, if one was written.
    async fn find(&self, run_id: Uuid) -> AlignmentResult<Option<PipelineRun>>;

    /// Short description for health reporting.
    fn describe(&self) -> String;
}

/// JSON Lines file ledger.
pub struct JsonlLedger {
    path: PathBuf,
    file: Mutex<LedgerFile>,
}

struct LedgerFile {
    handle: File,
    /// Length of the file up to the last complete record.
    len: u64,
    /// The file ends in a partial line.
    torn: bool,
}

/// Whether the last byte of a non-empty file is a newline.
async fn ends_with_newline(path: &Path, len: u64) -> std::io::Result<bool> {
    if len == 0 {
        return Ok(true);
    }
    let mut file = File::open(path).await?;
    file.seek(SeekFrom::Start(len - 1)).await?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).await?;
    Ok(last[0] == b'\n')
}

impl JsonlLedger {
    /// Open (or create) the ledger file in append mode.
    pub async fn open(path: impl AsRef<Path>) -> AlignmentResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        let len = file.metadata().await?.len();
        let torn = !ends_with_newline(&path, len).await?;
        if torn {
            tracing::warn!(path = %path.display(), "Ledger ends in a partial record");
        }

        Ok(Self {
            path,
            file: Mutex::new(LedgerFile {
                handle: file,
                len,
                torn,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditLedger for JsonlLedger {
    async fn append(&self, run: &PipelineRun) -> AlignmentResult<()> {
        let mut file = self.file.lock().await;

        let mut line = Vec::new();
        if file.torn {
            line.push(b'\n');
        }
        serde_json::to_writer(&mut line, run)?;
        line.push(b'\n');

        let written = async {
            file.handle.write_all(&line).await?;
            file.handle.flush().await
        }
        .await;

        match written {
            Ok(()) => {
                file.len += line.len() as u64;
                file.torn = false;
                Ok(())
            }
            Err(e) => {
                let len = file.len;
                if let Err(truncate) = file.handle.set_len(len).await {
                    tracing::warn!(error = %truncate, path = %self.path.display(), "Could not cut back a failed ledger write");
                    file.torn = true;
                }
                Err(e.into())
            }
        }
    }

    async fn find(&self, run_id: Uuid) -> AlignmentResult<Option<PipelineRun>> {
        let file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut lines = BufReader::new(file).lines();
        let mut found = None;
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<PipelineRun>(&line) {
                Ok(run) if run.run_id == run_id => found = Some(run),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, path = %self.path.display(), "Skipping unreadable ledger line");
                }
            }
        }
        Ok(found)
    }

    fn describe(&self) -> String {
        format!("jsonl:{}", self.path.display())
    }
}

/// In-memory ledger for tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryLedger {
    pub records: Mutex<Vec<PipelineRun>>,
    pub fail_writes: bool,
}

#[cfg(test)]
#[async_trait]
impl AuditLedger for MemoryLedger {
    async fn append(&self, run: &PipelineRun) -> AlignmentResult<()> {
        if self.fail_writes {
            return Err(std::io::Error::other("disk full").into());
        }
        self.records.lock().await.push(run.clone());
        Ok(())
    }

    async fn find(&self, run_id: Uuid) -> AlignmentResult<Option<PipelineRun>> {
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .find(|r| r.run_id == run_id)
            .cloned())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
