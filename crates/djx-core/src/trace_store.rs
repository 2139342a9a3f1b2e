//! Append-only run history.
//!
//! The store is a JSONL file with one [`TraceRecord`] per line. All appends
//! go through a single writer task fed by an `mpsc` channel; each request
//! carries a `oneshot` sender the writer answers once the line is flushed.
//! Cloned handles share that writer, so concurrent callers never interleave
//! bytes and no append is lost.
//!
//! Readers load the file directly. A trailing line without its newline is a
//! write still in flight and is skipped, as is any line that fails to parse.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use log::{debug, warn};
use tokio::{
    fs::{self, OpenOptions},
    io::AsyncWriteExt,
    sync::{mpsc, oneshot},
    time::timeout,
};

use crate::{
    error::{DjxError, IoResultExt, Result},
    models::{TraceFilter, TraceRecord, TraceStats},
};

/// Default bound on a single append, including the wait for the writer.
pub const DEFAULT_APPEND_TIMEOUT: Duration = Duration::from_secs(10);

const CHANNEL_CAPACITY: usize = 256;

struct AppendRequest {
    line: String,
    ack: oneshot::Sender<Result<()>>,
}

/// Handle to a trace log; cheap to clone.
#[derive(Debug, Clone)]
pub struct TraceStore {
    path: PathBuf,
    tx: mpsc::Sender<AppendRequest>,
    append_timeout: Duration,
}

impl std::fmt::Debug for AppendRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppendRequest")
            .field("bytes", &self.line.len())
            .finish()
    }
}

impl TraceStore {
    /// Opens (creating if needed) the log at `path` and starts its writer.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_timeout(path, DEFAULT_APPEND_TIMEOUT).await
    }

    pub async fn open_with_timeout(path: impl AsRef<Path>, append_timeout: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.fs_context(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .fs_context(&path)?;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(run_writer(file, path.clone(), rx));
        debug!("Trace store writer started for {}", path.display());

        Ok(Self {
            path,
            tx,
            append_timeout,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record. Returns once the line is on disk.
    pub async fn append(&self, record: &TraceRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let (ack, done) = oneshot::channel();
        let request = AppendRequest { line, ack };

        let acked = timeout(self.append_timeout, async {
            self.tx
                .send(request)
                .await
                .map_err(|_| DjxError::trace_store("writer task has stopped"))?;
            done.await
                .map_err(|_| DjxError::trace_store("writer dropped the append"))?
        })
        .await;

        match acked {
            Ok(result) => result,
            Err(_) => Err(DjxError::trace_store(format!(
                "append of run {} did not complete within {:?}",
                record.run_id, self.append_timeout
            ))),
        }
    }

    /// Fetch one run by id.
    pub async fn get(&self, run_id: &str) -> Result<Option<TraceRecord>> {
        Ok(self
            .read_all()
            .await?
            .into_iter()
            .find(|record| record.run_id == run_id))
    }

    /// Like [`get`](Self::get) but a missing run is an error.
    pub async fn require(&self, run_id: &str) -> Result<TraceRecord> {
        self.get(run_id).await?.ok_or_else(|| DjxError::RunNotFound {
            id: run_id.to_string(),
        })
    }

    /// Matching runs, most recent first.
    pub async fn list(&self, filter: &TraceFilter, limit: Option<usize>) -> Result<Vec<TraceRecord>> {
        let records = self.read_all().await?;
        Ok(records
            .into_iter()
            .rev()
            .filter(|record| filter.matches(record))
            .take(limit.unwrap_or(usize::MAX))
            .collect())
    }

    /// Aggregates over matching runs.
    pub async fn stats(&self, filter: &TraceFilter) -> Result<TraceStats> {
        let records = self.read_all().await?;
        Ok(TraceStats::from_records(
            records.iter().filter(|record| filter.matches(record)),
            filter.plan_id.clone(),
        ))
    }

    async fn read_all(&self) -> Result<Vec<TraceRecord>> {
        let text = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).fs_context(&self.path),
        };
        Ok(parse_log(&text, &self.path))
    }
}

/// Parse complete lines of a trace log.
fn parse_log(text: &str, path: &Path) -> Vec<TraceRecord> {
    let complete = match text.rfind('\n') {
        Some(end) => &text[..=end],
        None => "",
    };

    complete
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(index, line)| match serde_json::from_str(line) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(
                    "Skipping corrupt trace line {} in {}: {e}",
                    index + 1,
                    path.display()
                );
                None
            }
        })
        .collect()
}

async fn run_writer(mut file: fs::File, path: PathBuf, mut rx: mpsc::Receiver<AppendRequest>) {
    while let Some(AppendRequest { line, ack }) = rx.recv().await {
        let written = async {
            file.write_all(line.as_bytes()).await?;
            file.flush().await
        }
        .await
        .fs_context(&path);

        if let Err(ref e) = written {
            warn!("Trace append failed: {e}");
        }
        // The caller may have timed out and gone away; the line is written
        // either way.
        let _ = ack.send(written);
    }
    debug!("Trace store writer for {} stopped", path.display());
}
