//! Append-only JSONL results file with a single writer.
//!
//! One task owns the file. Runs send their records over a channel and wait
//! for the write to be acknowledged, so lines never interleave no matter how
//! many questions are in flight.

use crate::record::RunRecord;
use delve_error::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const CHANNEL_CAPACITY: usize = 64;

struct Append {
    record: RunRecord,
    ack: oneshot::Sender<Result<()>>,
}

/// Owner of the writer task
pub struct ResultSink {
    path: PathBuf,
    tx: mpsc::Sender<Append>,
    writer: JoinHandle<usize>,
}

/// Cheap handle for sending records to the writer
#[derive(Clone)]
pub struct SinkHandle {
    tx: mpsc::Sender<Append>,
}

impl ResultSink {
    /// Open (creating parent directories) and start the writer
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::from(e)
                    .with_operation("sink::open")
                    .with_context("path", parent.display().to_string())
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| {
                Error::from(e)
                    .with_operation("sink::open")
                    .with_context("path", path.display().to_string())
            })?;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let writer = tokio::spawn(write_loop(file, rx));

        Ok(Self { path, tx, writer })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn handle(&self) -> SinkHandle {
        SinkHandle { tx: self.tx.clone() }
    }

    /// Append one record and wait until it is on disk
    pub async fn append(&self, record: RunRecord) -> Result<()> {
        self.handle().append(record).await
    }

    /// Stop accepting records, drain the queue and return how many were written.
    ///
    /// Outstanding [`SinkHandle`]s keep the writer alive until they are dropped.
    pub async fn close(self) -> Result<usize> {
        drop(self.tx);
        self.writer.await.map_err(|e| {
            Error::sink_failed(format!("writer task ended abnormally: {}", e))
                .with_operation("sink::close")
        })
    }
}

impl SinkHandle {
    pub async fn append(&self, record: RunRecord) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(Append { record, ack })
            .await
            .map_err(|_| Error::sink_failed("results sink is closed").with_operation("sink::append"))?;
        done.await
            .map_err(|_| Error::sink_failed("writer dropped the record").with_operation("sink::append"))?
    }
}

async fn write_loop(mut file: File, mut rx: mpsc::Receiver<Append>) -> usize {
    let mut written = 0;
    while let Some(Append { record, ack }) = rx.recv().await {
        let result = write_line(&mut file, &record).await;
        match &result {
            Ok(()) => written += 1,
            Err(err) => tracing::error!(error = %err, question = %record.question, "failed to append record"),
        }
        let _ = ack.send(result);
    }
    written
}

async fn write_line(file: &mut File, record: &RunRecord) -> Result<()> {
    let mut line = serde_json::to_string(record).map_err(|e| {
        Error::serialization_failed("failed to serialize record")
            .with_operation("sink::write")
            .set_source(e)
    })?;
    line.push('\n');

    file.write_all(line.as_bytes())
        .await
        .map_err(|e| Error::from(e).with_operation("sink::write"))?;
    file.flush()
        .await
        .map_err(|e| Error::from(e).with_operation("sink::write"))?;
    Ok(())
}
