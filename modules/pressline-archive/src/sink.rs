// Durable append-only line writer. Each call opens, writes one line, syncs,
// and closes; a crash loses at most the record in flight.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::de::IgnoredAny;
use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use crate::error::{ArchiveError, Result};

#[derive(Debug, Default)]
pub struct JsonlSink {
    lines_written: AtomicU64,
}

impl JsonlSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines_written(&self) -> u64 {
        self.lines_written.load(Ordering::Relaxed)
    }

    /// Serialize `record` as one JSON line and append it to `path`.
    pub async fn append<T: Serialize + ?Sized>(&self, path: &Path, record: &T) -> Result<()> {
        let line = serde_json::to_string(record)?;
        self.append_line(path, &line).await
    }

    /// Append an unparsed vendor body. A JSON body is written as received, minus
    /// its line breaks; anything else is stored as a JSON string so it stays one
    /// recoverable line.
    pub async fn append_raw(&self, path: &Path, body: &str) -> Result<()> {
        self.append_line(path, &raw_line(body)).await
    }

    async fn append_line(&self, path: &Path, line: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ArchiveError::io(parent, e))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| ArchiveError::io(path, e))?;

        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        file.write_all(&buf)
            .await
            .map_err(|e| ArchiveError::io(path, e))?;
        file.sync_data()
            .await
            .map_err(|e| ArchiveError::io(path, e))?;

        self.lines_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

// A raw CR or LF inside valid JSON can only be insignificant whitespace;
// string contents must escape them. Every other byte is kept as received.
fn raw_line(body: &str) -> String {
    if serde_json::from_str::<IgnoredAny>(body).is_ok() {
        body.chars().filter(|c| !matches!(c, '\n' | '\r')).collect()
    } else {
        Value::String(body.to_string()).to_string()
    }
}
