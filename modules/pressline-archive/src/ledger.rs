// Persisted dedup state: one bare identifier per line, append-only.
//
// `contains` re-reads the whole file on every call. That is linear in the
// size of the stream and is the known scaling limit of this ledger; entries
// are never evicted, so duplicate detection never changes behavior over time.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{ArchiveError, Result};

/// Dedup ledger for one stream. Single writer per stream is the caller's job.
#[derive(Debug, Clone)]
pub struct DedupLedger {
    path: PathBuf,
}

impl DedupLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file and its parent directories if they don't exist yet.
    async fn ensure(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ArchiveError::io(parent, e))?;
        }
        tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| ArchiveError::io(&self.path, e))?;
        Ok(())
    }

    async fn read(&self) -> Result<String> {
        self.ensure().await?;
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ArchiveError::io(&self.path, e))
    }

    pub async fn contains(&self, id: &str) -> Result<bool> {
        let id = id.trim();
        if id.is_empty() {
            return Ok(false);
        }
        let content = self.read().await?;
        Ok(content.lines().any(|line| line.trim() == id))
    }

    /// Record an identifier. Durable once this returns.
    pub async fn append(&self, id: &str) -> Result<()> {
        self.ensure().await?;
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| ArchiveError::io(&self.path, e))?;
        file.write_all(format!("{}\n", id.trim()).as_bytes())
            .await
            .map_err(|e| ArchiveError::io(&self.path, e))?;
        file.sync_data()
            .await
            .map_err(|e| ArchiveError::io(&self.path, e))?;
        debug!(ledger = %self.path.display(), id, "ledger: recorded");
        Ok(())
    }

    /// Every recorded identifier, loaded once. Used for run-scoped pre-filtering.
    pub async fn snapshot(&self) -> Result<HashSet<String>> {
        let content = self.read().await?;
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_file_and_parents_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = DedupLedger::new(dir.path().join("a/b/fetched.jsonl"));

        assert!(!ledger.contains("1").await.unwrap());
        assert!(ledger.path().exists());
    }

    #[tokio::test]
    async fn append_then_contains() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = DedupLedger::new(dir.path().join("fetched.yaml"));

        ledger.append("abc").await.unwrap();
        ledger.append("def").await.unwrap();

        assert!(ledger.contains("abc").await.unwrap());
        assert!(ledger.contains("def").await.unwrap());
        assert!(!ledger.contains("ab").await.unwrap());

        let content = std::fs::read_to_string(ledger.path()).unwrap();
        assert_eq!(content, "abc\ndef\n");
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fetched.jsonl");
        DedupLedger::new(&path).append("42").await.unwrap();

        let reopened = DedupLedger::new(&path);
        assert!(reopened.contains("42").await.unwrap());
    }

    #[tokio::test]
    async fn snapshot_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fetched.jsonl");
        std::fs::write(&path, "1\n\n2 \n").unwrap();

        let ids = DedupLedger::new(&path).snapshot().await.unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("2"));
        assert!(!DedupLedger::new(&path).contains("").await.unwrap());
    }
}
