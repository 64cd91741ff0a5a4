use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::error::Result;

/// One source the orchestrator can run a pass of.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable adapter name, used in logs and on the command line.
    fn name(&self) -> &'static str;

    /// Run one complete pass. An `Err` means the pass aborted on a page-level
    /// or I/O failure; records already written stay written.
    async fn run_pass(&self) -> Result<PassSummary>;
}

/// Counters for one pass. Atomic so the pass can count through shared references.
#[derive(Debug, Default)]
pub struct PassStats {
    pages: AtomicU64,
    written: AtomicU64,
    duplicates: AtomicU64,
    item_failures: AtomicU64,
    nested_failures: AtomicU64,
}

impl PassStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(&self) {
        self.pages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn written(&self) {
        self.written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn item_failure(&self) {
        self.item_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn nested_failure(&self) {
        self.nested_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn summary(&self) -> PassSummary {
        PassSummary {
            pages: self.pages.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            item_failures: self.item_failures.load(Ordering::Relaxed),
            nested_failures: self.nested_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of a finished pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub pages: u64,
    pub written: u64,
    pub duplicates: u64,
    pub item_failures: u64,
    pub nested_failures: u64,
}

impl std::fmt::Display for PassSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "pages={} written={} duplicates={} item_failures={} nested_failures={}",
            self.pages, self.written, self.duplicates, self.item_failures, self.nested_failures
        )
    }
}
