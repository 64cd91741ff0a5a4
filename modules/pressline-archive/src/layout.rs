use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::ledger::DedupLedger;

/// On-disk layout for one (source, handle) pair:
///
/// ```text
/// <output_dir>/<handle>/<date>.jsonl           normalized items
/// <output_dir>/<handle>/<date>_raw.jsonl       raw page responses
/// <output_dir>/<handle>/<date>_<suffix>.jsonl  raw nested responses
/// <output_dir>/<handle>/<ledger file>          dedup ledger
/// ```
#[derive(Debug, Clone)]
pub struct StreamLayout {
    root: PathBuf,
}

impl StreamLayout {
    pub fn new(output_dir: &Path, handle: &str) -> Self {
        Self {
            root: output_dir.join(handle),
        }
    }

    /// Layout rooted directly at `dir`, for sources without a handle.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { root: dir.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stream name for logs: the handle, or the directory name for sources without one.
    pub fn name(&self) -> &str {
        self.root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    pub fn items(&self, date: NaiveDate) -> PathBuf {
        self.root.join(format!("{date}.jsonl"))
    }

    pub fn raw(&self, date: NaiveDate) -> PathBuf {
        self.suffixed(date, "raw")
    }

    pub fn suffixed(&self, date: NaiveDate, suffix: &str) -> PathBuf {
        self.root.join(format!("{date}_{suffix}.jsonl"))
    }

    pub fn ledger(&self, file_name: &str) -> DedupLedger {
        DedupLedger::new(self.root.join(file_name))
    }
}

/// Local calendar date used to name the day's files.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_stream_paths() {
        let layout = StreamLayout::new(Path::new("/data/Twitter"), "PressUser");
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();

        assert_eq!(
            layout.items(date),
            PathBuf::from("/data/Twitter/PressUser/2024-03-07.jsonl")
        );
        assert_eq!(
            layout.raw(date),
            PathBuf::from("/data/Twitter/PressUser/2024-03-07_raw.jsonl")
        );
        assert_eq!(
            layout.suffixed(date, "comment_raw"),
            PathBuf::from("/data/Twitter/PressUser/2024-03-07_comment_raw.jsonl")
        );
        assert_eq!(
            layout.ledger("fetched.jsonl").path(),
            Path::new("/data/Twitter/PressUser/fetched.jsonl")
        );
        assert_eq!(layout.name(), "PressUser");
        assert_eq!(StreamLayout::at("/data/BirdwatchRef").name(), "BirdwatchRef");
    }
}
