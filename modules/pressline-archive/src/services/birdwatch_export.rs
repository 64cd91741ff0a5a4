// Service: mirror of the public annotation export.
//
// Each day's export lives at `<base>/<YYYY/MM/DD>/<dataset>/<prefix>-NNNNN.tsv`
// with parts numbered from zero. Parts are fetched in order until the first
// non-success status; parts already on disk are not fetched again.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use pressline_common::config::BirdwatchExportConfig;
use tracing::{debug, info};

use crate::adapter::{PassStats, PassSummary, SourceAdapter};
use crate::error::Result;
use crate::fetch::{FetchRequest, PageFetcher};
use crate::layout::today;

/// Dataset path segment and the file prefix of its parts.
const DATASETS: [(&str, &str); 4] = [
    ("notes", "notes"),
    ("noteRatings", "ratings"),
    ("noteStatusHistory", "noteStatusHistory"),
    ("userEnrollment", "userEnrollment"),
];

/// Upper bound on parts per dataset and day.
const MAX_PARTS: u32 = 1000;

pub struct BirdwatchExportService {
    fetcher: Arc<dyn PageFetcher>,
    settings: BirdwatchExportConfig,
    output_dir: PathBuf,
}

impl BirdwatchExportService {
    pub fn new(fetcher: Arc<dyn PageFetcher>, settings: BirdwatchExportConfig, output_dir: &Path) -> Self {
        Self {
            fetcher,
            settings,
            output_dir: output_dir.to_path_buf(),
        }
    }

    /// Local directory holding one day's parts.
    pub fn day_dir(&self, date: NaiveDate) -> PathBuf {
        self.output_dir.join(date.to_string())
    }

    fn part_url(&self, date: NaiveDate, dataset: &str, file_name: &str) -> String {
        format!(
            "{}/{}/{dataset}/{file_name}",
            self.settings.base_url.trim_end_matches('/'),
            date.format("%Y/%m/%d")
        )
    }

    /// Mirror every dataset of one day.
    pub async fn mirror_day(&self, date: NaiveDate, stats: &PassStats) -> Result<()> {
        let dir = self.day_dir(date);
        for (dataset, prefix) in DATASETS {
            let mut fetched = 0;
            for index in 0..MAX_PARTS {
                let file_name = format!("{prefix}-{index:05}.tsv");
                let dest = dir.join(&file_name);
                if dest.exists() {
                    stats.duplicate();
                    continue;
                }

                let url = self.part_url(date, dataset, &file_name);
                let status = self.fetcher.download(&FetchRequest::get(url.as_str()), &dest).await?;
                stats.page();
                if !(200..300).contains(&status) {
                    debug!(url, status, "No more parts");
                    break;
                }
                stats.written();
                fetched += 1;
            }
            info!(%date, dataset, fetched, "Export dataset mirrored");
        }
        Ok(())
    }
}

#[async_trait]
impl SourceAdapter for BirdwatchExportService {
    fn name(&self) -> &'static str {
        "birdwatch_export"
    }

    async fn run_pass(&self) -> Result<PassSummary> {
        let stats = PassStats::new();
        let today = today();
        for back in 0..u64::from(self.settings.days) {
            let Some(date) = today.checked_sub_days(Days::new(back)) else {
                break;
            };
            self.mirror_day(date, &stats).await?;
        }

        let summary = stats.summary();
        info!(%summary, "birdwatch_export pass complete");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchedBody;
    use crate::testing::MockFetcher;

    fn settings() -> BirdwatchExportConfig {
        BirdwatchExportConfig {
            interval_hours: 4,
            days: 2,
            base_url: "https://export.test/data/".into(),
        }
    }

    #[test]
    fn part_url_layout() {
        let dir = tempfile::tempdir().unwrap();
        let service = BirdwatchExportService::new(Arc::new(MockFetcher::new()), settings(), dir.path());
        let date = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(
            service.part_url(date, "noteRatings", "ratings-00003.tsv"),
            "https://export.test/data/2024/01/31/noteRatings/ratings-00003.tsv"
        );
    }

    #[tokio::test]
    async fn fetches_parts_until_missing_and_skips_existing() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(
            MockFetcher::new()
                .on("/notes/notes-00001.tsv", FetchedBody::ok("tweetId\tsummary\n2\tに\n"))
                .on_status("/notes/", 404)
                .on_status("/noteRatings/", 404)
                .on_status("/noteStatusHistory/", 404)
                .on_status("/userEnrollment/", 404),
        );
        let service = BirdwatchExportService::new(fetcher.clone(), settings(), dir.path());
        let date = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let day = service.day_dir(date);
        std::fs::create_dir_all(&day).unwrap();
        std::fs::write(day.join("notes-00000.tsv"), "existing").unwrap();

        let stats = PassStats::new();
        service.mirror_day(date, &stats).await.unwrap();

        assert_eq!(fetcher.count("notes-00000"), 0);
        assert_eq!(fetcher.count("notes-00001"), 1);
        assert_eq!(fetcher.count("notes-00002"), 1);
        assert_eq!(
            std::fs::read_to_string(day.join("notes-00001.tsv")).unwrap(),
            "tweetId\tsummary\n2\tに\n"
        );
        assert!(!day.join("notes-00002.tsv").exists());
        assert_eq!(std::fs::read_to_string(day.join("notes-00000.tsv")).unwrap(), "existing");

        let summary = stats.summary();
        assert_eq!(summary.written, 1);
        assert_eq!(summary.duplicates, 1);
    }
}
