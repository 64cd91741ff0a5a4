// Service: posts referenced by Japanese-language annotations.
//
// Reads the newest annotation export, keeps notes whose summary contains
// hiragana and whose post is not yet in the ledger, and resolves the posts in
// batches. The ledger is loaded once per pass; ids accepted earlier in the
// same pass are skipped too.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use pressline_common::config::{BirdwatchRefConfig, TwitterEndpoints};
use pressline_common::PostRecord;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::adapter::{PassStats, PassSummary, SourceAdapter};
use crate::capture;
use crate::error::{ArchiveError, Result};
use crate::extract::Fields;
use crate::fetch::PageFetcher;
use crate::layout::{today, StreamLayout};
use crate::pacer::Pacer;
use crate::sink::JsonlSink;

use super::notes::{self, NoteRow};
use super::timeline::{extract_post, graphql_request, post_id_hint};

const LEDGER_FILE: &str = "fetched.jsonl";

pub struct BirdwatchRefService {
    fetcher: Arc<dyn PageFetcher>,
    endpoints: TwitterEndpoints,
    settings: BirdwatchRefConfig,
    input_dir: PathBuf,
    layout: StreamLayout,
    sink: JsonlSink,
}

impl BirdwatchRefService {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        endpoints: TwitterEndpoints,
        settings: BirdwatchRefConfig,
        input_dir: &Path,
        output_dir: &Path,
    ) -> Self {
        Self {
            fetcher,
            endpoints,
            settings,
            input_dir: input_dir.to_path_buf(),
            layout: StreamLayout::at(output_dir),
            sink: JsonlSink::new(),
        }
    }

    pub fn layout(&self) -> &StreamLayout {
        &self.layout
    }

    async fn load_notes(&self) -> Result<Vec<NoteRow>> {
        let dir = self.input_dir.clone();
        tokio::task::spawn_blocking(move || notes::load_notes(&dir))
            .await
            .map_err(|e| ArchiveError::Task(e.to_string()))?
    }

    /// Resolve one batch of post ids and write every post that comes back.
    async fn resolve_batch(&self, ids: &[String], pacer: &Pacer, stats: &PassStats) -> Result<()> {
        pacer.wait().await;
        let variables = json!({
            "tweetIds": ids,
            "withCommunity": false,
            "includePromotedContent": false,
            "withVoice": false,
        });
        let request = graphql_request(
            &self.endpoints,
            &self.endpoints.tweets_by_ids_url,
            &variables,
            &self.endpoints.search_page_url,
        );
        let page = capture::fetch_json(
            self.fetcher.as_ref(),
            &self.sink,
            &self.layout.raw(today()),
            &request,
            "tweets_by_ids",
        )
        .await?;
        stats.page();

        let results = page
            .pointer("/data/tweetResult")
            .and_then(Value::as_array)
            .ok_or_else(|| ArchiveError::malformed("tweets_by_ids", "no tweetResult array"))?;

        for node in results {
            // Deleted or protected posts come back as empty results.
            if node.get("result").is_none() {
                continue;
            }
            let node = Fields::new(node);
            let hint = post_id_hint(&node);
            match extract_post(node) {
                Ok((user, tweet)) => {
                    let record = PostRecord {
                        user,
                        tweet,
                        timestamp: Utc::now(),
                    };
                    self.sink.append(&self.layout.items(today()), &record).await?;
                    stats.written();
                }
                Err(e) => {
                    warn!(
                        stream = self.layout.name(),
                        id = hint.unwrap_or("unknown"),
                        stage = "tweets_by_ids",
                        field = e.field(),
                        "Skipping malformed post"
                    );
                    stats.item_failure();
                }
            }
        }
        Ok(())
    }
}

/// Ids to resolve, in note order: hiragana summaries only, nothing already
/// recorded, each id once.
pub(crate) fn select_ids(rows: Vec<NoteRow>, recorded: &HashSet<String>) -> Vec<String> {
    let mut accepted = HashSet::new();
    rows.into_iter()
        .filter(|row| notes::has_hiragana(&row.summary))
        .filter(|row| !recorded.contains(&row.tweet_id))
        .filter(|row| accepted.insert(row.tweet_id.clone()))
        .map(|row| row.tweet_id)
        .collect()
}

#[async_trait]
impl SourceAdapter for BirdwatchRefService {
    fn name(&self) -> &'static str {
        "birdwatch_ref"
    }

    async fn run_pass(&self) -> Result<PassSummary> {
        let pacer = Pacer::new(self.settings.pacing);
        let stats = PassStats::new();
        let ledger = self.layout.ledger(LEDGER_FILE);

        let rows = self.load_notes().await?;
        let recorded = ledger.snapshot().await?;
        let total = rows.len();
        let ids = select_ids(rows, &recorded);
        info!(notes = total, pending = ids.len(), "Selected annotated posts");

        for batch in ids.chunks(self.settings.batch_size.max(1)) {
            self.resolve_batch(batch, &pacer, &stats).await?;
            for id in batch {
                ledger.append(id).await?;
            }
            info!(batch = batch.len(), "Batch resolved");
        }

        let summary = stats.summary();
        info!(%summary, "birdwatch_ref pass complete");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, summary: &str) -> NoteRow {
        NoteRow {
            tweet_id: id.into(),
            summary: summary.into(),
        }
    }

    #[test]
    fn selects_new_japanese_notes_once() {
        let rows = vec![
            row("1", "これは誤り"),
            row("2", "english only"),
            row("3", "すでに記録済み"),
            row("1", "別のノート"),
            row("4", "あたらしい"),
        ];
        let recorded: HashSet<String> = ["3".to_string()].into();

        assert_eq!(select_ids(rows, &recorded), vec!["1", "4"]);
    }
}
