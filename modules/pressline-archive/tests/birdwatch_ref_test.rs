//! Annotation-reference batch against a notes export on disk.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use pressline_archive::layout::today;
use pressline_archive::testing::{post_result, MockFetcher};
use pressline_archive::{ArchiveError, BirdwatchRefService, SourceAdapter};
use pressline_common::config::{BirdwatchRefConfig, TwitterEndpoints};
use pressline_common::{PacingPolicy, PostRecord};
use serde_json::{json, Value};

const NOTES: &str = "noteId\ttweetId\tclassification\tsummary\n\
                     n1\t1\tMISINFORMED\tこれは誤りです\n\
                     n2\t2\tMISINFORMED\tThis is wrong\n\
                     n3\t3\tMISINFORMED\t記録済みのノートです\n\
                     n4\t4\tMISINFORMED\t出典がありません\n\
                     n5\t1\tMISINFORMED\t同じ投稿への別ノートです\n";

fn settings(batch_size: usize, pacing: PacingPolicy) -> BirdwatchRefConfig {
    BirdwatchRefConfig {
        batch_size,
        daily_at: "00:00".into(),
        pacing,
    }
}

fn write_export(input: &Path) {
    let day = input.join("2024-01-31");
    std::fs::create_dir_all(&day).unwrap();
    std::fs::write(day.join("notes-00000.tsv"), NOTES).unwrap();
}

fn batch_page(ids: &[&str]) -> Value {
    let results: Vec<Value> = ids
        .iter()
        .map(|id| json!({ "result": post_result(id, json!([])) }))
        .collect();
    json!({ "data": { "tweetResult": results } })
}

fn service(fetcher: Arc<MockFetcher>, root: &Path, settings: BirdwatchRefConfig) -> BirdwatchRefService {
    BirdwatchRefService::new(
        fetcher,
        TwitterEndpoints::default(),
        settings,
        &root.join("Birdwatch"),
        &root.join("BirdwatchRef"),
    )
}

fn ledger(root: &Path) -> Vec<String> {
    std::fs::read_to_string(root.join("BirdwatchRef/fetched.jsonl"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

fn written(service: &BirdwatchRefService) -> Vec<String> {
    std::fs::read_to_string(service.layout().items(today()))
        .unwrap_or_default()
        .lines()
        .map(|line| serde_json::from_str::<PostRecord>(line).unwrap().tweet.id_str)
        .collect()
}

#[tokio::test]
async fn resolves_new_japanese_notes_in_batches() {
    let dir = tempfile::tempdir().unwrap();
    write_export(&dir.path().join("Birdwatch"));
    std::fs::create_dir_all(dir.path().join("BirdwatchRef")).unwrap();
    std::fs::write(dir.path().join("BirdwatchRef/fetched.jsonl"), "3\n").unwrap();

    let fetcher = Arc::new(
        MockFetcher::new()
            .on_json(r#""tweetIds":["1"]"#, batch_page(&["1"]))
            // The post was deleted upstream: an empty result.
            .on_json(r#""tweetIds":["4"]"#, json!({ "data": { "tweetResult": [{}] } })),
    );
    let service = service(fetcher.clone(), dir.path(), settings(1, PacingPolicy::fixed(Duration::ZERO)));

    let summary = service.run_pass().await.unwrap();

    assert_eq!(summary.pages, 2);
    assert_eq!(summary.written, 1);
    assert_eq!(written(&service), vec!["1"]);
    assert_eq!(ledger(dir.path()), vec!["3", "1", "4"]);
    assert_eq!(fetcher.count("tweetIds"), 2);
}

#[tokio::test]
async fn one_request_per_batch() {
    let dir = tempfile::tempdir().unwrap();
    write_export(&dir.path().join("Birdwatch"));

    let fetcher = Arc::new(MockFetcher::new().on_json(
        r#""tweetIds":["1","3","4"]"#,
        batch_page(&["1", "3", "4"]),
    ));
    let service = service(fetcher.clone(), dir.path(), settings(220, PacingPolicy::fixed(Duration::ZERO)));

    let summary = service.run_pass().await.unwrap();

    assert_eq!(fetcher.count("tweetIds"), 1);
    assert_eq!(summary.written, 3);
    assert_eq!(ledger(dir.path()), vec!["1", "3", "4"]);
}

#[tokio::test]
async fn rerun_requests_nothing() {
    let dir = tempfile::tempdir().unwrap();
    write_export(&dir.path().join("Birdwatch"));
    let fetcher = Arc::new(MockFetcher::new().on_json("tweetIds", batch_page(&["1", "3", "4"])));

    service(fetcher.clone(), dir.path(), settings(220, PacingPolicy::fixed(Duration::ZERO)))
        .run_pass()
        .await
        .unwrap();
    let summary = service(fetcher.clone(), dir.path(), settings(220, PacingPolicy::fixed(Duration::ZERO)))
        .run_pass()
        .await
        .unwrap();

    assert_eq!(summary.pages, 0);
    assert_eq!(fetcher.count("tweetIds"), 1);
}

#[tokio::test]
async fn failed_batch_is_not_recorded() {
    let dir = tempfile::tempdir().unwrap();
    write_export(&dir.path().join("Birdwatch"));
    let fetcher = Arc::new(
        MockFetcher::new()
            .on_json(r#""tweetIds":["1"]"#, batch_page(&["1"]))
            .on_status(r#""tweetIds":["3"]"#, 429),
    );
    let service = service(fetcher, dir.path(), settings(1, PacingPolicy::fixed(Duration::ZERO)));

    let err = service.run_pass().await.unwrap_err();

    assert!(matches!(err, ArchiveError::Api { status: 429, .. }));
    assert_eq!(ledger(dir.path()), vec!["1"]);
}

#[tokio::test(start_paused = true)]
async fn batches_respect_the_request_window() {
    let dir = tempfile::tempdir().unwrap();
    write_export(&dir.path().join("Birdwatch"));
    let fetcher = Arc::new(MockFetcher::new().on_json("tweetIds", batch_page(&[])));
    // 4 requests per 8 seconds: one every 2 seconds.
    let pacing = PacingPolicy::windowed(4, Duration::from_secs(8));
    let service = service(fetcher, dir.path(), settings(1, pacing));

    let start = tokio::time::Instant::now();
    let summary = service.run_pass().await.unwrap();

    assert_eq!(summary.pages, 3);
    assert_eq!(start.elapsed(), Duration::from_secs(4));
}
