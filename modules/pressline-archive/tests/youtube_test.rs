//! Video adapter passes against canned search, detail and comment pages.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use pressline_archive::layout::today;
use pressline_archive::testing::{comment_item, comment_page, video_detail, video_search_page, MockFetcher};
use pressline_archive::{SourceAdapter, YouTubeService};
use pressline_common::config::YouTubeConfig;
use pressline_common::{PacingPolicy, VideoRecord};

fn settings() -> YouTubeConfig {
    YouTubeConfig {
        handle: "PressChannel".into(),
        channel_ids: vec!["UCnews".into()],
        delta_days: 3,
        period_days: 1,
        request_count: 3,
        comment_request_count: 50,
        interval_hours: 4,
        pacing: PacingPolicy::fixed(Duration::ZERO),
        base_url: "https://yt.test/v3".into(),
    }
}

fn service(fetcher: Arc<MockFetcher>, dir: &Path) -> YouTubeService {
    YouTubeService::new(fetcher, settings(), dir)
}

fn records(service: &YouTubeService) -> Vec<VideoRecord> {
    let path = service.layout().items(today());
    if !path.exists() {
        return Vec::new();
    }
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn line_count(path: &Path) -> usize {
    std::fs::read_to_string(path).map(|s| s.lines().count()).unwrap_or(0)
}

#[tokio::test]
async fn archives_videos_with_deduplicated_comments() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(
        MockFetcher::new()
            .on_json("/search?", video_search_page(&["v1", "v2"], None))
            .on_json("&id=v1", video_detail("v1", "Morning report"))
            .on_json("&id=v2", video_detail("v2", "Evening report"))
            .on_json(
                "videoId=v1",
                comment_page(vec![comment_item("c1", "a"), comment_item("c2", "b")], Some("next")),
            )
            .on_json(
                "videoId=v1",
                comment_page(vec![comment_item("c2", "b"), comment_item("c3", "c")], None),
            )
            .on_json("videoId=v2", comment_page(vec![], None)),
    );
    let service = service(fetcher.clone(), dir.path());

    let summary = service.run_pass().await.unwrap();

    assert_eq!(summary.written, 2);
    let records = records(&service);
    assert_eq!(records[0].video.title, "Morning report");
    let comment_ids: Vec<&str> = records[0]
        .comments
        .iter()
        .map(|c| c.comment_id.as_str())
        .collect();
    assert_eq!(comment_ids, vec!["c1", "c2", "c3"]);
    assert!(records[1].comments.is_empty());

    let layout = service.layout();
    assert_eq!(line_count(&layout.raw(today())), 1);
    assert_eq!(line_count(&layout.suffixed(today(), "detail_raw")), 2);
    assert_eq!(line_count(&layout.suffixed(today(), "comment_raw")), 3);
    assert_eq!(fetcher.count("pageToken=next"), 1);
}

#[tokio::test]
async fn disabled_comments_keep_the_video() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(
        MockFetcher::new()
            .on_json("/search?", video_search_page(&["v1"], None))
            .on_json("&id=v1", video_detail("v1", "Live"))
            .on_status("videoId=v1", 403),
    );
    let service = service(fetcher, dir.path());

    let summary = service.run_pass().await.unwrap();

    assert_eq!(summary.written, 1);
    assert_eq!(summary.nested_failures, 1);
    assert!(records(&service)[0].comments.is_empty());
}

#[tokio::test]
async fn failed_detail_skips_only_that_video() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(
        MockFetcher::new()
            .on_json("/search?", video_search_page(&["v1", "v2"], None))
            .on_status("&id=v1", 500)
            .on_json("&id=v2", video_detail("v2", "Evening report"))
            .on_json("videoId=", comment_page(vec![], None)),
    );
    let service = service(fetcher, dir.path());

    let summary = service.run_pass().await.unwrap();

    assert_eq!(summary.written, 1);
    assert_eq!(summary.item_failures, 1);
    assert_eq!(records(&service)[0].id(), "v2");
    // The failed id is recorded, so it is not retried.
    let ledger = std::fs::read_to_string(service.layout().root().join("fetched.yaml")).unwrap();
    assert_eq!(ledger.lines().collect::<Vec<_>>(), vec!["v1", "v2"]);
}

#[tokio::test]
async fn restart_writes_nothing_new() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(
        MockFetcher::new()
            .on_json("/search?", video_search_page(&["v1"], None))
            .on_json("&id=v1", video_detail("v1", "Morning report"))
            .on_json("videoId=v1", comment_page(vec![], None)),
    );

    service(fetcher.clone(), dir.path()).run_pass().await.unwrap();
    let restarted = service(fetcher.clone(), dir.path());
    let summary = restarted.run_pass().await.unwrap();

    assert_eq!(summary.written, 0);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(records(&restarted).len(), 1);
    assert_eq!(fetcher.count("&id=v1"), 1);
}

#[tokio::test]
async fn search_follows_page_token_within_budget() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(
        MockFetcher::new()
            .on_json("/search?", video_search_page(&[], Some("p2")))
            .on_json("/search?", video_search_page(&[], Some("p3")))
            .on_json("/search?", video_search_page(&[], Some("p4")))
            .on_json("/search?", video_search_page(&[], Some("p5"))),
    );
    let service = service(fetcher.clone(), dir.path());

    let summary = service.run_pass().await.unwrap();

    assert_eq!(summary.pages, 3);
    assert_eq!(fetcher.count("/search?"), 3);
    assert_eq!(fetcher.count("pageToken=p3"), 1);
}

#[tokio::test(start_paused = true)]
async fn requests_are_spaced_by_the_pacing_policy() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(
        MockFetcher::new()
            .on_json("/search?", video_search_page(&["v1"], None))
            .on_json("&id=v1", video_detail("v1", "Morning report"))
            .on_json("videoId=v1", comment_page(vec![], None)),
    );
    let mut settings = settings();
    settings.pacing = PacingPolicy::fixed(Duration::from_secs(5));
    let service = YouTubeService::new(fetcher, settings, dir.path());

    let start = tokio::time::Instant::now();
    service.run_pass().await.unwrap();

    // search, detail, comments: two gaps of five seconds.
    assert_eq!(start.elapsed(), Duration::from_secs(10));
}
