// Service: recent channel uploads with their comment threads.
//
// Search each channel for videos published inside the trailing window, then
// for every new video fetch its detail and its top-level comments. Search,
// detail and comment pages each go to their own raw stream.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use futures::{pin_mut, Stream, StreamExt};
use pressline_common::config::YouTubeConfig;
use pressline_common::{BatchWindow, CommentRecord, VideoDetail, VideoRecord};
use serde_json::Value;
use tracing::{info, warn};

use crate::adapter::{PassStats, PassSummary, SourceAdapter};
use crate::capture;
use crate::cursor::{paginate, PageSource};
use crate::error::{ArchiveError, Result};
use crate::extract::{ExtractError, Fields};
use crate::fetch::{FetchRequest, PageFetcher};
use crate::layout::{today, StreamLayout};
use crate::pacer::Pacer;
use crate::sink::JsonlSink;

const LEDGER_FILE: &str = "fetched.yaml";
const SEARCH_PARTS: &str = "id,snippet";
const VIDEO_PARTS: &str = "contentDetails,id,liveStreamingDetails,localizations,player,\
                           recordingDetails,snippet,statistics,status,topicDetails";
const COMMENT_PARTS: &str = "id,snippet,replies";
const SEARCH_PAGE_SIZE: &str = "50";
const COMMENT_PAGE_SIZE: &str = "100";

pub struct YouTubeService {
    fetcher: Arc<dyn PageFetcher>,
    settings: YouTubeConfig,
    layout: StreamLayout,
    sink: JsonlSink,
}

impl YouTubeService {
    pub fn new(fetcher: Arc<dyn PageFetcher>, settings: YouTubeConfig, output_dir: &Path) -> Self {
        let layout = StreamLayout::new(output_dir, &settings.handle);
        Self {
            fetcher,
            settings,
            layout,
            sink: JsonlSink::new(),
        }
    }

    pub fn layout(&self) -> &StreamLayout {
        &self.layout
    }

    fn window(&self) -> BatchWindow {
        BatchWindow::trailing(
            Utc::now(),
            Duration::days(self.settings.delta_days),
            Duration::days(self.settings.period_days),
        )
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.settings.base_url.trim_end_matches('/'))
    }

    /// New videos of one channel published inside `window`.
    pub fn fetch_window<'a>(
        &'a self,
        channel_id: &'a str,
        window: BatchWindow,
        pacer: &'a Pacer,
        stats: &'a PassStats,
    ) -> impl Stream<Item = Result<VideoRecord>> + Send + 'a {
        async_stream::try_stream! {
            let ledger = self.layout.ledger(LEDGER_FILE);
            let stream = self.layout.name();
            let pages = paginate(pacer, self.settings.request_count, SearchPages {
                service: self,
                channel_id,
                window,
            });
            pin_mut!(pages);

            while let Some(page) = pages.next().await {
                let page = page?;
                stats.page();

                let items = page
                    .get("items")
                    .and_then(Value::as_array)
                    .ok_or_else(|| ArchiveError::malformed("search", "no items array"))?;

                for item in items {
                    let item = Fields::new(item);
                    let video_id = match item.string("/id/videoId") {
                        Ok(id) => id,
                        Err(e) => {
                            warn!(
                                stream,
                                channel_id,
                                id = item.opt_str("/etag").unwrap_or("unknown"),
                                stage = "search",
                                field = e.field(),
                                "Skipping malformed search item"
                            );
                            stats.item_failure();
                            continue;
                        }
                    };

                    if ledger.contains(&video_id).await? {
                        stats.duplicate();
                        continue;
                    }
                    ledger.append(&video_id).await?;

                    let Some(video) = self.fetch_detail(&video_id, pacer, stats).await? else {
                        continue;
                    };
                    let comments = self.fetch_comments(&video_id, pacer, stats).await?;

                    yield VideoRecord {
                        video,
                        comments,
                        timestamp: Utc::now(),
                    };
                }
            }
        }
    }

    /// Detail of one video, or `None` when it could not be fetched or read.
    /// That is a per-item failure; only local I/O errors escape.
    async fn fetch_detail(
        &self,
        video_id: &str,
        pacer: &Pacer,
        stats: &PassStats,
    ) -> Result<Option<VideoDetail>> {
        pacer.wait().await;
        let request = FetchRequest::get(self.endpoint("videos"))
            .query("part", VIDEO_PARTS)
            .query("id", video_id);
        let fetched = capture::fetch_json(
            self.fetcher.as_ref(),
            &self.sink,
            &self.layout.suffixed(today(), "detail_raw"),
            &request,
            "detail",
        )
        .await;
        let stream = self.layout.name();

        let page = match fetched {
            Ok(page) => page,
            Err(e) if e.is_io() => return Err(e),
            Err(e) => {
                warn!(stream, id = video_id, stage = "detail", error = %e, "Skipping video, detail fetch failed");
                stats.item_failure();
                return Ok(None);
            }
        };
        match extract_detail(video_id, &page) {
            Ok(video) => Ok(Some(video)),
            Err(e) => {
                warn!(stream, id = video_id, stage = "detail", field = e.field(), "Skipping video with malformed detail");
                stats.item_failure();
                Ok(None)
            }
        }
    }

    /// Top-level comments of one video, deduplicated by comment id. Failures
    /// end the comment loop and keep what was collected; only local I/O errors escape.
    async fn fetch_comments(
        &self,
        video_id: &str,
        pacer: &Pacer,
        stats: &PassStats,
    ) -> Result<Vec<CommentRecord>> {
        let mut comments = Vec::new();
        let mut seen = HashSet::new();
        let stream = self.layout.name();
        let pages = paginate(
            pacer,
            self.settings.comment_request_count,
            CommentPages {
                service: self,
                video_id,
            },
        );
        pin_mut!(pages);

        while let Some(page) = pages.next().await {
            let page = match page {
                Ok(page) => page,
                Err(e) if e.is_io() => return Err(e),
                Err(e) => {
                    // Disabled comments come back as 403 here.
                    warn!(stream, id = video_id, stage = "comments", error = %e, "Comment fetch failed, keeping comments so far");
                    stats.nested_failure();
                    break;
                }
            };
            let Some(items) = page.get("items").and_then(Value::as_array) else {
                warn!(stream, id = video_id, stage = "comments", "Comment page has no items array");
                stats.nested_failure();
                break;
            };

            for item in items {
                let item = Fields::new(item);
                let hint = item.opt_str("/id");
                match extract_comment(item) {
                    Ok(comment) => {
                        if seen.insert(comment.comment_id.clone()) {
                            comments.push(comment);
                        }
                    }
                    Err(e) => {
                        warn!(
                            stream,
                            id = hint.unwrap_or("unknown"),
                            video_id,
                            stage = "comments",
                            field = e.field(),
                            "Skipping malformed comment"
                        );
                        stats.item_failure();
                    }
                }
            }
        }
        Ok(comments)
    }
}

fn extract_detail(video_id: &str, page: &Value) -> std::result::Result<VideoDetail, ExtractError> {
    let item = Fields::new(page).at("/items/0")?;
    let snippet = item.at("/snippet")?;
    let statistics = item.at("/statistics")?;

    Ok(VideoDetail {
        id: video_id.to_string(),
        title: snippet.string("/title")?,
        description: snippet.string("/description")?,
        channel_title: snippet.string("/channelTitle")?,
        category_id: snippet.text("/categoryId")?,
        view_count: statistics.text("/viewCount")?,
        like_count: statistics.text("/likeCount")?,
        favorite_count: statistics.text("/favoriteCount")?,
        tags: snippet.opt_str_list("/tags"),
        comment_count: statistics.opt_text("/commentCount"),
    })
}

fn extract_comment(item: Fields<'_>) -> std::result::Result<CommentRecord, ExtractError> {
    let snippet = item.at("/snippet/topLevelComment/snippet")?;
    Ok(CommentRecord {
        comment_id: item.string("/id")?,
        text: snippet.string("/textDisplay")?,
        author_display_name: snippet.string("/authorDisplayName")?,
        author_channel_id: snippet.string("/authorChannelId/value")?,
        like_count: snippet.i64("/likeCount")?,
        published_at: snippet.string("/publishedAt")?,
        updated_at: snippet.string("/updatedAt")?,
    })
}

fn next_page_token(page: &Value) -> Option<String> {
    page.get("nextPageToken")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Channel search pages for one window, newest first.
struct SearchPages<'a> {
    service: &'a YouTubeService,
    channel_id: &'a str,
    window: BatchWindow,
}

#[async_trait]
impl<'a> PageSource for SearchPages<'a> {
    type Page = Value;

    async fn issue(&mut self, cursor: Option<&str>) -> Result<Value> {
        let (after, before) = self.window.rfc3339_bounds();
        let mut request = FetchRequest::get(self.service.endpoint("search"))
            .query("part", SEARCH_PARTS)
            .query("channelId", self.channel_id)
            .query("maxResults", SEARCH_PAGE_SIZE)
            .query("order", "date")
            .query("type", "video")
            .query("publishedAfter", after)
            .query("publishedBefore", before);
        if let Some(token) = cursor {
            request = request.query("pageToken", token);
        }
        capture::fetch_json(
            self.service.fetcher.as_ref(),
            &self.service.sink,
            &self.service.layout.raw(today()),
            &request,
            "search",
        )
        .await
    }

    fn next_cursor(&self, page: &Value) -> Option<String> {
        next_page_token(page)
    }
}

/// Comment thread pages of one video.
struct CommentPages<'a> {
    service: &'a YouTubeService,
    video_id: &'a str,
}

#[async_trait]
impl<'a> PageSource for CommentPages<'a> {
    type Page = Value;

    async fn issue(&mut self, cursor: Option<&str>) -> Result<Value> {
        let mut request = FetchRequest::get(self.service.endpoint("commentThreads"))
            .query("part", COMMENT_PARTS)
            .query("videoId", self.video_id)
            .query("maxResults", COMMENT_PAGE_SIZE)
            .query("order", "relevance")
            .query("textFormat", "plainText");
        if let Some(token) = cursor {
            request = request.query("pageToken", token);
        }
        capture::fetch_json(
            self.service.fetcher.as_ref(),
            &self.service.sink,
            &self.service.layout.suffixed(today(), "comment_raw"),
            &request,
            "comments",
        )
        .await
    }

    fn next_cursor(&self, page: &Value) -> Option<String> {
        next_page_token(page)
    }
}

#[async_trait]
impl SourceAdapter for YouTubeService {
    fn name(&self) -> &'static str {
        "youtube"
    }

    async fn run_pass(&self) -> Result<PassSummary> {
        let pacer = Pacer::new(self.settings.pacing);
        let stats = PassStats::new();
        let window = self.window();

        for channel_id in &self.settings.channel_ids {
            info!(
                channel_id = channel_id.as_str(),
                since = %window.since,
                until = %window.until,
                "Fetching channel uploads"
            );
            let records = self.fetch_window(channel_id, window, &pacer, &stats);
            pin_mut!(records);
            while let Some(record) = records.next().await {
                let record = record?;
                self.sink.append(&self.layout.items(today()), &record).await?;
                stats.written();
                info!(id = record.id(), comments = record.comments.len(), "Video archived");
            }
        }

        let summary = stats.summary();
        info!(%summary, "youtube pass complete");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{comment_item, video_detail};
    use serde_json::json;

    #[test]
    fn detail_keeps_optional_fields_optional() {
        let mut page = video_detail("v1", "Evening news");
        let detail = extract_detail("v1", &page).unwrap();
        assert_eq!(detail.title, "Evening news");
        assert_eq!(detail.tags.as_deref(), Some(&["news".to_string()][..]));
        assert_eq!(detail.comment_count.as_deref(), Some("12"));

        let item = &mut page["items"][0];
        item["snippet"].as_object_mut().unwrap().remove("tags");
        item["statistics"].as_object_mut().unwrap().remove("commentCount");
        let detail = extract_detail("v1", &page).unwrap();
        assert_eq!(detail.tags, None);
        assert_eq!(detail.comment_count, None);
    }

    #[test]
    fn empty_detail_is_an_item_failure() {
        let err = extract_detail("gone", &json!({ "items": [] })).unwrap_err();
        assert_eq!(err.field(), "/items/0");
    }

    #[test]
    fn comment_fields() {
        let item = comment_item("c1", "first!");
        let comment = extract_comment(Fields::new(&item)).unwrap();
        assert_eq!(comment.comment_id, "c1");
        assert_eq!(comment.text, "first!");
        assert_eq!(comment.author_channel_id, "UCviewer");
        assert_eq!(comment.like_count, 4);
    }

    #[test]
    fn page_token_is_the_cursor() {
        assert_eq!(next_page_token(&json!({ "nextPageToken": "p2" })), Some("p2".into()));
        assert_eq!(next_page_token(&json!({ "items": [] })), None);
    }
}
