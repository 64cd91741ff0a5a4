// Service: watched-account posts with the posts quoting them.
//
// For each screen name, search the account's well-engaged posts inside the
// trailing window, then for every new post search its quote-posts and, when it
// links a news pickup page, summarize that page. One record per post.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use futures::{pin_mut, Stream, StreamExt};
use pressline_common::config::{TwitterEndpoints, TwitterQuoteConfig};
use pressline_common::{BatchWindow, PostRecord, QuotedPostRecord};
use serde_json::Value;
use tracing::{info, warn};

use crate::adapter::{PassStats, PassSummary, SourceAdapter};
use crate::capture;
use crate::cursor::{paginate, PageSource};
use crate::error::Result;
use crate::fetch::PageFetcher;
use crate::layout::{today, StreamLayout};
use crate::ledger::DedupLedger;
use crate::pacer::Pacer;
use crate::sink::JsonlSink;

use super::timeline::{
    bottom_cursor, extract_post, graphql_request, post_id_hint, search_referer, search_variables,
    timeline_entries, tweet_results,
};
use super::yahoo_pickup;

const LEDGER_FILE: &str = "fetched.jsonl";

pub struct TwitterQuoteService {
    fetcher: Arc<dyn PageFetcher>,
    endpoints: TwitterEndpoints,
    settings: TwitterQuoteConfig,
    layout: StreamLayout,
    sink: JsonlSink,
}

impl TwitterQuoteService {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        endpoints: TwitterEndpoints,
        settings: TwitterQuoteConfig,
        output_dir: &Path,
    ) -> Self {
        let layout = StreamLayout::new(output_dir, &settings.handle);
        Self {
            fetcher,
            endpoints,
            settings,
            layout,
            sink: JsonlSink::new(),
        }
    }

    pub fn layout(&self) -> &StreamLayout {
        &self.layout
    }

    fn ledger(&self) -> DedupLedger {
        self.layout.ledger(LEDGER_FILE)
    }

    fn window(&self) -> BatchWindow {
        BatchWindow::trailing(
            Utc::now(),
            Duration::days(self.settings.delta_days),
            Duration::hours(self.settings.period_hours),
        )
    }

    fn account_query(&self, screen_name: &str, window: &BatchWindow) -> String {
        let (since, until) = window.search_bounds();
        format!(
            "From:{screen_name} min_retweets:{} min_faves:{} since:{since} until:{until}",
            self.settings.min_retweet, self.settings.min_favorite
        )
    }

    fn quote_query(&self, post_id: &str) -> String {
        format!(
            "quoted_tweet_id:{post_id} min_retweets:{} min_faves:{}",
            self.settings.quote_min_retweet, self.settings.quote_min_favorite
        )
    }

    /// New posts of one account inside `window`, each with its quotes and headline.
    ///
    /// Ids are appended to the ledger before the record is yielded, so a crash
    /// between the two loses the post rather than duplicating it.
    pub fn fetch_window<'a>(
        &'a self,
        screen_name: &'a str,
        window: BatchWindow,
        pacer: &'a Pacer,
        stats: &'a PassStats,
    ) -> impl Stream<Item = Result<QuotedPostRecord>> + Send + 'a {
        async_stream::try_stream! {
            let raw_query = self.account_query(screen_name, &window);
            let referer = search_referer(&self.endpoints, &raw_query);
            let ledger = self.ledger();
            let stream = self.layout.name();

            let pages = paginate(
                pacer,
                self.settings.request_count,
                SearchPages::new(self, raw_query, "typed_query", referer.clone(), "search"),
            );
            pin_mut!(pages);

            while let Some(page) = pages.next().await {
                let page = page?;
                stats.page();

                for entry in timeline_entries(&page)? {
                    let Some(node) = tweet_results(entry) else {
                        continue;
                    };
                    let hint = post_id_hint(&node);
                    let (user, tweet) = match extract_post(node) {
                        Ok(post) => post,
                        Err(e) => {
                            warn!(
                                stream,
                                screen_name,
                                id = hint.unwrap_or("unknown"),
                                stage = "search",
                                field = e.field(),
                                "Skipping malformed post"
                            );
                            stats.item_failure();
                            continue;
                        }
                    };

                    if ledger.contains(&tweet.id_str).await? {
                        stats.duplicate();
                        continue;
                    }
                    ledger.append(&tweet.id_str).await?;

                    let headline = match tweet.expanded_url.as_deref() {
                        Some(url) if yahoo_pickup::is_pickup(url) => {
                            yahoo_pickup::fetch_headline(
                                self.fetcher.as_ref(),
                                &self.endpoints.user_agent,
                                &self.endpoints.accept_language,
                                url,
                            )
                            .await
                        }
                        _ => None,
                    };
                    let quotes = self.fetch_quotes(&tweet.id_str, &referer, pacer, stats).await?;

                    yield QuotedPostRecord {
                        user,
                        tweet,
                        quotes,
                        headline,
                        timestamp: Utc::now(),
                    };
                }
            }
        }
    }

    /// Quote-posts of one post. Network, status and parse failures end the
    /// quote loop and keep what was collected; only local I/O errors escape.
    async fn fetch_quotes(
        &self,
        post_id: &str,
        referer: &str,
        pacer: &Pacer,
        stats: &PassStats,
    ) -> Result<Vec<PostRecord>> {
        let mut quotes = Vec::new();
        let stream = self.layout.name();
        let pages = paginate(
            pacer,
            self.settings.quote_request_count,
            SearchPages::new(self, self.quote_query(post_id), "tdqt", referer.to_string(), "quotes"),
        );
        pin_mut!(pages);

        while let Some(page) = pages.next().await {
            let page = match page {
                Ok(page) => page,
                Err(e) if e.is_io() => return Err(e),
                Err(e) => {
                    warn!(stream, id = post_id, stage = "quotes", error = %e, "Quote fetch failed, keeping quotes so far");
                    stats.nested_failure();
                    break;
                }
            };
            let entries = match timeline_entries(&page) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(stream, id = post_id, stage = "quotes", error = %e, "Quote page malformed, keeping quotes so far");
                    stats.nested_failure();
                    break;
                }
            };

            for entry in entries {
                let Some(node) = tweet_results(entry) else {
                    continue;
                };
                let hint = post_id_hint(&node);
                match extract_post(node) {
                    Ok((user, tweet)) => quotes.push(PostRecord {
                        user,
                        tweet,
                        timestamp: Utc::now(),
                    }),
                    Err(e) => {
                        warn!(
                            stream,
                            id = hint.unwrap_or("unknown"),
                            quoted_id = post_id,
                            stage = "quotes",
                            field = e.field(),
                            "Skipping malformed quote"
                        );
                        stats.item_failure();
                    }
                }
            }
        }
        Ok(quotes)
    }
}

/// SearchTimeline pages for one fixed query.
struct SearchPages<'a> {
    service: &'a TwitterQuoteService,
    raw_query: String,
    query_source: &'static str,
    referer: String,
    stage: &'static str,
}

impl<'a> SearchPages<'a> {
    fn new(
        service: &'a TwitterQuoteService,
        raw_query: String,
        query_source: &'static str,
        referer: String,
        stage: &'static str,
    ) -> Self {
        Self {
            service,
            raw_query,
            query_source,
            referer,
            stage,
        }
    }
}

#[async_trait]
impl<'a> PageSource for SearchPages<'a> {
    type Page = Value;

    async fn issue(&mut self, cursor: Option<&str>) -> Result<Value> {
        let service = self.service;
        let variables = search_variables(
            &self.raw_query,
            service.settings.page_size,
            cursor,
            self.query_source,
        );
        let request = graphql_request(
            &service.endpoints,
            &service.endpoints.search_url,
            &variables,
            &self.referer,
        );
        capture::fetch_json(
            service.fetcher.as_ref(),
            &service.sink,
            &service.layout.raw(today()),
            &request,
            self.stage,
        )
        .await
    }

    fn next_cursor(&self, page: &Value) -> Option<String> {
        timeline_entries(page).ok().and_then(bottom_cursor)
    }
}

#[async_trait]
impl SourceAdapter for TwitterQuoteService {
    fn name(&self) -> &'static str {
        "twitter_quote"
    }

    async fn run_pass(&self) -> Result<PassSummary> {
        let pacer = Pacer::new(self.settings.pacing);
        let stats = PassStats::new();
        let window = self.window();

        for screen_name in &self.settings.screen_names {
            info!(
                screen_name = screen_name.as_str(),
                since = %window.since,
                until = %window.until,
                "Fetching account posts"
            );
            let records = self.fetch_window(screen_name, window, &pacer, &stats);
            pin_mut!(records);
            while let Some(record) = records.next().await {
                let record = record?;
                self.sink.append(&self.layout.items(today()), &record).await?;
                stats.written();
                info!(id = record.id(), quotes = record.quotes.len(), "Post archived");
            }
        }

        let summary = stats.summary();
        info!(%summary, "twitter_quote pass complete");
        Ok(summary)
    }
}
