// Test mocks for adapter passes.
//
// MockFetcher answers requests from canned responses keyed by a substring of
// the request line (URL plus unencoded query). Responses registered for the
// same key are served in order; the last one repeats. Every request is logged.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{ArchiveError, Result};
use crate::fetch::{FetchRequest, FetchedBody, PageFetcher};

enum Reply {
    Body(FetchedBody),
    NetworkError(String),
}

struct Route {
    pattern: String,
    replies: VecDeque<Reply>,
}

/// Route-based fetcher. Returns `Err` for requests no route matches.
/// Builder pattern: `.on()`, `.on_json()`, `.on_network_error()`.
#[derive(Default)]
pub struct MockFetcher {
    routes: Mutex<Vec<Route>>,
    log: Mutex<Vec<FetchRequest>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, pattern: &str, reply: Reply) -> Self {
        {
            let mut routes = self.routes.lock().expect("routes lock");
            match routes.iter_mut().find(|r| r.pattern == pattern) {
                Some(route) => route.replies.push_back(reply),
                None => routes.push(Route {
                    pattern: pattern.to_string(),
                    replies: VecDeque::from([reply]),
                }),
            }
        }
        self
    }

    pub fn on(self, pattern: &str, body: FetchedBody) -> Self {
        self.push(pattern, Reply::Body(body))
    }

    pub fn on_json(self, pattern: &str, body: Value) -> Self {
        self.on(pattern, FetchedBody::ok(body.to_string()))
    }

    pub fn on_status(self, pattern: &str, status: u16) -> Self {
        self.on(
            pattern,
            FetchedBody {
                status,
                body: String::new(),
            },
        )
    }

    pub fn on_network_error(self, pattern: &str) -> Self {
        self.push(pattern, Reply::NetworkError("connection reset".to_string()))
    }

    /// Every request seen so far, in order.
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.log.lock().expect("log lock").clone()
    }

    /// Number of requests whose request line contains `pattern`.
    pub fn count(&self, pattern: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| request_line(r).contains(pattern))
            .count()
    }
}

/// `url?k=v&k=v` with values left unencoded, for matching.
pub fn request_line(request: &FetchRequest) -> String {
    if request.query.is_empty() {
        return request.url.clone();
    }
    let query: Vec<String> = request
        .query
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    format!("{}?{}", request.url, query.join("&"))
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedBody> {
        self.log.lock().expect("log lock").push(request.clone());

        let line = request_line(request);
        let mut routes = self.routes.lock().expect("routes lock");
        let route = routes
            .iter_mut()
            .find(|r| line.contains(&r.pattern))
            .ok_or_else(|| ArchiveError::Network {
                url: request.url.clone(),
                message: format!("MockFetcher: no route for {line}"),
            })?;

        let reply = if route.replies.len() > 1 {
            route.replies.pop_front()
        } else {
            route.replies.front().map(|r| match r {
                Reply::Body(b) => Reply::Body(b.clone()),
                Reply::NetworkError(m) => Reply::NetworkError(m.clone()),
            })
        };

        match reply {
            Some(Reply::Body(body)) => Ok(body),
            Some(Reply::NetworkError(message)) => Err(ArchiveError::Network {
                url: request.url.clone(),
                message,
            }),
            None => Err(ArchiveError::Network {
                url: request.url.clone(),
                message: "MockFetcher: route has no replies".to_string(),
            }),
        }
    }
}

// --- Microblog timeline fixtures ---

/// A timeline post entry.
pub fn post_entry(id: &str, expanded_url: Option<&str>) -> Value {
    let urls = match expanded_url {
        Some(url) => json!([{ "expanded_url": url }]),
        None => json!([]),
    };
    json!({
        "entryId": format!("tweet-{id}"),
        "content": {
            "itemContent": {
                "tweet_results": { "result": post_result(id, urls) }
            }
        }
    })
}

pub fn post_result(id: &str, urls: Value) -> Value {
    json!({
        "__typename": "Tweet",
        "core": { "user_results": { "result": { "legacy": {
            "name": "Newsroom",
            "screen_name": "newsroom",
            "description": "headlines",
            "followers_count": 1200,
            "friends_count": 3,
            "listed_count": 40,
            "created_at": "Tue Mar 01 00:00:00 +0000 2011"
        }}}},
        "views": { "count": "5400", "state": "EnabledWithCount" },
        "legacy": {
            "user_id_str": "99",
            "id_str": id,
            "full_text": format!("post {id}"),
            "created_at": "Wed Jan 31 12:00:00 +0000 2024",
            "quote_count": 2,
            "reply_count": 1,
            "retweet_count": 35,
            "favorite_count": 80,
            "bookmark_count": 0,
            "entities": { "urls": urls }
        }
    })
}

pub fn cursor_entry(value: &str) -> Value {
    json!({
        "entryId": "cursor-bottom-0",
        "content": { "entryType": "TimelineTimelineCursor", "value": value }
    })
}

pub fn search_page(entries: Vec<Value>) -> Value {
    json!({
        "data": { "search_by_raw_query": { "search_timeline": { "timeline": {
            "instructions": [
                { "type": "TimelineClearCache" },
                { "type": "TimelineAddEntries", "entries": entries }
            ]
        }}}}
    })
}

// --- News pickup fixture ---

/// A pickup page with a preloaded state carrying `title`.
pub fn pickup_page(title: &str) -> String {
    let state = json!({
        "pageData": {
            "path": "/pickup/6490000",
            "pageParam": { "topittl": title, "topitime": "20240131120000" },
            "description": "summary text",
            "pubDate": "2024-01-31T12:00:00+09:00",
            "updateDate": "2024-01-31T12:30:00+09:00"
        },
        "topicsDetail": { "article": { "title": title, "mediaName": "Kyodo" } },
        "commentShort": { "totalCommentCount": 312 }
    });
    format!(
        "<html><head><script src=\"/app.js\"></script>\
         <script>window.__PRELOADED_STATE__ = {state};</script></head><body></body></html>"
    )
}

// --- Video fixtures ---

/// A channel search page listing `video_ids`, with an optional next-page token.
pub fn video_search_page(video_ids: &[&str], next_page_token: Option<&str>) -> Value {
    let items: Vec<Value> = video_ids
        .iter()
        .map(|id| {
            json!({
                "kind": "youtube#searchResult",
                "id": { "kind": "youtube#video", "videoId": id },
                "snippet": { "title": format!("video {id}") }
            })
        })
        .collect();
    let mut page = json!({ "kind": "youtube#searchListResponse", "items": items });
    if let Some(token) = next_page_token {
        page["nextPageToken"] = json!(token);
    }
    page
}

pub fn video_detail(id: &str, title: &str) -> Value {
    json!({
        "kind": "youtube#videoListResponse",
        "items": [{
            "id": id,
            "snippet": {
                "title": title,
                "description": "full report",
                "channelTitle": "Press Channel",
                "categoryId": "25",
                "tags": ["news"]
            },
            "statistics": {
                "viewCount": "1000",
                "likeCount": "50",
                "favoriteCount": "0",
                "commentCount": "12"
            }
        }]
    })
}

pub fn comment_item(id: &str, text: &str) -> Value {
    json!({
        "id": id,
        "snippet": { "topLevelComment": { "snippet": {
            "textDisplay": text,
            "authorDisplayName": "viewer",
            "authorChannelId": { "value": "UCviewer" },
            "likeCount": 4,
            "publishedAt": "2024-01-31T12:00:00Z",
            "updatedAt": "2024-01-31T12:00:00Z"
        }}}
    })
}

pub fn comment_page(items: Vec<Value>, next_page_token: Option<&str>) -> Value {
    let mut page = json!({ "kind": "youtube#commentThreadListResponse", "items": items });
    if let Some(token) = next_page_token {
        page["nextPageToken"] = json!(token);
    }
    page
}
