// News pickup pages: the headline summary embedded in the page's preloaded state.
//
// Any failure here (transport, status, missing script, missing field) leaves
// the parent post without a headline; it never fails the post.

use std::sync::LazyLock;

use pressline_common::Headline;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::extract::{ExtractError, Fields};
use crate::fetch::{FetchRequest, PageFetcher};

pub(crate) const PICKUP_PREFIX: &str = "https://news.yahoo.co.jp/pickup/";

const STATE_MARKER: &str = "__PRELOADED_STATE__";

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<script[^>]*>(.*?)</script>").expect("valid regex"));

pub(crate) fn is_pickup(url: &str) -> bool {
    url.starts_with(PICKUP_PREFIX)
}

/// Fetch a pickup page and summarize it. Unpaced: the page lives on a different
/// host from the API being rate limited.
pub(crate) async fn fetch_headline(
    fetcher: &dyn PageFetcher,
    user_agent: &str,
    accept_language: &str,
    url: &str,
) -> Option<Headline> {
    let request = FetchRequest::get(url)
        .header(
            "accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        )
        .header("accept-language", accept_language)
        .header("referer", url)
        .header("user-agent", user_agent);

    let page = match fetcher.fetch(&request).await {
        Ok(page) if page.is_success() => page,
        Ok(page) => {
            warn!(url, stage = "headline", status = page.status, "pickup page rejected");
            return None;
        }
        Err(e) => {
            warn!(url, stage = "headline", error = %e, "pickup page fetch failed");
            return None;
        }
    };

    let Some(state) = preloaded_state(&page.body) else {
        debug!(url, stage = "headline", "pickup page has no preloaded state");
        return None;
    };
    match headline_from_state(&state) {
        Ok(headline) => Some(headline),
        Err(e) => {
            warn!(url, stage = "headline", field = e.field(), "pickup state missing headline field");
            None
        }
    }
}

/// The JSON assigned to `window.__PRELOADED_STATE__`, if the page has one that parses.
pub(crate) fn preloaded_state(html: &str) -> Option<Value> {
    let script = SCRIPT_RE
        .captures_iter(html)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .find(|s| s.contains(STATE_MARKER))?;

    let (_, json) = script.split_once('=')?;
    let json = json.trim().trim_end_matches(';');
    serde_json::from_str(json).ok()
}

pub(crate) fn headline_from_state(state: &Value) -> Result<Headline, ExtractError> {
    let state = Fields::new(state);
    let page = state.at("/pageData")?;
    let article = state.at("/topicsDetail/article")?;

    Ok(Headline {
        path: page.string("/path")?,
        topittl: page.text("/pageParam/topittl")?,
        topitime: page.text("/pageParam/topitime")?,
        title: article.string("/title")?,
        description: page.string("/description")?,
        media_name: article.string("/mediaName")?,
        pub_date: page.text("/pubDate")?,
        update_date: page.text("/updateDate")?,
        total_comment_count: state.i64("/commentShort/totalCommentCount")?,
    })
}
