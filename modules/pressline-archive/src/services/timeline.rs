// Microblog web GraphQL: request construction and timeline parsing shared by
// the quote adapter and the annotation-reference batch.

use pressline_common::config::TwitterEndpoints;
use pressline_common::{PostAuthor, PostBody};
use serde_json::{json, Value};

use crate::error::{ArchiveError, Result};
use crate::extract::{ExtractError, Fields};
use crate::fetch::FetchRequest;

/// Feature flags the web client sends with every GraphQL read.
pub(crate) const FEATURES: &str = r#"{"responsive_web_graphql_exclude_directive_enabled":true,"verified_phone_label_enabled":false,"responsive_web_home_pinned_timelines_enabled":true,"creator_subscriptions_tweet_preview_api_enabled":true,"responsive_web_graphql_timeline_navigation_enabled":true,"responsive_web_graphql_skip_user_profile_image_extensions_enabled":false,"c9s_tweet_anatomy_moderator_badge_enabled":true,"tweetypie_unmention_optimization_enabled":true,"responsive_web_edit_tweet_api_enabled":true,"graphql_is_translatable_rweb_tweet_is_translatable_enabled":true,"view_counts_everywhere_api_enabled":true,"longform_notetweets_consumption_enabled":true,"responsive_web_twitter_article_tweet_consumption_enabled":false,"tweet_awards_web_tipping_enabled":false,"freedom_of_speech_not_reach_fetch_enabled":true,"standardized_nudges_misinfo":true,"tweet_with_visibility_results_prefer_gql_limited_actions_policy_enabled":true,"longform_notetweets_rich_text_read_enabled":true,"longform_notetweets_inline_media_enabled":true,"responsive_web_media_download_video_enabled":false,"responsive_web_enhance_cards_enabled":false}"#;

const BOTTOM_CURSOR_PREFIX: &str = "cursor-bottom-";

/// A GraphQL GET with the headers the web client sends. Authorization and the
/// CSRF token are added by the fetcher's credentials.
pub(crate) fn graphql_request(
    endpoints: &TwitterEndpoints,
    url: &str,
    variables: &Value,
    referer: &str,
) -> FetchRequest {
    FetchRequest::get(url)
        .query("variables", variables.to_string())
        .query("features", FEATURES)
        .header("accept", "*/*")
        .header("accept-language", endpoints.accept_language.clone())
        .header("content-type", "application/json")
        .header("dnt", "1")
        .header("referer", referer)
        .header("user-agent", endpoints.user_agent.clone())
        .header("x-client-uuid", endpoints.client_uuid.clone())
        .header("x-twitter-active-user", "yes")
        .header("x-twitter-auth-type", "OAuth2Session")
        .header("x-twitter-client-language", endpoints.client_language.clone())
}

pub(crate) fn search_variables(
    raw_query: &str,
    count: u32,
    cursor: Option<&str>,
    query_source: &str,
) -> Value {
    let mut variables = json!({
        "rawQuery": raw_query,
        "count": count,
        "querySource": query_source,
        "product": "Top",
    });
    if let Some(cursor) = cursor {
        variables["cursor"] = Value::String(cursor.to_string());
    }
    variables
}

/// Search page URL for a query, used as the referer of the GraphQL calls.
pub(crate) fn search_referer(endpoints: &TwitterEndpoints, raw_query: &str) -> String {
    url::Url::parse_with_params(
        &endpoints.search_page_url,
        &[("q", raw_query), ("src", "typed_query"), ("f", "top")],
    )
    .map(String::from)
    .unwrap_or_else(|_| endpoints.search_page_url.clone())
}

/// Entries of a SearchTimeline page. A page without the timeline structure is
/// malformed; a timeline with no entry list (end of results) is empty.
pub(crate) fn timeline_entries(page: &Value) -> Result<&[Value]> {
    let instructions = page
        .pointer("/data/search_by_raw_query/search_timeline/timeline/instructions")
        .and_then(Value::as_array)
        .ok_or_else(|| ArchiveError::malformed("search", "no timeline instructions"))?;

    Ok(instructions
        .iter()
        .find_map(|i| i.get("entries").and_then(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or(&[]))
}

/// Continuation token, if the last entry is the bottom cursor.
pub(crate) fn bottom_cursor(entries: &[Value]) -> Option<String> {
    let last = entries.last()?;
    let entry_id = last.get("entryId").and_then(Value::as_str)?;
    if !entry_id.starts_with(BOTTOM_CURSOR_PREFIX) {
        return None;
    }
    last.pointer("/content/value")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// The `tweet_results` node of an entry, or `None` for cursors, modules and
/// other non-post entries.
pub(crate) fn tweet_results(entry: &Value) -> Option<Fields<'_>> {
    entry
        .pointer("/content/itemContent/tweet_results")
        .map(Fields::new)
}

/// Post id for failure logs, read without requiring the rest of the post.
pub(crate) fn post_id_hint<'a>(tweet_results: &Fields<'a>) -> Option<&'a str> {
    tweet_results
        .opt_str("/result/legacy/id_str")
        .or_else(|| tweet_results.opt_str("/result/tweet/legacy/id_str"))
        .or_else(|| tweet_results.opt_str("/result/rest_id"))
}

/// Author and body of a post from its `tweet_results` node.
pub(crate) fn extract_post(tweet_results: Fields<'_>) -> std::result::Result<(PostAuthor, PostBody), ExtractError> {
    let mut result = tweet_results.at("/result")?;
    if result.opt_str("/__typename") == Some("TweetWithVisibilityResults") {
        result = result.at("/tweet")?;
    }
    let legacy = result.at("/legacy")?;
    let user = result.at("/core/user_results/result/legacy")?;

    let author = PostAuthor {
        user_id_str: legacy.string("/user_id_str")?,
        name: user.string("/name")?,
        screen_name: user.string("/screen_name")?,
        description: user.string("/description")?,
        followers_count: user.i64("/followers_count")?,
        friends_count: user.i64("/friends_count")?,
        listed_count: user.i64("/listed_count")?,
        user_created_at: user.string("/created_at")?,
    };
    let body = PostBody {
        id_str: legacy.string("/id_str")?,
        full_text: legacy.string("/full_text")?,
        created_at: legacy.string("/created_at")?,
        quote_count: legacy.i64("/quote_count")?,
        reply_count: legacy.i64("/reply_count")?,
        retweet_count: legacy.i64("/retweet_count")?,
        favorite_count: legacy.i64("/favorite_count")?,
        bookmark_count: legacy.i64("/bookmark_count")?,
        views_count: result.opt_text("/views/count"),
        expanded_url: legacy
            .opt_str("/entities/urls/0/expanded_url")
            .map(str::to_string),
    };
    Ok((author, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{cursor_entry, post_entry, post_result, search_page};

    #[test]
    fn extracts_post_fields() {
        let entry = post_entry("123", Some("https://example.com/a"));
        let (author, body) = extract_post(tweet_results(&entry).unwrap()).unwrap();

        assert_eq!(author.screen_name, "newsroom");
        assert_eq!(author.followers_count, 1200);
        assert_eq!(body.id_str, "123");
        assert_eq!(body.retweet_count, 35);
        assert_eq!(body.views_count.as_deref(), Some("5400"));
        assert_eq!(body.expanded_url.as_deref(), Some("https://example.com/a"));
    }

    #[test]
    fn unwraps_visibility_wrapper() {
        let inner = post_result("7", json!([]));
        let node = json!({ "result": { "__typename": "TweetWithVisibilityResults", "tweet": inner } });
        let (_, body) = extract_post(Fields::new(&node)).unwrap();
        assert_eq!(body.id_str, "7");
        assert_eq!(body.expanded_url, None);
    }

    #[test]
    fn missing_required_field_names_it() {
        let mut entry = post_entry("1", None);
        entry["content"]["itemContent"]["tweet_results"]["result"]["legacy"]
            .as_object_mut()
            .unwrap()
            .remove("full_text");

        let err = extract_post(tweet_results(&entry).unwrap()).unwrap_err();
        assert_eq!(err.field(), "/result/legacy/full_text");
    }

    #[test]
    fn id_hint_survives_missing_fields() {
        let mut entry = post_entry("55", None);
        entry["content"]["itemContent"]["tweet_results"]["result"]
            .as_object_mut()
            .unwrap()
            .remove("core");
        let node = tweet_results(&entry).unwrap();

        assert!(extract_post(node.clone()).is_err());
        assert_eq!(post_id_hint(&node), Some("55"));

        let wrapped = json!({ "result": { "tweet": post_result("56", json!([])) } });
        assert_eq!(post_id_hint(&Fields::new(&wrapped)), Some("56"));
    }

    #[test]
    fn cursor_entries_are_not_posts() {
        assert!(tweet_results(&cursor_entry("abc")).is_none());
    }

    #[test]
    fn bottom_cursor_only_from_last_entry() {
        let page = search_page(vec![post_entry("1", None), cursor_entry("next")]);
        let entries = timeline_entries(&page).unwrap();
        assert_eq!(bottom_cursor(entries), Some("next".to_string()));

        let page = search_page(vec![cursor_entry("next"), post_entry("1", None)]);
        assert_eq!(bottom_cursor(timeline_entries(&page).unwrap()), None);
    }

    #[test]
    fn page_without_timeline_is_malformed() {
        let err = timeline_entries(&json!({ "errors": [] })).unwrap_err();
        assert!(matches!(err, ArchiveError::Malformed { stage: "search", .. }));
    }

    #[test]
    fn timeline_without_entries_is_empty() {
        let page = json!({
            "data": { "search_by_raw_query": { "search_timeline": { "timeline": {
                "instructions": [{ "type": "TimelineTerminateTimeline" }]
            }}}}
        });
        assert!(timeline_entries(&page).unwrap().is_empty());
    }

    #[test]
    fn variables_carry_cursor_only_when_present() {
        let first = search_variables("from:x", 20, None, "typed_query");
        assert!(first.get("cursor").is_none());
        let next = search_variables("from:x", 20, Some("c1"), "typed_query");
        assert_eq!(next["cursor"], "c1");
        assert_eq!(next["count"], 20);
    }

    #[test]
    fn request_has_client_headers() {
        let endpoints = TwitterEndpoints::default();
        let request = graphql_request(
            &endpoints,
            &endpoints.search_url,
            &json!({"rawQuery": "q"}),
            "https://ref",
        );
        assert_eq!(request.header_value("x-twitter-auth-type"), Some("OAuth2Session"));
        assert_eq!(request.header_value("referer"), Some("https://ref"));
        assert_eq!(request.query_value("features"), Some(FEATURES));
    }
}
