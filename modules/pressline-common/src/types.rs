// Normalized records written to the per-source item streams.
// One record per line; nested children (quotes, comments) live only inside
// their parent record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Microblog ---

/// Author fields of a microblog post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostAuthor {
    pub user_id_str: String,
    pub name: String,
    pub screen_name: String,
    pub description: String,
    pub followers_count: i64,
    pub friends_count: i64,
    pub listed_count: i64,
    pub user_created_at: String,
}

/// Body and engagement counters of a microblog post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostBody {
    pub id_str: String,
    pub full_text: String,
    pub created_at: String,
    pub quote_count: i64,
    pub reply_count: i64,
    pub retweet_count: i64,
    pub favorite_count: i64,
    pub bookmark_count: i64,
    pub views_count: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded_url: Option<String>,
}

/// A post without nested children: quote-posts and annotation references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub user: PostAuthor,
    pub tweet: PostBody,
    #[serde(with = "iso_seconds")]
    pub timestamp: DateTime<Utc>,
}

/// A watched account's post together with the posts quoting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotedPostRecord {
    pub user: PostAuthor,
    pub tweet: PostBody,
    pub quotes: Vec<PostRecord>,
    pub headline: Option<Headline>,
    #[serde(with = "iso_seconds")]
    pub timestamp: DateTime<Utc>,
}

impl QuotedPostRecord {
    pub fn id(&self) -> &str {
        &self.tweet.id_str
    }
}

/// Summary of a news-pickup page linked from a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Headline {
    pub path: String,
    pub topittl: String,
    pub topitime: String,
    pub title: String,
    pub description: String,
    pub media_name: String,
    /// Written as `pub_data`, the key existing headline streams use.
    #[serde(rename = "pub_data")]
    pub pub_date: String,
    pub update_date: String,
    pub total_comment_count: i64,
}

// --- Video ---

/// Video metadata from the detail endpoint. Counters stay strings, as upstream sends them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoDetail {
    pub id: String,
    pub title: String,
    pub description: String,
    pub channel_title: String,
    pub category_id: String,
    pub view_count: String,
    pub like_count: String,
    pub favorite_count: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_count: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub comment_id: String,
    pub text: String,
    pub author_display_name: String,
    pub author_channel_id: String,
    pub like_count: i64,
    pub published_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub video: VideoDetail,
    pub comments: Vec<CommentRecord>,
    #[serde(with = "iso_seconds")]
    pub timestamp: DateTime<Utc>,
}

impl VideoRecord {
    pub fn id(&self) -> &str {
        &self.video.id
    }
}

/// `2024-01-31T12:00:00Z`: second precision, literal `Z`.
pub mod iso_seconds {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FMT: &str = "%Y-%m-%dT%H:%M:%SZ";

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&at.format(FMT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, FMT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}
