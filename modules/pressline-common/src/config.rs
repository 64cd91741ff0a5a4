use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::Deserialize;
use tracing::info;

use crate::error::ConfigError;
use crate::pacing::PacingPolicy;

/// TOML-backed configuration loaded from disk.
/// Secrets (API key, cookie file, bearer token) and the data root stay as env vars.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub twitter: TwitterEndpoints,
    pub twitter_quote: Option<TwitterQuoteConfig>,
    pub youtube: Option<YouTubeConfig>,
    pub birdwatch_export: Option<BirdwatchExportConfig>,
    pub birdwatch_ref: Option<BirdwatchRefConfig>,
}

/// Endpoints and client identity shared by every adapter that talks to the microblog web API.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TwitterEndpoints {
    pub search_url: String,
    pub tweets_by_ids_url: String,
    pub search_page_url: String,
    pub cookie_url: String,
    pub user_agent: String,
    pub client_uuid: String,
    pub client_language: String,
    pub accept_language: String,
}

impl Default for TwitterEndpoints {
    fn default() -> Self {
        Self {
            search_url: "https://twitter.com/i/api/graphql/lZ0GCEojmtQfiUQa5oJSEw/SearchTimeline"
                .to_string(),
            tweets_by_ids_url:
                "https://twitter.com/i/api/graphql/BWy5aoI-WvwbkHaSCAw2Iw/TweetResultsByRestIds"
                    .to_string(),
            search_page_url: "https://twitter.com/search".to_string(),
            cookie_url: "https://twitter.com".to_string(),
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36"
                .to_string(),
            client_uuid: "a0f767a2-2b96-4667-b672-b70cf9e2acc8".to_string(),
            client_language: "ja".to_string(),
            accept_language: "ja,en-US;q=0.9,en;q=0.8".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TwitterQuoteConfig {
    pub handle: String,
    pub screen_names: Vec<String>,
    pub delta_days: i64,
    pub period_hours: i64,
    pub min_retweet: u32,
    pub min_favorite: u32,
    pub quote_min_retweet: u32,
    pub quote_min_favorite: u32,
    pub request_count: u32,
    pub quote_request_count: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    pub interval_hours: u64,
    pub pacing: PacingPolicy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct YouTubeConfig {
    pub handle: String,
    pub channel_ids: Vec<String>,
    pub delta_days: i64,
    pub period_days: i64,
    pub request_count: u32,
    pub comment_request_count: u32,
    pub interval_hours: u64,
    pub pacing: PacingPolicy,
    #[serde(default = "default_youtube_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BirdwatchExportConfig {
    pub interval_hours: u64,
    /// How many days back (including today) to mirror.
    #[serde(default = "default_export_days")]
    pub days: u32,
    #[serde(default = "default_birdwatch_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BirdwatchRefConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Local wall-clock time of the daily run, `HH:MM`.
    pub daily_at: String,
    #[serde(default = "default_batch_pacing")]
    pub pacing: PacingPolicy,
}

impl BirdwatchRefConfig {
    pub fn daily_at(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(&self.daily_at, "%H:%M").map_err(|e| ConfigError::Invalid {
            field: "birdwatch_ref.daily_at",
            reason: e.to_string(),
        })
    }
}

fn default_page_size() -> u32 {
    20
}

fn default_youtube_base_url() -> String {
    "https://www.googleapis.com/youtube/v3".to_string()
}

fn default_export_days() -> u32 {
    2
}

fn default_birdwatch_base_url() -> String {
    "https://ton.twimg.com/birdwatch-public-data".to_string()
}

fn default_batch_size() -> usize {
    220
}

fn default_batch_pacing() -> PacingPolicy {
    PacingPolicy::Windowed {
        requests_per_window: 500,
        window_secs: 15 * 60,
    }
}

impl FileConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(c) = &self.twitter_quote {
            c.pacing.validate()?;
        }
        if let Some(c) = &self.youtube {
            c.pacing.validate()?;
        }
        if let Some(c) = &self.birdwatch_ref {
            c.pacing.validate()?;
            c.daily_at()?;
            if c.batch_size == 0 {
                return Err(ConfigError::Invalid {
                    field: "birdwatch_ref.batch_size",
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Load, parse, and validate a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: FileConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid config file: {}", path.display()))?;
    Ok(config)
}

/// Application configuration: file settings plus secrets from the environment.
/// Built once at startup and handed to each adapter.
#[derive(Debug, Clone)]
pub struct Config {
    pub raw_data_dir: PathBuf,
    pub youtube_api_key: Option<String>,
    pub twitter_cookie_path: Option<PathBuf>,
    pub twitter_bearer_token: Option<String>,
    pub file: FileConfig,
}

impl Config {
    /// Combine file settings with `RAW_DATA_DIR`, `YOUTUBE_API_KEY`,
    /// `TWITTER_COOKIE_PATH` and `TWITTER_BEARER_TOKEN`.
    /// Only `RAW_DATA_DIR` is required; a missing secret disables the adapters that need it.
    pub fn from_env(file: FileConfig) -> Result<Self, ConfigError> {
        let raw_data_dir = env::var("RAW_DATA_DIR")
            .map(PathBuf::from)
            .map_err(|_| ConfigError::MissingEnv("RAW_DATA_DIR"))?;

        Ok(Self {
            raw_data_dir,
            youtube_api_key: optional_env("YOUTUBE_API_KEY"),
            twitter_cookie_path: optional_env("TWITTER_COOKIE_PATH").map(PathBuf::from),
            twitter_bearer_token: optional_env("TWITTER_BEARER_TOKEN"),
            file,
        })
    }

    pub fn twitter_dir(&self) -> PathBuf {
        self.raw_data_dir.join("Twitter")
    }

    pub fn youtube_dir(&self) -> PathBuf {
        self.raw_data_dir.join("YouTube")
    }

    pub fn birdwatch_dir(&self) -> PathBuf {
        self.raw_data_dir.join("Birdwatch")
    }

    pub fn birdwatch_ref_dir(&self) -> PathBuf {
        self.raw_data_dir.join("BirdwatchRef")
    }

    /// Log the effective configuration with secrets reduced to presence flags.
    pub fn log_redacted(&self) {
        info!(
            raw_data_dir = %self.raw_data_dir.display(),
            youtube_api_key = self.youtube_api_key.is_some(),
            twitter_cookie_path = self.twitter_cookie_path.is_some(),
            twitter_bearer_token = self.twitter_bearer_token.is_some(),
            twitter_quote = self.file.twitter_quote.is_some(),
            youtube = self.file.youtube.is_some(),
            birdwatch_export = self.file.birdwatch_export.is_some(),
            birdwatch_ref = self.file.birdwatch_ref.is_some(),
            "Loaded config"
        );
    }
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
