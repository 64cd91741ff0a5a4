// Adapter registry: builds the enabled adapters from config and secrets.
//
// An adapter is enabled when its section is present in the config file and
// the secrets it needs are set. Missing secrets disable it with a warning;
// secrets that are set but unusable (unreadable cookie file) are an error.

use std::sync::Arc;

use anyhow::{Context, Result};
use pressline_archive::{
    BirdwatchExportService, BirdwatchRefService, Credentials, HttpFetcher, PageFetcher, Session,
    TwitterQuoteService, YouTubeService,
};
use pressline_common::Config;
use tracing::{info, warn};

use crate::schedule::Schedule;
use crate::supervisor::Job;

/// Adapter names accepted on the command line.
pub const ADAPTERS: [&str; 4] = ["twitter_quote", "youtube", "birdwatch_export", "birdwatch_ref"];

/// Session-authenticated fetcher for the microblog web API, if both secrets are set.
fn twitter_fetcher(config: &Config) -> Result<Option<Arc<dyn PageFetcher>>> {
    let (Some(cookie_path), Some(bearer)) = (&config.twitter_cookie_path, &config.twitter_bearer_token) else {
        return Ok(None);
    };
    let session = Session::load(cookie_path, bearer)
        .with_context(|| format!("Failed to load session cookies from {}", cookie_path.display()))?;
    let fetcher = HttpFetcher::with_cookie_url(
        Credentials::Session(session),
        Some(&config.file.twitter.cookie_url),
    )?;
    Ok(Some(Arc::new(fetcher)))
}

/// Every enabled adapter with its schedule.
pub fn build_jobs(config: &Config) -> Result<Vec<Job>> {
    let mut jobs = Vec::new();
    let twitter = twitter_fetcher(config)?;

    if let Some(settings) = &config.file.twitter_quote {
        match &twitter {
            Some(fetcher) => jobs.push(Job {
                schedule: Schedule::every_hours(settings.interval_hours),
                adapter: Arc::new(TwitterQuoteService::new(
                    fetcher.clone(),
                    config.file.twitter.clone(),
                    settings.clone(),
                    &config.twitter_dir(),
                )),
            }),
            None => warn!(
                adapter = "twitter_quote",
                "TWITTER_COOKIE_PATH or TWITTER_BEARER_TOKEN not set, adapter disabled"
            ),
        }
    }

    if let Some(settings) = &config.file.youtube {
        match &config.youtube_api_key {
            Some(key) => {
                let fetcher = HttpFetcher::new(Credentials::ApiKey(key.clone()))?;
                jobs.push(Job {
                    schedule: Schedule::every_hours(settings.interval_hours),
                    adapter: Arc::new(YouTubeService::new(
                        Arc::new(fetcher),
                        settings.clone(),
                        &config.youtube_dir(),
                    )),
                });
            }
            None => warn!(adapter = "youtube", "YOUTUBE_API_KEY not set, adapter disabled"),
        }
    }

    if let Some(settings) = &config.file.birdwatch_export {
        let fetcher = HttpFetcher::new(Credentials::None)?;
        jobs.push(Job {
            schedule: Schedule::every_hours(settings.interval_hours),
            adapter: Arc::new(BirdwatchExportService::new(
                Arc::new(fetcher),
                settings.clone(),
                &config.birdwatch_dir(),
            )),
        });
    }

    if let Some(settings) = &config.file.birdwatch_ref {
        match &twitter {
            Some(fetcher) => jobs.push(Job {
                schedule: Schedule::DailyAt(settings.daily_at()?),
                adapter: Arc::new(BirdwatchRefService::new(
                    fetcher.clone(),
                    config.file.twitter.clone(),
                    settings.clone(),
                    &config.birdwatch_dir(),
                    &config.birdwatch_ref_dir(),
                )),
            }),
            None => warn!(
                adapter = "birdwatch_ref",
                "TWITTER_COOKIE_PATH or TWITTER_BEARER_TOKEN not set, adapter disabled"
            ),
        }
    }

    for job in &jobs {
        info!(adapter = job.adapter.name(), schedule = %job.schedule, "Adapter enabled");
    }
    Ok(jobs)
}
