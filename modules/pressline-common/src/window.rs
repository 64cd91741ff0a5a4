use chrono::{DateTime, Duration, Utc};

/// Half-open time range `[since, until)` bounding the items one pass may pick up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchWindow {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl BatchWindow {
    /// Window that ends `delta` before `now` and spans `period`.
    pub fn trailing(now: DateTime<Utc>, delta: Duration, period: Duration) -> Self {
        let until = now - delta;
        Self {
            since: until - period,
            until,
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.since <= at && at < self.until
    }

    /// `2024-01-31_12:00:00_UTC`, the form the microblog search operators accept.
    pub fn search_bounds(&self) -> (String, String) {
        const FMT: &str = "%Y-%m-%d_%H:%M:%S_UTC";
        (
            self.since.format(FMT).to_string(),
            self.until.format(FMT).to_string(),
        )
    }

    /// RFC 3339 with second precision, as the video search API expects.
    pub fn rfc3339_bounds(&self) -> (String, String) {
        const FMT: &str = "%Y-%m-%dT%H:%M:%SZ";
        (
            self.since.format(FMT).to_string(),
            self.until.format(FMT).to_string(),
        )
    }
}
