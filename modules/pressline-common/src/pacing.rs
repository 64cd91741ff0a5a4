use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// How far apart outbound requests to one upstream must be.
///
/// Two shapes are accepted in config:
///
/// ```toml
/// pacing = { fixed_delay_secs = 15 }
/// pacing = { requests_per_window = 500, window_secs = 900 }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PacingPolicy {
    Fixed {
        fixed_delay_secs: u64,
    },
    Windowed {
        requests_per_window: u32,
        window_secs: u64,
    },
}

impl PacingPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self::Fixed {
            fixed_delay_secs: delay.as_secs(),
        }
    }

    pub fn windowed(requests_per_window: u32, window: Duration) -> Self {
        Self::Windowed {
            requests_per_window,
            window_secs: window.as_secs(),
        }
    }

    /// Minimum spacing between two consecutive requests.
    pub fn min_spacing(&self) -> Duration {
        match *self {
            Self::Fixed { fixed_delay_secs } => Duration::from_secs(fixed_delay_secs),
            Self::Windowed {
                requests_per_window,
                window_secs,
            } => Duration::from_secs(window_secs) / requests_per_window.max(1),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Self::Windowed {
                requests_per_window: 0,
                ..
            } => Err(ConfigError::InvalidPacing(
                "requests_per_window must be greater than zero".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windowed_spacing_divides_window() {
        let policy = PacingPolicy::windowed(500, Duration::from_secs(15 * 60));
        assert_eq!(policy.min_spacing(), Duration::from_millis(1800));
    }

    #[test]
    fn fixed_spacing_is_the_delay() {
        let policy = PacingPolicy::fixed(Duration::from_secs(15));
        assert_eq!(policy.min_spacing(), Duration::from_secs(15));
    }

    #[test]
    fn zero_requests_per_window_is_rejected() {
        let policy = PacingPolicy::windowed(0, Duration::from_secs(60));
        assert!(policy.validate().is_err());
    }

    #[test]
    fn both_shapes_deserialize() {
        #[derive(Deserialize)]
        struct Holder {
            pacing: PacingPolicy,
        }

        let fixed: Holder = toml::from_str("pacing = { fixed_delay_secs = 5 }").unwrap();
        assert_eq!(fixed.pacing, PacingPolicy::Fixed { fixed_delay_secs: 5 });

        let windowed: Holder =
            toml::from_str("pacing = { requests_per_window = 500, window_secs = 900 }").unwrap();
        assert_eq!(
            windowed.pacing,
            PacingPolicy::Windowed {
                requests_per_window: 500,
                window_secs: 900
            }
        );
    }
}
