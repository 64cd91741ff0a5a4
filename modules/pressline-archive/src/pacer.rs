use std::time::Duration;

use pressline_common::PacingPolicy;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Enforces a minimum spacing between outbound requests.
///
/// The first `wait()` returns immediately. Every later call sleeps for whatever
/// is left of `min_spacing` since the previous call returned. State is
/// in-process only.
pub struct Pacer {
    min_spacing: Duration,
    last: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(policy: PacingPolicy) -> Self {
        Self::with_spacing(policy.min_spacing())
    }

    pub fn with_spacing(min_spacing: Duration) -> Self {
        Self {
            min_spacing,
            last: Mutex::new(None),
        }
    }

    pub fn min_spacing(&self) -> Duration {
        self.min_spacing
    }

    /// How long a call made right now would block.
    pub async fn remaining(&self) -> Duration {
        let last = self.last.lock().await;
        self.remaining_since(*last)
    }

    fn remaining_since(&self, last: Option<Instant>) -> Duration {
        match last {
            Some(at) => self.min_spacing.saturating_sub(at.elapsed()),
            None => Duration::ZERO,
        }
    }

    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        let pause = self.remaining_since(*last);
        if !pause.is_zero() {
            debug!(pause_ms = pause.as_millis() as u64, "pacer: waiting");
            tokio::time::sleep(pause).await;
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch_pacer() -> Pacer {
        Pacer::new(PacingPolicy::windowed(500, Duration::from_secs(15 * 60)))
    }

    #[tokio::test(start_paused = true)]
    async fn first_wait_is_immediate() {
        let pacer = batch_pacer();
        let start = Instant::now();
        pacer.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_request_needs_no_wait() {
        let pacer = batch_pacer();
        pacer.wait().await;
        tokio::time::advance(Duration::from_secs(5)).await;

        let start = Instant::now();
        pacer.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn fast_request_waits_out_the_spacing() {
        let pacer = batch_pacer();
        pacer.wait().await;
        tokio::time::advance(Duration::from_millis(500)).await;

        assert_eq!(pacer.remaining().await, Duration::from_millis(1300));
        let start = Instant::now();
        pacer.wait().await;
        assert_eq!(start.elapsed(), Duration::from_millis(1300));
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_delay_spaces_back_to_back_calls() {
        let pacer = Pacer::new(PacingPolicy::fixed(Duration::from_secs(5)));
        let start = Instant::now();
        for _ in 0..3 {
            pacer.wait().await;
        }
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }
}
