// Pass supervisor.
//
// One driver task per adapter. A driver owns its in-flight pass in a JoinSet:
// a tick is skipped while the previous pass of the same adapter is still
// running, so each output stream has a single writer. Passes of different
// adapters run concurrently. A failed or panicked pass is logged and the next
// tick runs as usual. Stopping a driver aborts its pass.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use pressline_archive::{ArchiveError, PassSummary, SourceAdapter};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{interval_at, sleep, Interval, MissedTickBehavior};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::schedule::Schedule;

/// An adapter and when to run it.
pub struct Job {
    pub adapter: Arc<dyn SourceAdapter>,
    pub schedule: Schedule,
}

/// Run one pass inside its own span, logging the outcome.
pub async fn run_pass(adapter: &dyn SourceAdapter) -> Result<PassSummary, ArchiveError> {
    let pass_id = Uuid::new_v4();
    let span = info_span!("pass", adapter = adapter.name(), %pass_id);

    async {
        info!("Pass starting");
        let started = Instant::now();
        let result = adapter.run_pass().await;
        let elapsed_secs = started.elapsed().as_secs();
        match &result {
            Ok(summary) => info!(%summary, elapsed_secs, "Pass finished"),
            Err(e) => error!(error = %e, elapsed_secs, "Pass aborted"),
        }
        result
    }
    .instrument(span)
    .await
}

fn report(adapter: &str, joined: Result<(), JoinError>) {
    match joined {
        Ok(()) => {}
        Err(e) if e.is_panic() => error!(adapter, error = %e, "Pass panicked"),
        Err(e) => warn!(adapter, error = %e, "Pass cancelled"),
    }
}

/// Start a pass unless one is already in flight for this adapter.
fn launch(adapter: &Arc<dyn SourceAdapter>, passes: &mut JoinSet<()>) -> bool {
    while let Some(joined) = passes.try_join_next() {
        report(adapter.name(), joined);
    }
    if !passes.is_empty() {
        warn!(adapter = adapter.name(), "Previous pass still running, skipping tick");
        return false;
    }
    let adapter = adapter.clone();
    passes.spawn(async move {
        // Outcome is logged inside the pass span.
        let _ = run_pass(adapter.as_ref()).await;
    });
    true
}

/// Resolves at the next scheduled start.
async fn next_start(schedule: &Schedule, ticks: Option<&mut Interval>) {
    match ticks {
        Some(ticks) => {
            ticks.tick().await;
        }
        None => sleep(schedule.next_delay(Local::now())).await,
    }
}

async fn drive(job: Job) {
    let Job { adapter, schedule } = job;
    let mut passes = JoinSet::new();
    info!(adapter = adapter.name(), %schedule, "Adapter scheduled");

    let mut ticks = match schedule {
        Schedule::Every(period) => {
            let mut ticks = interval_at(tokio::time::Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            Some(ticks)
        }
        Schedule::DailyAt(_) => None,
    };
    if schedule.runs_at_startup() {
        launch(&adapter, &mut passes);
    }

    loop {
        tokio::select! {
            _ = next_start(&schedule, ticks.as_mut()) => {
                launch(&adapter, &mut passes);
            }
            Some(joined) = passes.join_next() => report(adapter.name(), joined),
        }
    }
}

/// Drive every job until `shutdown` resolves. Shutting down aborts passes in
/// flight; every line they wrote is already synced.
pub async fn supervise(jobs: Vec<Job>, shutdown: impl Future<Output = ()>) {
    let mut drivers = JoinSet::new();
    for job in jobs {
        drivers.spawn(drive(job));
    }
    if drivers.is_empty() {
        warn!("No adapters enabled, nothing to schedule");
        return;
    }

    shutdown.await;
    info!("Shutdown requested, stopping schedules");
    drivers.shutdown().await;
}
