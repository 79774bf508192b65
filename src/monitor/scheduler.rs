// Polling loop for the reconciliation monitor.
//
// - First cycle runs as soon as the loop starts
// - Cycles never overlap: the loop and `run_cycle` share one cycle lock, and
//   ticks missed while a cycle runs are skipped
// - Each cycle is bounded by the watchdog and isolated from panics

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tokio::sync::watch;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::info;
use uuid::Uuid;

use super::{CycleReport, MonitorCore, SweepOutcome};

/// Run cycles on the configured interval until shutdown is signalled
/// or the sender is dropped.
pub(crate) async fn run_loop(core: Arc<MonitorCore>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(core.config.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        run_guarded_cycle(&core).await;
    }

    info!("✓ Reconciliation loop exited");
}

/// One sweep with the watchdog applied and panics caught. Callers queue on
/// the cycle lock, so the loop and `run_cycle` never sweep at the same time.
pub(crate) async fn run_guarded_cycle(core: &Arc<MonitorCore>) -> CycleReport {
    let _cycle = core.cycle_lock.lock().await;
    let cycle_id = Uuid::new_v4();
    let started = Instant::now();
    let limit = core.config.cycle_timeout();

    let guarded = AssertUnwindSafe(core.sweep(cycle_id)).catch_unwind();
    let (outcome, aborted) = match timeout(limit, guarded).await {
        Ok(Ok(outcome)) => (outcome, None),
        Ok(Err(panic)) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            (SweepOutcome::default(), Some(format!("cycle panicked: {}", reason)))
        }
        Err(_) => (
            SweepOutcome::default(),
            Some(format!(
                "cycle exceeded watchdog of {}ms",
                core.config.cycle_timeout_ms
            )),
        ),
    };

    core.conclude(cycle_id, started, outcome, aborted).await
}
