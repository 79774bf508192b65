// Reconciliation monitor: per-tenant comparison, logging and the polling lifecycle
pub mod alert;
pub mod journal;
pub mod scheduler;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::MonitorConfig;
use crate::error::{MonitorError, MonitorResult};
use crate::pages::{PageRecord, PageSource, PageTable};
use crate::reconcile::{diff, merge_legacy, ComparisonResult};
use alert::{AlertDecision, AlertPolicy};
use journal::ReconciliationLog;

/// Summary of one sweep over all configured tenants
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub tenants_checked: usize,
    /// Tenants whose comparison failed or diverged
    pub failed_tenants: Vec<String>,
    /// Results that could not be written to the log file
    pub journal_errors: usize,
    /// Set when the cycle was cut short by the watchdog or a panic
    pub aborted: Option<String>,
    pub consecutive_failures: u32,
    pub alert_raised: bool,
    pub elapsed: Duration,
}

impl CycleReport {
    pub fn is_clean(&self) -> bool {
        self.failed_tenants.is_empty() && self.journal_errors == 0 && self.aborted.is_none()
    }
}

/// What a sweep produced before the failure counter is updated
#[derive(Debug, Default)]
struct SweepOutcome {
    tenants_checked: usize,
    failed_tenants: Vec<String>,
    journal_errors: usize,
}

/// State shared between the monitor handle and its polling task
pub(crate) struct MonitorCore {
    config: Arc<MonitorConfig>,
    source: Arc<dyn PageSource>,
    journal: ReconciliationLog,
    alerts: Mutex<AlertPolicy>,
    /// Held for the whole of a cycle, whoever started it
    cycle_lock: tokio::sync::Mutex<()>,
}

impl MonitorCore {
    async fn timed<F>(&self, table: PageTable, query: F) -> MonitorResult<Vec<PageRecord>>
    where
        F: Future<Output = MonitorResult<Vec<PageRecord>>>,
    {
        match tokio::time::timeout(self.config.query_timeout(), query).await {
            Ok(result) => result,
            Err(_) => Err(MonitorError::QueryTimeout {
                table: self.source.table_name(table).to_string(),
                timeout_ms: self.config.query_timeout_ms,
            }),
        }
    }

    /// Compare one tenant. Query failures come back as a failed result.
    async fn compare_tenant(&self, cycle_id: Uuid, tenant_id: &str) -> ComparisonResult {
        debug!("🔍 Comparing pages for tenant {}", tenant_id);

        let fetched = async {
            let unified = self
                .timed(PageTable::Unified, self.source.fetch_unified(tenant_id))
                .await?;
            let primary = self
                .timed(PageTable::LegacyPrimary, self.source.fetch_legacy_primary(tenant_id))
                .await?;
            let secondary = self
                .timed(
                    PageTable::LegacySecondary,
                    self.source.fetch_legacy_secondary(tenant_id),
                )
                .await?;
            Ok::<_, MonitorError>((unified, primary, secondary))
        }
        .await;

        match fetched {
            Ok((unified, primary, secondary)) => {
                let legacy = merge_legacy(primary, secondary, self.config.legacy_precedence);
                if !legacy.duplicates.is_empty() {
                    debug!(
                        "Tenant {} has {} page ids in both legacy tables: {:?}",
                        tenant_id,
                        legacy.duplicates.len(),
                        legacy.duplicates
                    );
                }
                let page_diff = diff(&unified, &legacy.pages);
                ComparisonResult::from_diff(cycle_id, tenant_id, unified.len(), &legacy, page_diff)
            }
            Err(e) => {
                error!("❌ Comparison failed for tenant {}: {}", tenant_id, e);
                ComparisonResult::failed(cycle_id, tenant_id, e.to_string())
            }
        }
    }

    /// Append a result to the log file and echo it to the console.
    async fn record_and_log(&self, result: &ComparisonResult) -> MonitorResult<()> {
        self.journal.record(result).await
    }

    async fn sweep(&self, cycle_id: Uuid) -> SweepOutcome {
        let tenants = &self.config.tenants;
        info!(
            "🔄 Starting reconciliation cycle {} ({} tenants)",
            cycle_id,
            tenants.len()
        );

        let mut outcome = SweepOutcome::default();
        for (index, tenant_id) in tenants.iter().enumerate() {
            if index > 0 && !self.config.tenant_delay().is_zero() {
                tokio::time::sleep(self.config.tenant_delay()).await;
            }

            let result = self.compare_tenant(cycle_id, tenant_id).await;
            outcome.tenants_checked += 1;
            if !result.success {
                outcome.failed_tenants.push(tenant_id.clone());
            }
            if let Err(e) = self.record_and_log(&result).await {
                error!(
                    "❌ Failed to write reconciliation log for tenant {}: {}",
                    tenant_id, e
                );
                outcome.journal_errors += 1;
            }
        }

        outcome
    }

    /// Close out a cycle. The failure counter moves exactly once per cycle,
    /// including cycles cut short by the watchdog or a panic.
    async fn conclude(
        &self,
        cycle_id: Uuid,
        started: Instant,
        outcome: SweepOutcome,
        aborted: Option<String>,
    ) -> CycleReport {
        if let Some(reason) = &aborted {
            error!("❌ Reconciliation cycle {} aborted: {}", cycle_id, reason);
        }

        let clean = aborted.is_none()
            && outcome.failed_tenants.is_empty()
            && outcome.journal_errors == 0;
        let decision = self.finish_cycle(cycle_id, clean).await;

        let report = CycleReport {
            cycle_id,
            tenants_checked: outcome.tenants_checked,
            failed_tenants: outcome.failed_tenants,
            journal_errors: outcome.journal_errors,
            aborted,
            consecutive_failures: decision.consecutive_failures,
            alert_raised: decision.escalate,
            elapsed: started.elapsed(),
        };

        if report.is_clean() {
            info!(
                "✓ Cycle {} completed in {:?}: all {} tenants in sync",
                cycle_id, report.elapsed, report.tenants_checked
            );
        } else {
            warn!(
                "⚠️ Cycle {} completed in {:?}: {} of {} tenants failing (consecutive failing cycles: {})",
                cycle_id,
                report.elapsed,
                report.failed_tenants.len(),
                report.tenants_checked,
                report.consecutive_failures
            );
        }

        report
    }

    /// Update the consecutive failure counter and escalate once per cycle.
    async fn finish_cycle(&self, cycle_id: Uuid, clean: bool) -> AlertDecision {
        let (decision, threshold) = {
            let mut alerts = self.alerts.lock();
            (alerts.record_cycle(clean), alerts.threshold())
        };

        if decision.escalate {
            if let Err(e) = self
                .journal
                .record_alert(cycle_id, decision.consecutive_failures, threshold)
                .await
            {
                error!("❌ Failed to write alert to reconciliation log: {}", e);
            }
        }

        decision
    }
}

struct RunningLoop {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Periodically reconciles the unified page table against the legacy tables
pub struct ReconciliationMonitor {
    core: Arc<MonitorCore>,
    running: Mutex<Option<RunningLoop>>,
}

impl ReconciliationMonitor {
    pub fn new(
        config: MonitorConfig,
        source: Arc<dyn PageSource>,
        journal: ReconciliationLog,
    ) -> Self {
        let alerts = Mutex::new(AlertPolicy::new(config.alert_threshold));
        Self {
            core: Arc::new(MonitorCore {
                config: Arc::new(config),
                source,
                journal,
                alerts,
                cycle_lock: tokio::sync::Mutex::new(()),
            }),
            running: Mutex::new(None),
        }
    }

    /// Run one full sweep now, bounded by the cycle watchdog. Waits for a
    /// cycle already started by the polling loop to finish first.
    pub async fn run_cycle(&self) -> CycleReport {
        scheduler::run_guarded_cycle(&self.core).await
    }

    /// Start polling. Returns `false` when already running.
    pub fn start(&self) -> bool {
        let mut running = self.running.lock();
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            warn!("⚠️ Reconciliation monitor is already running");
            return false;
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(scheduler::run_loop(self.core.clone(), shutdown_rx));
        *running = Some(RunningLoop { shutdown, handle });

        info!(
            "▶️ Reconciliation monitor started: {} tenants every {:?}",
            self.core.config.tenants.len(),
            self.core.config.interval()
        );
        true
    }

    /// Stop polling, letting an in-flight cycle finish. The database stays open.
    pub async fn stop(&self) {
        let running = self.running.lock().take();
        let Some(running) = running else {
            return;
        };

        let _ = running.shutdown.send(true);
        if let Err(e) = running.handle.await {
            error!("❌ Reconciliation loop ended abnormally: {}", e);
        }
        info!("⏹️ Reconciliation monitor stopped");
    }

    /// Stop polling and release the database connection.
    pub async fn close(&self) {
        self.stop().await;
        self.core.source.close().await;
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.core.alerts.lock().consecutive_failures()
    }
}
