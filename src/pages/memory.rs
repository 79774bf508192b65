use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::models::PageRecord;
use super::repository::{PageSource, PageTable};
use crate::error::{MonitorError, MonitorResult};

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-memory page source for tests
#[derive(Default)]
pub struct InMemoryPageSource {
    unified: RwLock<HashMap<String, Vec<PageRecord>>>,
    legacy_primary: RwLock<HashMap<String, Vec<PageRecord>>>,
    legacy_secondary: RwLock<HashMap<String, Vec<PageRecord>>>,
    failing_tenants: RwLock<HashSet<String>>,
    panicking_tenants: RwLock<HashSet<String>>,
    delay: RwLock<Option<Duration>>,
    unified_reads: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    closed: AtomicUsize,
}

impl InMemoryPageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unified(&self, tenant_id: &str, pages: Vec<PageRecord>) {
        self.unified.write().insert(tenant_id.to_string(), pages);
    }

    pub fn set_legacy_primary(&self, tenant_id: &str, pages: Vec<PageRecord>) {
        self.legacy_primary.write().insert(tenant_id.to_string(), pages);
    }

    pub fn set_legacy_secondary(&self, tenant_id: &str, pages: Vec<PageRecord>) {
        self.legacy_secondary.write().insert(tenant_id.to_string(), pages);
    }

    /// Every read for this tenant returns a database error
    pub fn fail_tenant(&self, tenant_id: &str) {
        self.failing_tenants.write().insert(tenant_id.to_string());
    }

    pub fn heal_tenant(&self, tenant_id: &str) {
        self.failing_tenants.write().remove(tenant_id);
    }

    /// Every read for this tenant panics
    pub fn panic_tenant(&self, tenant_id: &str) {
        self.panicking_tenants.write().insert(tenant_id.to_string());
    }

    /// Every read sleeps this long before answering
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.write() = Some(delay);
    }

    pub fn unified_reads(&self) -> usize {
        self.unified_reads.load(Ordering::SeqCst)
    }

    /// Most reads that were ever running at the same moment
    pub fn peak_concurrent_reads(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    async fn read(
        &self,
        tables: &RwLock<HashMap<String, Vec<PageRecord>>>,
        tenant_id: &str,
    ) -> MonitorResult<Vec<PageRecord>> {
        if self.panicking_tenants.read().contains(tenant_id) {
            panic!("page source blew up for tenant {}", tenant_id);
        }

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        // released on every exit, including a read dropped by a timeout
        let _in_flight = InFlight(&self.in_flight);

        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_tenants.read().contains(tenant_id) {
            return Err(MonitorError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(tables.read().get(tenant_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl PageSource for InMemoryPageSource {
    fn table_name(&self, table: PageTable) -> &str {
        match table {
            PageTable::Unified => "facebook_pages_unified",
            PageTable::LegacyPrimary => "facebook_pages",
            PageTable::LegacySecondary => "company_facebook_pages",
        }
    }

    async fn fetch_unified(&self, tenant_id: &str) -> MonitorResult<Vec<PageRecord>> {
        self.unified_reads.fetch_add(1, Ordering::SeqCst);
        self.read(&self.unified, tenant_id).await
    }

    async fn fetch_legacy_primary(&self, tenant_id: &str) -> MonitorResult<Vec<PageRecord>> {
        self.read(&self.legacy_primary, tenant_id).await
    }

    async fn fetch_legacy_secondary(&self, tenant_id: &str) -> MonitorResult<Vec<PageRecord>> {
        self.read(&self.legacy_secondary, tenant_id).await
    }

    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}
