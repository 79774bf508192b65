use async_trait::async_trait;
use sqlx::MySqlPool;
use tracing::{debug, info};

use super::models::PageRecord;
use crate::error::MonitorResult;

/// Which table a read targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageTable {
    Unified,
    LegacyPrimary,
    LegacySecondary,
}

/// Read-only access to the three page tables being reconciled
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Name of the backing table, used in logs and timeout errors
    fn table_name(&self, table: PageTable) -> &str;

    /// Active pages of the tenant in the unified table
    async fn fetch_unified(&self, tenant_id: &str) -> MonitorResult<Vec<PageRecord>>;

    async fn fetch_legacy_primary(&self, tenant_id: &str) -> MonitorResult<Vec<PageRecord>>;

    async fn fetch_legacy_secondary(&self, tenant_id: &str) -> MonitorResult<Vec<PageRecord>>;

    async fn close(&self) {}
}

/// MySQL-backed page source
pub struct MySqlPageRepository {
    pool: MySqlPool,
    unified_table: String,
    legacy_primary_table: String,
    legacy_secondary_table: String,
}

impl MySqlPageRepository {
    /// Table names must already be validated as plain identifiers.
    pub fn new(
        pool: MySqlPool,
        unified_table: String,
        legacy_primary_table: String,
        legacy_secondary_table: String,
    ) -> Self {
        Self {
            pool,
            unified_table,
            legacy_primary_table,
            legacy_secondary_table,
        }
    }

    fn select_sql(table: &str, active_only: bool) -> String {
        let active_filter = if active_only { " AND is_active = 1" } else { "" };
        format!(
            r#"
            SELECT CAST(page_id AS CHAR) AS page_id, page_name,
                   CAST(company_id AS CHAR) AS company_id,
                   is_active, webhook_enabled, access_token, created_at, updated_at
            FROM `{}`
            WHERE company_id = ?{}
            ORDER BY page_id
            "#,
            table, active_filter
        )
    }

    async fn fetch(&self, table: &str, tenant_id: &str, active_only: bool) -> MonitorResult<Vec<PageRecord>> {
        let pages = sqlx::query_as::<_, PageRecord>(&Self::select_sql(table, active_only))
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await?;

        debug!("📊 {} rows from {} for tenant {}", pages.len(), table, tenant_id);
        Ok(pages)
    }
}

#[async_trait]
impl PageSource for MySqlPageRepository {
    fn table_name(&self, table: PageTable) -> &str {
        match table {
            PageTable::Unified => &self.unified_table,
            PageTable::LegacyPrimary => &self.legacy_primary_table,
            PageTable::LegacySecondary => &self.legacy_secondary_table,
        }
    }

    async fn fetch_unified(&self, tenant_id: &str) -> MonitorResult<Vec<PageRecord>> {
        self.fetch(&self.unified_table, tenant_id, true).await
    }

    async fn fetch_legacy_primary(&self, tenant_id: &str) -> MonitorResult<Vec<PageRecord>> {
        self.fetch(&self.legacy_primary_table, tenant_id, false).await
    }

    async fn fetch_legacy_secondary(&self, tenant_id: &str) -> MonitorResult<Vec<PageRecord>> {
        self.fetch(&self.legacy_secondary_table, tenant_id, false).await
    }

    async fn close(&self) {
        if !self.pool.is_closed() {
            self.pool.close().await;
            info!("✓ Database connection closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unified_query_filters_active() {
        let sql = MySqlPageRepository::select_sql("facebook_pages_unified", true);
        assert!(sql.contains("FROM `facebook_pages_unified`"));
        assert!(sql.contains("WHERE company_id = ? AND is_active = 1"));
    }

    #[test]
    fn test_legacy_query_has_no_active_filter() {
        let sql = MySqlPageRepository::select_sql("facebook_pages", false);
        assert!(sql.contains("FROM `facebook_pages`"));
        assert!(!sql.contains("is_active = 1"));
    }
}
