use std::time::Duration;

use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Deserializer};

use crate::error::{MonitorError, MonitorResult};
use crate::reconcile::LegacyPrecedence;

/// Format of the entries appended to the reconciliation log file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line blocks with status markers, meant for humans
    Text,
    /// One JSON object per comparison result per line
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    /// Full connection URL; when absent the `db_*` parts are used
    pub database_url: Option<String>,
    pub db_host: String,
    pub db_port: u16,
    pub db_user: String,
    pub db_password: String,
    pub db_name: String,
    pub db_charset: String,
    pub db_timezone: String,
    pub max_connections: u32,

    pub interval_ms: u64,
    pub tenant_delay_ms: u64,
    pub query_timeout_ms: u64,
    pub cycle_timeout_ms: u64,

    pub log_file: String,
    pub log_format: LogFormat,
    /// Consecutive failing cycles before the escalation warning
    pub alert_threshold: u32,

    #[serde(deserialize_with = "comma_separated")]
    pub tenants: Vec<String>,

    pub unified_table: String,
    pub legacy_primary_table: String,
    pub legacy_secondary_table: String,
    pub legacy_precedence: LegacyPrecedence,

    pub run_once: bool,
}

impl MonitorConfig {
    /// Load configuration from `MONITOR_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_environment(Environment::with_prefix("MONITOR"))
    }

    fn from_environment(environment: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("db_host", "localhost")?
            .set_default("db_port", 3306_i64)?
            .set_default("db_user", "root")?
            .set_default("db_password", "")?
            .set_default("db_name", "app")?
            .set_default("db_charset", "utf8mb4")?
            .set_default("db_timezone", "+00:00")?
            .set_default("max_connections", 1_i64)?
            .set_default("interval_ms", 30_000_i64)?
            .set_default("tenant_delay_ms", 100_i64)?
            .set_default("query_timeout_ms", 10_000_i64)?
            .set_default("cycle_timeout_ms", 120_000_i64)?
            .set_default("log_file", "logs/comparison-monitor.log")?
            .set_default("log_format", "text")?
            .set_default("alert_threshold", 3_i64)?
            .set_default("unified_table", "facebook_pages_unified")?
            .set_default("legacy_primary_table", "facebook_pages")?
            .set_default("legacy_secondary_table", "company_facebook_pages")?
            .set_default("legacy_precedence", "primary")?
            .set_default("run_once", false)?
            .add_source(environment)
            .build()?
            .try_deserialize()
    }

    /// Reject values the monitor cannot run with.
    pub fn validate(&self) -> MonitorResult<()> {
        if self.tenants.is_empty() {
            return Err(MonitorError::InvalidConfig(
                "at least one tenant must be configured".to_string(),
            ));
        }
        if self.alert_threshold == 0 {
            return Err(MonitorError::InvalidConfig(
                "alert_threshold must be at least 1".to_string(),
            ));
        }
        if self.interval_ms == 0 {
            return Err(MonitorError::InvalidConfig(
                "interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(MonitorError::InvalidConfig(
                "max_connections must be at least 1".to_string(),
            ));
        }
        for table in [
            &self.unified_table,
            &self.legacy_primary_table,
            &self.legacy_secondary_table,
        ] {
            if !is_sql_identifier(table) {
                return Err(MonitorError::InvalidConfig(format!(
                    "invalid table name: {:?}",
                    table
                )));
            }
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn tenant_delay(&self) -> Duration {
        Duration::from_millis(self.tenant_delay_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_millis(self.cycle_timeout_ms)
    }
}

/// Table names are interpolated into queries, so only plain identifiers pass.
fn is_sql_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn comma_separated<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw
        .split(',')
        .map(str::trim)
        .filter(|tenant| !tenant.is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
pub(crate) fn test_config(tenants: &[&str]) -> MonitorConfig {
    MonitorConfig {
        database_url: None,
        db_host: "localhost".to_string(),
        db_port: 3306,
        db_user: "root".to_string(),
        db_password: String::new(),
        db_name: "app".to_string(),
        db_charset: "utf8mb4".to_string(),
        db_timezone: "+00:00".to_string(),
        max_connections: 1,
        interval_ms: 60_000,
        tenant_delay_ms: 0,
        query_timeout_ms: 1_000,
        cycle_timeout_ms: 5_000,
        log_file: "logs/comparison-monitor.log".to_string(),
        log_format: LogFormat::Text,
        alert_threshold: 3,
        tenants: tenants.iter().map(|t| t.to_string()).collect(),
        unified_table: "facebook_pages_unified".to_string(),
        legacy_primary_table: "facebook_pages".to_string(),
        legacy_secondary_table: "company_facebook_pages".to_string(),
        legacy_precedence: LegacyPrecedence::Primary,
        run_once: false,
    }
}
