use std::{str::FromStr, sync::Arc, time::Duration};

use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use tracing::info;

use crate::{
    config::MonitorConfig,
    error::MonitorResult,
    monitor::{journal::ReconciliationLog, ReconciliationMonitor},
    pages::MySqlPageRepository,
};

/// Open the database, prepare the log directory and build the monitor.
/// Any error here is fatal: the caller must not start polling.
pub async fn initialize(config: MonitorConfig) -> MonitorResult<ReconciliationMonitor> {
    info!("Initializing reconciliation monitor ...");

    config.validate()?;

    let pool = initialize_database(&config).await?;

    let repository = Arc::new(MySqlPageRepository::new(
        pool,
        config.unified_table.clone(),
        config.legacy_primary_table.clone(),
        config.legacy_secondary_table.clone(),
    ));
    info!(
        "✅ Page repository ready: unified={} legacy={},{} (precedence {:?})",
        config.unified_table,
        config.legacy_primary_table,
        config.legacy_secondary_table,
        config.legacy_precedence
    );

    let journal = ReconciliationLog::new(&config.log_file, config.log_format);
    journal.ensure_directory().await?;
    info!(
        "✅ Reconciliation log: {} ({:?})",
        journal.path().display(),
        config.log_format
    );

    info!("📋 Monitoring tenants: {}", config.tenants.join(", "));

    Ok(ReconciliationMonitor::new(config, repository, journal))
}

fn connect_options(config: &MonitorConfig) -> MonitorResult<MySqlConnectOptions> {
    let options = match &config.database_url {
        Some(url) => MySqlConnectOptions::from_str(url)?,
        None => MySqlConnectOptions::new()
            .host(&config.db_host)
            .port(config.db_port)
            .username(&config.db_user)
            .password(&config.db_password)
            .database(&config.db_name),
    };

    Ok(options
        .charset(&config.db_charset)
        .timezone(Some(config.db_timezone.clone())))
}

async fn initialize_database(config: &MonitorConfig) -> MonitorResult<MySqlPool> {
    info!("📊 Connecting to database...");

    let pool = MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.query_timeout())
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect_with(connect_options(config)?)
        .await?;

    info!(
        "✓ Database pool configured: {} max connections",
        config.max_connections
    );
    Ok(pool)
}
