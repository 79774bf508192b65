use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::LogFormat;
use crate::error::MonitorResult;
use crate::reconcile::ComparisonResult;

const RULE: &str = "================================================================================";

/// Append-only reconciliation log, echoed to the console
#[derive(Debug, Clone)]
pub struct ReconciliationLog {
    path: PathBuf,
    format: LogFormat,
}

impl ReconciliationLog {
    pub fn new(path: impl Into<PathBuf>, format: LogFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the directory holding the log file
    pub async fn ensure_directory(&self) -> MonitorResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    /// Write one comparison result to the file and the console.
    pub async fn record(&self, result: &ComparisonResult) -> MonitorResult<()> {
        let text = render_text(result);

        if result.success {
            info!("\n{}", text);
        } else {
            warn!("\n{}", text);
            match &result.error {
                Some(err) => error!(
                    "❌❌ COMPARISON FAILED for tenant {}: {}",
                    result.tenant_id, err
                ),
                None => warn!(
                    "⚠️⚠️ DIVERGENCE DETECTED for tenant {}: {} mismatched, {} missing in unified, {} extra in unified",
                    result.tenant_id,
                    result.mismatches.len(),
                    result.missing_in_unified.len(),
                    result.extra_in_unified.len()
                ),
            }
        }

        let entry = match self.format {
            LogFormat::Text => text,
            LogFormat::Json => serde_json::to_string(result)?,
        };
        self.append(&entry).await
    }

    /// Write the escalation notice once consecutive failures reach the threshold.
    pub async fn record_alert(
        &self,
        cycle_id: Uuid,
        consecutive_failures: u32,
        threshold: u32,
    ) -> MonitorResult<()> {
        let timestamp = Utc::now();
        error!(
            "🚨 ALERT: {} consecutive failing cycles (threshold {}) - reconciliation needs immediate attention",
            consecutive_failures, threshold
        );

        let entry = match self.format {
            LogFormat::Text => render_alert_text(timestamp, consecutive_failures, threshold),
            LogFormat::Json => json!({
                "type": "alert",
                "cycle_id": cycle_id,
                "timestamp": timestamp,
                "consecutive_failures": consecutive_failures,
                "threshold": threshold,
            })
            .to_string(),
        };
        self.append(&entry).await
    }

    async fn append(&self, entry: &str) -> MonitorResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(entry.as_bytes()).await?;
        if !entry.ends_with('\n') {
            file.write_all(b"\n").await?;
        }
        file.flush().await?;
        Ok(())
    }
}

fn render_alert_text(timestamp: DateTime<Utc>, consecutive_failures: u32, threshold: u32) -> String {
    format!(
        "{rule}\n🚨 ALERT [{}] {} consecutive failing cycles (threshold {}), needs immediate attention\n{rule}\n",
        timestamp.to_rfc3339(),
        consecutive_failures,
        threshold,
        rule = RULE
    )
}

/// Human-readable block for one result
pub fn render_text(result: &ComparisonResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(
        out,
        "📊 Tenant {} @ {} (cycle {})",
        result.tenant_id,
        result.timestamp.to_rfc3339(),
        result.cycle_id
    );

    if let Some(err) = &result.error {
        let _ = writeln!(out, "❌ Status: FAILED - {}", err);
        return out;
    }

    let _ = writeln!(
        out,
        "   Unified: {} | Legacy: {} | Matches: {}",
        result.unified_count, result.legacy_count, result.matches
    );
    if result.legacy_duplicates > 0 {
        let _ = writeln!(
            out,
            "   Legacy ids present in both legacy tables: {}",
            result.legacy_duplicates
        );
    }

    if result.success {
        let _ = writeln!(out, "✅ Status: IN SYNC");
        return out;
    }

    let _ = writeln!(out, "❌ Status: DIVERGED ({} pages)", result.divergence_count());

    if !result.mismatches.is_empty() {
        let _ = writeln!(out, "   Mismatches ({}):", result.mismatches.len());
        for mismatch in &result.mismatches {
            let _ = writeln!(out, "     - {}", mismatch.page_id);
            for difference in &mismatch.differences {
                let _ = writeln!(out, "         {}", difference);
            }
        }
    }

    if !result.missing_in_unified.is_empty() {
        let _ = writeln!(
            out,
            "   Missing in unified ({}):",
            result.missing_in_unified.len()
        );
        for page in &result.missing_in_unified {
            let _ = writeln!(out, "     - {} {:?}", page.page_id, page.page_name);
        }
    }

    if !result.extra_in_unified.is_empty() {
        let _ = writeln!(
            out,
            "   Extra in unified ({}):",
            result.extra_in_unified.len()
        );
        for page in &result.extra_in_unified {
            let _ = writeln!(out, "     - {} {:?}", page.page_id, page.page_name);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::PageRecord;
    use crate::reconcile::{diff, merge_legacy, LegacyPrecedence};

    fn result_for(unified: Vec<PageRecord>, legacy: Vec<PageRecord>) -> ComparisonResult {
        let merged = merge_legacy(legacy, Vec::new(), LegacyPrecedence::Primary);
        let page_diff = diff(&unified, &merged.pages);
        ComparisonResult::from_diff(Uuid::new_v4(), "1", unified.len(), &merged, page_diff)
    }

    #[test]
    fn test_render_in_sync() {
        let page = PageRecord::new("p1", "Shop A", "1");
        let text = render_text(&result_for(vec![page.clone()], vec![page]));

        assert!(text.contains("📊 Tenant 1"));
        assert!(text.contains("Unified: 1 | Legacy: 1 | Matches: 1"));
        assert!(text.contains("✅ Status: IN SYNC"));
    }

    #[test]
    fn test_render_enumerates_divergence() {
        let text = render_text(&result_for(
            vec![
                PageRecord::new("p1", "Shop A", "1"),
                PageRecord::new("u1", "Extra", "1"),
            ],
            vec![
                PageRecord::new("p1", "Shop B", "1"),
                PageRecord::new("l1", "Missing", "1"),
            ],
        ));

        assert!(text.contains("❌ Status: DIVERGED (3 pages)"));
        assert!(text.contains("page_name: \"Shop A\" vs \"Shop B\""));
        assert!(text.contains("Missing in unified (1):"));
        assert!(text.contains("- l1 \"Missing\""));
        assert!(text.contains("Extra in unified (1):"));
        assert!(text.contains("- u1 \"Extra\""));
    }

    #[test]
    fn test_render_failure() {
        let result = ComparisonResult::failed(Uuid::new_v4(), "7", "pool timed out".to_string());
        let text = render_text(&result);
        assert!(text.contains("❌ Status: FAILED - pool timed out"));
    }

    #[tokio::test]
    async fn test_record_appends_entries() {
        let dir = tempfile::tempdir().unwrap();
        let log = ReconciliationLog::new(dir.path().join("nested/monitor.log"), LogFormat::Text);
        log.ensure_directory().await.unwrap();

        let page = PageRecord::new("p1", "Shop A", "1");
        let result = result_for(vec![page.clone()], vec![page]);
        log.record(&result).await.unwrap();
        log.record(&result).await.unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(contents.matches("✅ Status: IN SYNC").count(), 2);
    }

    #[tokio::test]
    async fn test_json_lines_format() {
        let dir = tempfile::tempdir().unwrap();
        let log = ReconciliationLog::new(dir.path().join("monitor.jsonl"), LogFormat::Json);

        let mut legacy = PageRecord::new("p1", "Shop B", "1");
        legacy.access_token = Some("secret-token".to_string());
        let result = result_for(vec![PageRecord::new("p1", "Shop A", "1")], vec![legacy]);
        log.record(&result).await.unwrap();
        log.record_alert(result.cycle_id, 3, 3).await.unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(!contents.contains("secret-token"));

        let entry: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(entry["tenant_id"], "1");
        assert_eq!(entry["success"], false);
        assert_eq!(entry["mismatches"][0]["differences"][0], "page_name: \"Shop A\" vs \"Shop B\"");

        let alert: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(alert["type"], "alert");
        assert_eq!(alert["consecutive_failures"], 3);
    }
}
