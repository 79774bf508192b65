use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pages::PageRecord;

/// Which legacy table wins when both hold the same page id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegacyPrecedence {
    Primary,
    Secondary,
    /// Plain concatenation, duplicates are kept
    Concat,
}

/// Output of merging the two legacy tables into one logical set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyMerge {
    pub pages: Vec<PageRecord>,
    /// Page ids present in both legacy tables
    pub duplicates: Vec<String>,
}

/// A unified page whose significant fields disagree with its legacy counterpart
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageMismatch {
    pub page_id: String,
    pub unified: PageRecord,
    pub legacy: PageRecord,
    pub differences: Vec<String>,
}

/// Pure comparison of a unified set against a legacy set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageDiff {
    pub matches: usize,
    pub mismatches: Vec<PageMismatch>,
    pub missing_in_unified: Vec<PageRecord>,
    pub extra_in_unified: Vec<PageRecord>,
}

impl PageDiff {
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
            && self.missing_in_unified.is_empty()
            && self.extra_in_unified.is_empty()
    }
}

/// Reconciliation outcome for one tenant in one cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonResult {
    pub cycle_id: Uuid,
    pub tenant_id: String,
    pub timestamp: DateTime<Utc>,
    pub unified_count: usize,
    pub legacy_count: usize,
    pub legacy_duplicates: usize,
    pub matches: usize,
    pub mismatches: Vec<PageMismatch>,
    pub missing_in_unified: Vec<PageRecord>,
    pub extra_in_unified: Vec<PageRecord>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComparisonResult {
    pub fn from_diff(
        cycle_id: Uuid,
        tenant_id: &str,
        unified_count: usize,
        legacy: &LegacyMerge,
        diff: PageDiff,
    ) -> Self {
        let success = diff.is_clean();
        Self {
            cycle_id,
            tenant_id: tenant_id.to_string(),
            timestamp: Utc::now(),
            unified_count,
            legacy_count: legacy.pages.len(),
            legacy_duplicates: legacy.duplicates.len(),
            matches: diff.matches,
            mismatches: diff.mismatches,
            missing_in_unified: diff.missing_in_unified,
            extra_in_unified: diff.extra_in_unified,
            success,
            error: None,
        }
    }

    /// Result for a tenant whose comparison could not be carried out
    pub fn failed(cycle_id: Uuid, tenant_id: &str, error: String) -> Self {
        Self {
            cycle_id,
            tenant_id: tenant_id.to_string(),
            timestamp: Utc::now(),
            unified_count: 0,
            legacy_count: 0,
            legacy_duplicates: 0,
            matches: 0,
            mismatches: Vec::new(),
            missing_in_unified: Vec::new(),
            extra_in_unified: Vec::new(),
            success: false,
            error: Some(error),
        }
    }

    /// Number of divergent pages of any kind
    pub fn divergence_count(&self) -> usize {
        self.mismatches.len() + self.missing_in_unified.len() + self.extra_in_unified.len()
    }
}
