use std::collections::{HashMap, HashSet};

use super::models::{LegacyMerge, LegacyPrecedence, PageDiff, PageMismatch};
use crate::pages::PageRecord;

/// A page field that takes part in reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageField {
    PageId,
    PageName,
    CompanyId,
    IsActive,
    WebhookEnabled,
}

/// Fields used both to decide a match and to describe a mismatch
pub const SIGNIFICANT_FIELDS: [PageField; 5] = [
    PageField::PageId,
    PageField::PageName,
    PageField::CompanyId,
    PageField::IsActive,
    PageField::WebhookEnabled,
];

impl PageField {
    pub fn name(&self) -> &'static str {
        match self {
            PageField::PageId => "page_id",
            PageField::PageName => "page_name",
            PageField::CompanyId => "company_id",
            PageField::IsActive => "is_active",
            PageField::WebhookEnabled => "webhook_enabled",
        }
    }

    /// `None` when both sides agree, otherwise `field: unified vs legacy`
    fn describe(&self, unified: &PageRecord, legacy: &PageRecord) -> Option<String> {
        let (left, right) = match self {
            PageField::PageId => text_pair(&unified.page_id, &legacy.page_id)?,
            PageField::PageName => text_pair(&unified.page_name, &legacy.page_name)?,
            PageField::CompanyId => text_pair(&unified.company_id, &legacy.company_id)?,
            PageField::IsActive => flag_pair(unified.is_active, legacy.is_active)?,
            PageField::WebhookEnabled => {
                flag_pair(unified.webhook_enabled, legacy.webhook_enabled)?
            }
        };
        Some(format!("{}: {} vs {}", self.name(), left, right))
    }
}

fn text_pair(unified: &str, legacy: &str) -> Option<(String, String)> {
    (unified != legacy).then(|| (format!("{:?}", unified), format!("{:?}", legacy)))
}

fn flag_pair(unified: bool, legacy: bool) -> Option<(String, String)> {
    (unified != legacy).then(|| (unified.to_string(), legacy.to_string()))
}

/// Every significant field that differs between the two snapshots
pub fn find_differences(unified: &PageRecord, legacy: &PageRecord) -> Vec<String> {
    SIGNIFICANT_FIELDS
        .iter()
        .filter_map(|field| field.describe(unified, legacy))
        .collect()
}

/// Compare a unified set against a legacy set, keyed by page id.
///
/// Mismatches and extras follow unified order, missing pages follow legacy
/// order. When the legacy set repeats an id, the last occurrence is the one
/// compared.
pub fn diff(unified: &[PageRecord], legacy: &[PageRecord]) -> PageDiff {
    let unified_index: HashMap<&str, &PageRecord> =
        unified.iter().map(|page| (page.page_id.as_str(), page)).collect();
    let legacy_index: HashMap<&str, &PageRecord> =
        legacy.iter().map(|page| (page.page_id.as_str(), page)).collect();

    let mut result = PageDiff::default();

    for page in unified {
        match legacy_index.get(page.page_id.as_str()) {
            Some(legacy_page) => {
                let differences = find_differences(page, legacy_page);
                if differences.is_empty() {
                    result.matches += 1;
                } else {
                    result.mismatches.push(PageMismatch {
                        page_id: page.page_id.clone(),
                        unified: page.clone(),
                        legacy: (*legacy_page).clone(),
                        differences,
                    });
                }
            }
            None => result.extra_in_unified.push(page.clone()),
        }
    }

    result.missing_in_unified = legacy
        .iter()
        .filter(|page| !unified_index.contains_key(page.page_id.as_str()))
        .cloned()
        .collect();

    result
}

/// Fold the two legacy tables into one logical legacy set.
pub fn merge_legacy(
    primary: Vec<PageRecord>,
    secondary: Vec<PageRecord>,
    precedence: LegacyPrecedence,
) -> LegacyMerge {
    let primary_ids: HashSet<String> = primary.iter().map(|p| p.page_id.clone()).collect();
    let duplicates: Vec<String> = secondary
        .iter()
        .filter(|page| primary_ids.contains(&page.page_id))
        .map(|page| page.page_id.clone())
        .collect();

    let pages = match precedence {
        LegacyPrecedence::Concat => primary.into_iter().chain(secondary).collect(),
        LegacyPrecedence::Primary => primary
            .into_iter()
            .chain(
                secondary
                    .into_iter()
                    .filter(|page| !primary_ids.contains(&page.page_id)),
            )
            .collect(),
        LegacyPrecedence::Secondary => {
            let secondary_ids: HashSet<&str> =
                secondary.iter().map(|p| p.page_id.as_str()).collect();
            let mut pages: Vec<PageRecord> = primary
                .into_iter()
                .filter(|page| !secondary_ids.contains(page.page_id.as_str()))
                .collect();
            pages.extend(secondary.iter().cloned());
            pages
        }
    };

    LegacyMerge { pages, duplicates }
}
