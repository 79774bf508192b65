use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{mysql::MySqlRow, FromRow};

/// Snapshot of one page row, read from either the unified or a legacy table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    pub page_id: String,
    pub page_name: String,
    /// Owning tenant
    pub company_id: String,
    pub is_active: bool,
    pub webhook_enabled: bool,
    /// Never compared and never written to the log
    #[serde(skip_serializing, default)]
    pub access_token: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[cfg(test)]
impl PageRecord {
    pub fn new(page_id: &str, page_name: &str, company_id: &str) -> Self {
        Self {
            page_id: page_id.to_string(),
            page_name: page_name.to_string(),
            company_id: company_id.to_string(),
            is_active: true,
            webhook_enabled: false,
            access_token: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    pub fn with_webhook(mut self, webhook_enabled: bool) -> Self {
        self.webhook_enabled = webhook_enabled;
        self
    }
}

/// Raw row as selected. Ids are cast to CHAR so integer and varchar schemas
/// decode the same way. Legacy tables allow NULL in the flag and name columns.
#[derive(Debug, FromRow)]
struct PageRow {
    page_id: String,
    page_name: Option<String>,
    // every query filters on company_id, so it is never NULL here
    company_id: String,
    is_active: Option<bool>,
    webhook_enabled: Option<bool>,
    access_token: Option<String>,
    created_at: Option<NaiveDateTime>,
    updated_at: Option<NaiveDateTime>,
}

impl From<PageRow> for PageRecord {
    fn from(row: PageRow) -> Self {
        Self {
            page_id: row.page_id,
            page_name: row.page_name.unwrap_or_default(),
            company_id: row.company_id,
            is_active: row.is_active.unwrap_or(false),
            webhook_enabled: row.webhook_enabled.unwrap_or(false),
            access_token: row.access_token,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl<'r> FromRow<'r, MySqlRow> for PageRecord {
    fn from_row(row: &'r MySqlRow) -> Result<Self, sqlx::Error> {
        PageRow::from_row(row).map(Into::into)
    }
}
