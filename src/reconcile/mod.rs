// Pure reconciliation of unified pages against legacy pages
pub mod diff;
pub mod models;

pub use diff::{diff, merge_legacy};
pub use models::{ComparisonResult, LegacyPrecedence};
