// Page snapshots and the tables they are read from
pub mod models;
pub mod repository;

#[cfg(test)]
pub mod memory;

pub use models::PageRecord;
pub use repository::{MySqlPageRepository, PageSource, PageTable};
