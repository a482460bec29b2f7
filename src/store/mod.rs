//! Entity storage behind a trait so the consistency engine never depends on
//! a particular database.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::log_entry::{LogEntry, TimeRange};
use crate::models::log_type::LogType;
use crate::models::tracker::Tracker;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn insert_log_type(&self, log_type: &LogType) -> StoreResult<()>;

    async fn get_log_type(&self, id: Uuid) -> StoreResult<Option<LogType>>;

    async fn list_log_types_by_owner(&self, owner: &str) -> StoreResult<Vec<LogType>>;

    async fn update_log_type(&self, log_type: &LogType) -> StoreResult<()>;

    /// Delete a log type and every entry recorded against it. Returns the
    /// number of entries removed.
    async fn delete_log_type(&self, id: Uuid) -> StoreResult<u64>;

    async fn insert_entry(&self, entry: &LogEntry) -> StoreResult<()>;

    async fn get_entry(&self, id: Uuid) -> StoreResult<Option<LogEntry>>;

    async fn update_entry(&self, entry: &LogEntry) -> StoreResult<()>;

    async fn delete_entry(&self, id: Uuid) -> StoreResult<bool>;

    /// All entries of an owner, newest first.
    async fn list_entries_by_owner(&self, owner: &str) -> StoreResult<Vec<LogEntry>>;

    /// Entries of one type inside `range`, oldest first.
    async fn list_entries_by_owner_and_type(
        &self,
        owner: &str,
        type_id: Uuid,
        range: TimeRange,
    ) -> StoreResult<Vec<LogEntry>>;

    /// Earliest entry of a type inside `range`.
    async fn find_entry_in_range(
        &self,
        owner: &str,
        type_id: Uuid,
        range: TimeRange,
    ) -> StoreResult<Option<LogEntry>>;

    async fn insert_tracker(&self, tracker: &Tracker) -> StoreResult<()>;

    async fn get_tracker(&self, id: Uuid) -> StoreResult<Option<Tracker>>;

    async fn list_trackers_by_owner(&self, owner: &str) -> StoreResult<Vec<Tracker>>;

    async fn update_tracker(&self, tracker: &Tracker) -> StoreResult<()>;

    async fn delete_tracker(&self, id: Uuid) -> StoreResult<bool>;

    /// Liveness check used by the readiness endpoint.
    async fn ping(&self) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_store_is_object_safe() {
        fn _takes_boxed(_: Box<dyn EntityStore>) {}
    }
}
