pub mod watcher_db;

pub use watcher_db::WatcherDb;

use crate::discovery::snapshot::WatcherRecord;
use async_trait::async_trait;

/// Persists the last successfully observed snapshot per project.
///
/// Exactly one live record per project name: `upsert` overwrites, and
/// `find_latest` returns what the previous successful cycle stored.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn upsert(&self, record: &WatcherRecord) -> anyhow::Result<()>;
    async fn find_latest(&self, project: &str) -> anyhow::Result<Option<WatcherRecord>>;
}
