use crate::discovery::snapshot::{Snapshot, WatcherRecord};
use crate::storage::RecordStore;
use alloy::primitives::B256;
use anyhow::Context;
use async_trait::async_trait;
use rusqlite::ffi::ErrorCode;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_DB_PATH: &str = "watcher.db";

/// Sqlite-backed [`RecordStore`].
///
/// The handle only holds the path; every operation opens its own connection
/// with a busy timeout and retries briefly on lock contention. Write volume is
/// one row per project per hour, so there is no need for a pooled connection.
#[derive(Debug, Clone)]
pub struct WatcherDb {
    path: PathBuf,
}

impl WatcherDb {
    pub fn open_default() -> anyhow::Result<Self> {
        Self::open(DEFAULT_DB_PATH)
    }

    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let db = Self {
            path: path.as_ref().to_path_buf(),
        };
        db.ensure_schema()?;
        Ok(db)
    }

    fn ensure_schema(&self) -> anyhow::Result<()> {
        self.with_connection("ensure_schema", |conn| {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS watcher_records (
                    project_name TEXT PRIMARY KEY NOT NULL,
                    timestamp INTEGER NOT NULL,
                    block_number INTEGER NOT NULL,
                    snapshot_json TEXT NOT NULL,
                    config_hash TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_watcher_records_timestamp
                    ON watcher_records(timestamp);
                "#,
            )?;
            // WAL lets the hourly writer coexist with ad-hoc operator reads.
            let _ = conn.execute_batch(
                r#"
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                "#,
            );
            Ok(())
        })
    }

    fn with_connection<T, F>(&self, context: &str, op: F) -> anyhow::Result<T>
    where
        F: Fn(&Connection) -> rusqlite::Result<T>,
    {
        const MAX_ATTEMPTS: u32 = 5;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let conn = Connection::open(&self.path).with_context(|| {
                format!("cannot open sqlite database {}", self.path.display())
            })?;
            conn.busy_timeout(Duration::from_millis(5_000))
                .context("cannot set sqlite busy timeout")?;

            match op(&conn) {
                Ok(value) => return Ok(value),
                Err(err) if is_sqlite_locked_error(&err) && attempt < MAX_ATTEMPTS => {
                    tracing::debug!(context, attempt, "[DB] sqlite locked, retrying");
                }
                Err(err) => {
                    return Err(anyhow::Error::new(err)).with_context(|| {
                        format!(
                            "{context} on {} (attempt {attempt})",
                            self.path.display()
                        )
                    });
                }
            }
        }
    }

    fn upsert_sync(&self, record: &WatcherRecord) -> anyhow::Result<()> {
        let snapshot_json = serde_json::to_string(&record.snapshot)
            .context("failed to serialize snapshot for persistence")?;
        let config_hash = format!("{:#x}", record.config_hash);

        self.with_connection("upsert_watcher_record", |conn| {
            conn.execute(
                r#"
                INSERT INTO watcher_records
                    (project_name, timestamp, block_number, snapshot_json, config_hash)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(project_name) DO UPDATE SET
                    timestamp = excluded.timestamp,
                    block_number = excluded.block_number,
                    snapshot_json = excluded.snapshot_json,
                    config_hash = excluded.config_hash
                "#,
                params![
                    record.project_name,
                    record.timestamp as i64,
                    record.block_number as i64,
                    snapshot_json,
                    config_hash,
                ],
            )
            .map(|_| ())
        })
    }

    fn find_latest_sync(&self, project: &str) -> anyhow::Result<Option<WatcherRecord>> {
        self.with_connection("find_latest_watcher_record", |conn| {
            conn.query_row(
                r#"
                SELECT project_name, timestamp, block_number, snapshot_json, config_hash
                FROM watcher_records
                WHERE project_name = ?1
                "#,
                params![project],
                |row| {
                    let project_name: String = row.get(0)?;
                    let timestamp: i64 = row.get(1)?;
                    let block_number: i64 = row.get(2)?;
                    let snapshot_json: String = row.get(3)?;
                    let config_hash: String = row.get(4)?;

                    let snapshot: Snapshot = serde_json::from_str(&snapshot_json)
                        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(e.into()))?;
                    let config_hash = B256::from_str(&config_hash)
                        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(e.into()))?;

                    Ok(WatcherRecord {
                        project_name,
                        timestamp: timestamp as u64,
                        block_number: block_number as u64,
                        snapshot,
                        config_hash,
                    })
                },
            )
            .optional()
        })
    }
}

fn is_sqlite_locked_error(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

#[async_trait]
impl RecordStore for WatcherDb {
    async fn upsert(&self, record: &WatcherRecord) -> anyhow::Result<()> {
        self.upsert_sync(record)
    }

    async fn find_latest(&self, project: &str) -> anyhow::Result<Option<WatcherRecord>> {
        self.find_latest_sync(project)
    }
}
