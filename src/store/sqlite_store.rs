use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode};
use sqlx::{Connection, FromRow};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{ChangeFeed, DocumentStore, StoreChange, StoreError, StoredDocument, Subscription};

#[derive(Debug, Clone, FromRow)]
struct DocumentRow {
    doc_value: String,
    revision: i64,
}

/// Documents persisted in a single SQLite table.
///
/// Change notifications are delivered to subscribers in this process only;
/// writes made by other processes show up on the next explicit read.
pub struct SqliteStore {
    options: SqliteConnectOptions,
    write_lock: Mutex<()>,
    changes: ChangeFeed,
}

impl SqliteStore {
    pub fn new(path: &Path) -> Self {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        Self {
            options,
            write_lock: Mutex::new(()),
            changes: ChangeFeed::default(),
        }
    }

    async fn get_new_connection(&self, key: &str) -> Result<SqliteConnection, StoreError> {
        debug!(key, "Getting new database connection");
        SqliteConnection::connect_with(&self.options)
            .await
            .map_err(|e| StoreError::backend(key, crate::fmt!("could not connect to database: {e}")))
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn init(&self) -> Result<(), StoreError> {
        let mut conn = self.get_new_connection("*").await?;
        sqlx::query(
            r#"
                CREATE TABLE IF NOT EXISTS documents (
                    doc_key TEXT PRIMARY KEY NOT NULL,
                    doc_value TEXT NOT NULL,
                    revision INTEGER NOT NULL
                )
            "#,
        )
        .execute(&mut conn)
        .await
        .map_err(|e| StoreError::backend("*", e))?;

        info!(path = %self.options.get_filename().display(), "SQLite document store initialised");
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn get(&self, key: &str) -> Result<Option<StoredDocument>, StoreError> {
        let mut conn = self.get_new_connection(key).await?;
        let row: Option<DocumentRow> = sqlx::query_as(
            r#"
                SELECT doc_value, revision
                FROM documents
                WHERE doc_key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&mut conn)
        .await
        .map_err(|e| StoreError::backend(key, e))?;

        Ok(row.map(|row| StoredDocument {
            revision: row.revision as u64,
            value: row.doc_value,
        }))
    }

    #[tracing::instrument(level = "debug", skip(self, value), fields(len = value.len()))]
    async fn set(&self, key: &str, value: &str) -> Result<u64, StoreError> {
        let _write = self.write_lock.lock().await;
        let mut conn = self.get_new_connection(key).await?;

        let revision: i64 = sqlx::query_scalar(
            r#"
                INSERT INTO documents (doc_key, doc_value, revision)
                VALUES (?, ?, 1)
                ON CONFLICT(doc_key) DO UPDATE
                SET doc_value = excluded.doc_value,
                    revision = documents.revision + 1
                RETURNING revision
            "#,
        )
        .bind(key)
        .bind(value)
        .fetch_one(&mut conn)
        .await
        .map_err(|e| StoreError::backend(key, e))?;

        let revision = revision as u64;
        self.changes.publish(StoreChange {
            key: key.to_string(),
            revision,
            value: value.to_string(),
        });
        Ok(revision)
    }

    fn subscribe(&self, key: &str) -> Subscription {
        self.changes.subscribe(key)
    }
}
