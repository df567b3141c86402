//! SQLite storage backend for LeanIndex.
//!
//! Persists block headers to a single SQLite file using `sqlx` in WAL mode.
//! Writes go through one writer guard; reads use the pool directly.
//!
//! # Usage
//! ```rust,no_run
//! use leanindex_storage::sqlite::SqliteStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStorage::open("./leanindex.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStorage::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnection, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use leanindex_core::store::{check_range, check_slot, MAX_STORED_SLOT};
use leanindex_core::{Header, HeaderStore, IndexerError, Transaction, WriteOp};

const SELECT_COLUMNS: &str = "SELECT slot, proposer_index, parent_root, state_root, body_root FROM block_headers";

/// SQLite-backed header storage.
pub struct SqliteStorage {
    pool: SqlitePool,
    writer: tokio::sync::Mutex<()>,
}

fn storage_err(e: sqlx::Error) -> IndexerError {
    IndexerError::Storage(e.to_string())
}

/// Query bound as an SQLite integer, saturating at `i64::MAX`.
fn sql_bound(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl SqliteStorage {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./leanindex.db"`) or a full
    /// SQLite URL (`"sqlite:./leanindex.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, IndexerError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url).await.map_err(storage_err)?;

        let storage = Self::from_pool(pool);
        storage.init_schema().await?;
        info!(path, "opened sqlite header store");
        Ok(storage)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Each connection to `:memory:` is its own database, so the pool is
    /// limited to one connection. All data is lost when the pool is dropped.
    pub async fn in_memory() -> Result<Self, IndexerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(storage_err)?;

        let storage = Self::from_pool(pool);
        storage.init_schema().await?;
        Ok(storage)
    }

    fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            writer: tokio::sync::Mutex::new(()),
        }
    }

    /// Create tables and enable WAL mode.
    async fn init_schema(&self) -> Result<(), IndexerError> {
        // WAL mode: readers proceed while the writer commits
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS block_headers (
                slot           INTEGER PRIMARY KEY,
                proposer_index INTEGER NOT NULL,
                parent_root    BLOB    NOT NULL,
                state_root     BLOB    NOT NULL,
                body_root      BLOB    NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        for stmt in [
            "CREATE INDEX IF NOT EXISTS idx_block_headers_proposer ON block_headers (proposer_index);",
            "CREATE INDEX IF NOT EXISTS idx_block_headers_parent ON block_headers (parent_root);",
            "CREATE INDEX IF NOT EXISTS idx_block_headers_state ON block_headers (state_root);",
            "CREATE INDEX IF NOT EXISTS idx_block_headers_body ON block_headers (body_root);",
        ] {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(storage_err)?;
        }

        Ok(())
    }

    /// Total number of stored headers.
    pub async fn header_count(&self) -> Result<u64, IndexerError> {
        let row = sqlx::query("SELECT COUNT(*) as cnt FROM block_headers")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;

        let cnt: i64 = row.try_get("cnt").map_err(storage_err)?;
        Ok(cnt as u64)
    }
}

// ─── Write operations ────────────────────────────────────────────────────────

async fn insert(conn: &mut SqliteConnection, h: &Header) -> Result<(), IndexerError> {
    check_slot(h.slot)?;
    sqlx::query(
        "INSERT OR REPLACE INTO block_headers
         (slot, proposer_index, parent_root, state_root, body_root)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(h.slot as i64)
    .bind(h.proposer_index as i64) // bit-cast, read back with `as u64`
    .bind(&h.parent_root)
    .bind(&h.state_root)
    .bind(&h.body_root)
    .execute(&mut *conn)
    .await
    .map_err(|e| IndexerError::Storage(format!("error inserting block header for slot {}: {e}", h.slot)))?;
    Ok(())
}

async fn apply(conn: &mut SqliteConnection, op: WriteOp) -> Result<(), IndexerError> {
    match op {
        WriteOp::Insert(h) => insert(conn, &h).await,
        WriteOp::InsertBatch(headers) => {
            for h in &headers {
                insert(conn, h).await?;
            }
            Ok(())
        }
        WriteOp::Update(h) => {
            if h.slot > MAX_STORED_SLOT {
                return Err(IndexerError::HeaderNotFound { slot: h.slot });
            }
            let result = sqlx::query(
                "UPDATE block_headers
                 SET proposer_index = ?, parent_root = ?, state_root = ?, body_root = ?
                 WHERE slot = ?",
            )
            .bind(h.proposer_index as i64)
            .bind(&h.parent_root)
            .bind(&h.state_root)
            .bind(&h.body_root)
            .bind(h.slot as i64)
            .execute(&mut *conn)
            .await
            .map_err(storage_err)?;

            if result.rows_affected() == 0 {
                return Err(IndexerError::HeaderNotFound { slot: h.slot });
            }
            Ok(())
        }
        WriteOp::Delete(slot) => {
            if slot > MAX_STORED_SLOT {
                return Err(IndexerError::HeaderNotFound { slot });
            }
            let result = sqlx::query("DELETE FROM block_headers WHERE slot = ?")
                .bind(slot as i64)
                .execute(&mut *conn)
                .await
                .map_err(storage_err)?;

            if result.rows_affected() == 0 {
                return Err(IndexerError::HeaderNotFound { slot });
            }
            Ok(())
        }
    }
}

fn row_to_header(row: &SqliteRow) -> Result<Header, IndexerError> {
    Ok(Header {
        slot: row.try_get::<i64, _>("slot").map_err(storage_err)? as u64,
        proposer_index: row.try_get::<i64, _>("proposer_index").map_err(storage_err)? as u64,
        parent_root: row.try_get("parent_root").map_err(storage_err)?,
        state_root: row.try_get("state_root").map_err(storage_err)?,
        body_root: row.try_get("body_root").map_err(storage_err)?,
    })
}

fn rows_to_headers(rows: &[SqliteRow]) -> Result<Vec<Header>, IndexerError> {
    rows.iter().map(row_to_header).collect()
}

// ─── HeaderStore impl ────────────────────────────────────────────────────────

#[async_trait]
impl HeaderStore for SqliteStorage {
    async fn run_transaction(&self, txn: Transaction) -> Result<(), IndexerError> {
        if txn.is_empty() {
            return Ok(());
        }
        let _writer = self.writer.lock().await;

        let ops = txn.len();
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        for op in txn.into_ops() {
            // Dropping `tx` on error rolls the whole transaction back.
            apply(&mut tx, op).await?;
        }
        tx.commit().await.map_err(storage_err)?;

        debug!(ops, "sqlite transaction committed");
        Ok(())
    }

    async fn get_by_slot(&self, slot: u64) -> Result<Option<Header>, IndexerError> {
        if slot > MAX_STORED_SLOT {
            return Ok(None);
        }
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE slot = ?"))
            .bind(slot as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        row.as_ref().map(row_to_header).transpose()
    }

    async fn get_by_root(&self, root: &[u8]) -> Result<Option<Header>, IndexerError> {
        let row = sqlx::query(&format!(
            "{SELECT_COLUMNS}
             WHERE parent_root = ? OR state_root = ? OR body_root = ?
             ORDER BY slot DESC
             LIMIT 1"
        ))
        .bind(root)
        .bind(root)
        .bind(root)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.as_ref().map(row_to_header).transpose()
    }

    async fn get_by_proposer(
        &self,
        proposer_index: u64,
        limit: usize,
    ) -> Result<Vec<Header>, IndexerError> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE proposer_index = ? ORDER BY slot DESC LIMIT ?"
        ))
        .bind(proposer_index as i64)
        .bind(sql_bound(limit as u64))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows_to_headers(&rows)
    }

    async fn get_latest(&self, limit: usize) -> Result<Vec<Header>, IndexerError> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY slot DESC LIMIT ?"))
            .bind(sql_bound(limit as u64))
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        rows_to_headers(&rows)
    }

    async fn get_in_range(&self, start: u64, end: u64) -> Result<Vec<Header>, IndexerError> {
        check_range(start, end)?;
        if start > MAX_STORED_SLOT {
            return Ok(vec![]);
        }
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE slot >= ? AND slot <= ? ORDER BY slot ASC"
        ))
        .bind(start as i64)
        .bind(sql_bound(end))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows_to_headers(&rows)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
