//! SQLite storage backend.
//!
//! Persists the checkpoint document, intent requests, and gift payloads to
//! a single SQLite file. Uses `sqlx` with WAL mode for concurrent read
//! performance.
//!
//! # Usage
//! ```rust,no_run
//! use giftscan_storage::sqlite::SqliteStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStorage::open("./giftscan.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStorage::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use giftscan_core::{
    Checkpoint, CheckpointStore, Gift, GiftRecord, IntentRequest, IntentStatus, IntentStore,
    ScanError,
};

/// SQLite-backed storage for the checkpoint, intents, and gifts.
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./giftscan.db"`) or a full
    /// SQLite URL (`"sqlite:./giftscan.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, ScanError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url)
            .await
            .map_err(|e| ScanError::Storage(e.to_string()))?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Open an in-memory SQLite database.
    ///
    /// All data is lost when the pool is dropped. Ideal for tests.
    pub async fn in_memory() -> Result<Self, ScanError> {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .map_err(|e| ScanError::Storage(e.to_string()))?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Create tables and enable WAL mode.
    async fn init_schema(&self) -> Result<(), ScanError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(|e| ScanError::Storage(e.to_string()))?;

        // Singleton checkpoint document, stored as JSON.
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS scanner_checkpoint (
                id  INTEGER PRIMARY KEY CHECK (id = 1),
                doc TEXT    NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ScanError::Storage(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS intent_requests (
                intent_id    INTEGER PRIMARY KEY,
                category_id  TEXT    NOT NULL,
                nft_id       TEXT    NOT NULL,
                phone        TEXT    NOT NULL,
                status       TEXT    NOT NULL,
                requested_at TEXT    NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ScanError::Storage(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS gifts (
                nft_id      TEXT NOT NULL,
                category_id TEXT NOT NULL,
                payload     TEXT NOT NULL,
                PRIMARY KEY (nft_id, category_id)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ScanError::Storage(e.to_string()))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_intents_status ON intent_requests (status);",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ScanError::Storage(e.to_string()))?;

        Ok(())
    }

    // ─── Intent and gift seeding ────────────────────────────────────────────────

    /// Insert (or replace) an intent request.
    pub async fn insert_intent(&self, intent: &IntentRequest) -> Result<(), ScanError> {
        sqlx::query(
            "INSERT OR REPLACE INTO intent_requests
             (intent_id, category_id, nft_id, phone, status, requested_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(intent.intent_id as i64)
        .bind(&intent.category_id)
        .bind(&intent.nft_id)
        .bind(&intent.phone)
        .bind(intent.status.to_string())
        .bind(intent.requested_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| ScanError::Storage(e.to_string()))?;

        Ok(())
    }

    /// Insert (or replace) a gift payload.
    pub async fn insert_gift(&self, record: &GiftRecord) -> Result<(), ScanError> {
        let payload = serde_json::to_string(&record.gifts)
            .map_err(|e| ScanError::Storage(e.to_string()))?;

        sqlx::query(
            "INSERT OR REPLACE INTO gifts (nft_id, category_id, payload) VALUES (?, ?, ?)",
        )
        .bind(&record.nft_id)
        .bind(&record.category_id)
        .bind(&payload)
        .execute(&self.pool)
        .await
        .map_err(|e| ScanError::Storage(e.to_string()))?;

        Ok(())
    }

    /// Current status of an intent, if known.
    pub async fn intent_status(&self, intent_id: u64) -> Result<Option<IntentStatus>, ScanError> {
        let row = sqlx::query("SELECT status FROM intent_requests WHERE intent_id = ?")
            .bind(intent_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ScanError::Storage(e.to_string()))?;

        row.map(|r| parse_status(&r.get::<String, _>("status"))).transpose()
    }
}

fn parse_status(status: &str) -> Result<IntentStatus, ScanError> {
    match status {
        "pending" => Ok(IntentStatus::Pending),
        "completed" => Ok(IntentStatus::Completed),
        other => Err(ScanError::Storage(format!("unknown intent status {other:?}"))),
    }
}

fn parse_requested_at(raw: &str) -> Result<DateTime<Utc>, ScanError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|when| when.with_timezone(&Utc))
        .map_err(|e| ScanError::Storage(format!("bad requested_at {raw:?}: {e}")))
}

fn row_to_intent(row: &sqlx::sqlite::SqliteRow) -> Result<IntentRequest, ScanError> {
    Ok(IntentRequest {
        intent_id: row.get::<i64, _>("intent_id") as u64,
        category_id: row.get("category_id"),
        nft_id: row.get("nft_id"),
        phone: row.get("phone"),
        status: parse_status(&row.get::<String, _>("status"))?,
        requested_at: parse_requested_at(&row.get::<String, _>("requested_at"))?,
    })
}

// ─── CheckpointStore impl ────────────────────────────────────────────────────

#[async_trait]
impl CheckpointStore for SqliteStorage {
    async fn load(&self) -> Result<Option<Checkpoint>, ScanError> {
        let row = sqlx::query("SELECT doc FROM scanner_checkpoint WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ScanError::Storage(e.to_string()))?;

        row.map(|r| {
            serde_json::from_str(&r.get::<String, _>("doc"))
                .map_err(|e| ScanError::Storage(format!("corrupt checkpoint document: {e}")))
        })
        .transpose()
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), ScanError> {
        let doc = serde_json::to_string(checkpoint)
            .map_err(|e| ScanError::Storage(e.to_string()))?;

        sqlx::query("INSERT OR REPLACE INTO scanner_checkpoint (id, doc) VALUES (1, ?)")
            .bind(&doc)
            .execute(&self.pool)
            .await
            .map_err(|e| ScanError::Storage(e.to_string()))?;

        debug!(
            last_scanned_block = checkpoint.last_scanned_block,
            "checkpoint persisted"
        );
        Ok(())
    }
}

// ─── IntentStore impl ────────────────────────────────────────────────────────

#[async_trait]
impl IntentStore for SqliteStorage {
    async fn is_completed(&self, intent_id: u64) -> Result<bool, ScanError> {
        Ok(self.intent_status(intent_id).await? == Some(IntentStatus::Completed))
    }

    async fn find_pending(
        &self,
        intent_id: u64,
        nft_id: &str,
        category_id: &str,
    ) -> Result<Option<IntentRequest>, ScanError> {
        let row = sqlx::query(
            "SELECT intent_id, category_id, nft_id, phone, status, requested_at
             FROM intent_requests
             WHERE intent_id = ? AND nft_id = ? AND category_id = ? AND status = 'pending'",
        )
        .bind(intent_id as i64)
        .bind(nft_id)
        .bind(category_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ScanError::Storage(e.to_string()))?;

        row.map(|r| row_to_intent(&r)).transpose()
    }

    async fn mark_completed(&self, intent_id: u64) -> Result<bool, ScanError> {
        // Filtered update: a concurrent rescan loses the race harmlessly.
        let result = sqlx::query(
            "UPDATE intent_requests SET status = 'completed'
             WHERE intent_id = ? AND status = 'pending'",
        )
        .bind(intent_id as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| ScanError::Storage(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_gift(
        &self,
        nft_id: &str,
        category_id: &str,
    ) -> Result<Option<GiftRecord>, ScanError> {
        let row = sqlx::query(
            "SELECT payload FROM gifts WHERE nft_id = ? AND category_id = ?",
        )
        .bind(nft_id)
        .bind(category_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ScanError::Storage(e.to_string()))?;

        row.map(|r| {
            let gifts: Vec<Gift> = serde_json::from_str(&r.get::<String, _>("payload"))
                .map_err(|e| ScanError::Storage(format!("corrupt gift payload: {e}")))?;
            Ok(GiftRecord {
                nft_id: nft_id.to_string(),
                category_id: category_id.to_string(),
                gifts,
            })
        })
        .transpose()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(intent_id: u64, status: IntentStatus) -> IntentRequest {
        IntentRequest {
            intent_id,
            category_id: "2".into(),
            nft_id: "42".into(),
            phone: "+15550100".into(),
            status,
            requested_at: Utc::now(),
        }
    }

    // ── CheckpointStore ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn checkpoint_missing_returns_none() {
        let store = SqliteStorage::in_memory().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn checkpoint_roundtrip_and_upsert() {
        let store = SqliteStorage::in_memory().await.unwrap();

        let mut checkpoint = Checkpoint::default();
        checkpoint.last_scanned_block = 100;
        store.save(&checkpoint).await.unwrap();

        checkpoint.last_scanned_block = 200;
        store.save(&checkpoint).await.unwrap();

        // A single row; the second save overwrites the first.
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.last_scanned_block, 200);
    }

    // ── IntentStore ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn find_pending_matches_the_full_identity() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store.insert_intent(&intent(7, IntentStatus::Pending)).await.unwrap();

        let found = store.find_pending(7, "42", "2").await.unwrap().unwrap();
        assert_eq!(found.intent_id, 7);
        assert_eq!(found.status, IntentStatus::Pending);

        assert!(store.find_pending(7, "41", "2").await.unwrap().is_none());
        assert!(store.find_pending(7, "42", "3").await.unwrap().is_none());
        assert!(store.find_pending(8, "42", "2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mark_completed_is_a_filtered_transition() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store.insert_intent(&intent(7, IntentStatus::Pending)).await.unwrap();

        assert!(store.mark_completed(7).await.unwrap());
        assert!(store.is_completed(7).await.unwrap());
        assert_eq!(
            store.intent_status(7).await.unwrap(),
            Some(IntentStatus::Completed)
        );

        // Already completed: the filtered update touches no rows.
        assert!(!store.mark_completed(7).await.unwrap());
        assert!(!store.mark_completed(99).await.unwrap());
    }

    #[tokio::test]
    async fn completed_intent_is_not_pending() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store.insert_intent(&intent(7, IntentStatus::Completed)).await.unwrap();
        assert!(store.find_pending(7, "42", "2").await.unwrap().is_none());
    }

    // ── Gifts ─────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn gift_payload_roundtrip() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store
            .insert_gift(&GiftRecord {
                nft_id: "42".into(),
                category_id: "2".into(),
                gifts: vec![
                    Gift {
                        sms_short_name: "Coffee".into(),
                        promo_code: "BREW-1".into(),
                    },
                    Gift {
                        sms_short_name: "Mug".into(),
                        promo_code: "CUP-2".into(),
                    },
                ],
            })
            .await
            .unwrap();

        let found = store.find_gift("42", "2").await.unwrap().unwrap();
        assert_eq!(found.gifts.len(), 2);
        assert_eq!(found.gifts[0].promo_code, "BREW-1");

        assert!(store.find_gift("42", "9").await.unwrap().is_none());
    }
}
