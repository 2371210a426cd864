// crates/arbiter-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Persistence
// Description: Durable Persistence backed by SQLite WAL.
// Purpose: Persist judgments, blocks, feedback, digests, triggers, and state.
// Dependencies: arbiter-core, rusqlite, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This module implements the durable [`Persistence`] capability on `SQLite`.
//! Records are stored as JSON payloads alongside the columns queries filter
//! on; the seal transaction writes the block row, the membership rows, and
//! every judgment's `block_slot` in one transaction, so a failed seal leaves
//! no observable mutation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::time::Duration;

use arbiter_core::Block;
use arbiter_core::Digest;
use arbiter_core::DigestId;
use arbiter_core::Feedback;
use arbiter_core::FeedbackId;
use arbiter_core::Judgment;
use arbiter_core::JudgmentDraft;
use arbiter_core::JudgmentId;
use arbiter_core::LearningState;
use arbiter_core::NewDigest;
use arbiter_core::NewFeedback;
use arbiter_core::Persistence;
use arbiter_core::PersistenceError;
use arbiter_core::RESET_CONFIRMATION_TOKEN;
use arbiter_core::SessionId;
use arbiter_core::Trigger;
use arbiter_core::TriggerId;
use arbiter_core::UserId;
use arbiter_core::now_millis;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use rusqlite::params;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Schema statements applied at open.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS judgments (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    item_type TEXT NOT NULL,
    item_content TEXT NOT NULL,
    q_score INTEGER NOT NULL,
    verdict TEXT NOT NULL,
    block_slot INTEGER,
    payload_json TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_judgments_created ON judgments (created_at DESC, seq DESC);
CREATE TABLE IF NOT EXISTS blocks (
    slot INTEGER PRIMARY KEY,
    hash TEXT NOT NULL,
    prev_hash TEXT NOT NULL,
    payload_json TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS block_judgments (
    slot INTEGER NOT NULL,
    judgment_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (slot, position)
);
CREATE INDEX IF NOT EXISTS idx_block_judgments_id ON block_judgments (judgment_id);
CREATE TABLE IF NOT EXISTS feedback (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    judgment_id TEXT NOT NULL,
    payload_json TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_feedback_judgment ON feedback (judgment_id);
CREATE TABLE IF NOT EXISTS digests (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    source TEXT NOT NULL,
    content TEXT NOT NULL,
    payload_json TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS triggers (
    id TEXT PRIMARY KEY,
    enabled INTEGER NOT NULL,
    payload_json TEXT NOT NULL
);
";

// ============================================================================
// SECTION: Config
// ============================================================================

/// Configuration for the `SQLite` persistence store.
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
}

impl SqliteStoreConfig {
    /// Creates a configuration with default timeouts.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Stored payload failed to deserialize.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Referenced record does not exist.
    #[error("sqlite store not found: {0}")]
    NotFound(String),
}

impl From<rusqlite::Error> for SqliteStoreError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Db(error.to_string())
    }
}

impl From<SqliteStoreError> for PersistenceError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) | SqliteStoreError::VersionMismatch(message) => {
                Self::Corrupt(message)
            }
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::NotFound(message) => Self::NotFound(message),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed persistence with WAL journaling.
#[derive(Clone)]
pub struct SqlitePersistence {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqlitePersistence {
    /// Opens an `SQLite`-backed persistence store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        if let Some(parent) = config.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        }
        let connection = Connection::open(&config.path)?;
        connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        connection.pragma_update(None, "journal_mode", "wal")?;
        connection.pragma_update(None, "synchronous", "full")?;
        connection.execute_batch(SCHEMA_SQL)?;
        check_schema_version(&connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Locks the connection, recovering from poisoning.
    fn connection(&self) -> MutexGuard<'_, Connection> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Verifies or initializes the stored schema version.
fn check_schema_version(connection: &Connection) -> Result<(), SqliteStoreError> {
    let stored: Option<String> = connection
        .query_row("SELECT value FROM meta WHERE key = 'schema_version'", [], |row| row.get(0))
        .optional()?;
    let expected = SCHEMA_VERSION.to_string();
    match stored {
        None => {
            connection.execute(
                "INSERT INTO meta (key, value) VALUES ('schema_version', ?1)",
                params![expected],
            )?;
            Ok(())
        }
        Some(value) if value == expected => Ok(()),
        Some(value) => Err(SqliteStoreError::VersionMismatch(format!(
            "stored {value}, expected {SCHEMA_VERSION}"
        ))),
    }
}

/// Mints the next identifier with the given prefix inside a transaction.
fn mint_id(tx: &Transaction<'_>, prefix: &str) -> Result<String, SqliteStoreError> {
    let current: i64 = tx
        .query_row("SELECT CAST(value AS INTEGER) FROM meta WHERE key = 'next_id'", [], |row| {
            row.get(0)
        })
        .optional()?
        .unwrap_or(0);
    let next = current + 1;
    tx.execute(
        "INSERT INTO meta (key, value) VALUES ('next_id', ?1)
         ON CONFLICT(key) DO UPDATE SET value = ?1",
        params![next.to_string()],
    )?;
    Ok(format!("{prefix}-{next}"))
}

/// Escapes LIKE wildcards in a search query.
fn escape_like(query: &str) -> String {
    query.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

/// Deserializes a judgment payload, overlaying the stored block slot.
fn decode_judgment(
    payload: &str,
    block_slot: Option<u64>,
) -> Result<Judgment, SqliteStoreError> {
    let mut judgment: Judgment = serde_json::from_str(payload)
        .map_err(|err| SqliteStoreError::Corrupt(format!("judgment payload: {err}")))?;
    judgment.block_slot = block_slot;
    Ok(judgment)
}

/// Serializes a record payload.
fn encode<T: serde::Serialize>(value: &T) -> Result<String, SqliteStoreError> {
    serde_json::to_string(value).map_err(|err| SqliteStoreError::Invalid(err.to_string()))
}

impl Persistence for SqlitePersistence {
    fn store_judgment(
        &self,
        draft: &JudgmentDraft,
        user_id: Option<&UserId>,
        session_id: Option<&SessionId>,
    ) -> Result<Judgment, PersistenceError> {
        let mut guard = self.connection();
        let tx = guard.transaction().map_err(SqliteStoreError::from)?;
        let id = JudgmentId::new(mint_id(&tx, "j")?);
        let judgment = Judgment::from_draft(
            draft.clone(),
            id,
            user_id.cloned(),
            session_id.cloned(),
            now_millis(),
        );
        tx.execute(
            "INSERT INTO judgments
                (id, item_type, item_content, q_score, verdict, block_slot, payload_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, ?7)",
            params![
                judgment.id.as_str(),
                judgment.item_type.as_str(),
                judgment.item_content,
                i64::from(judgment.q_score),
                judgment.verdict.as_str(),
                encode(&judgment)?,
                judgment.created_at,
            ],
        )
        .map_err(SqliteStoreError::from)?;
        tx.commit().map_err(SqliteStoreError::from)?;
        Ok(judgment)
    }

    fn set_judgment_block_slot(
        &self,
        id: &JudgmentId,
        slot: u64,
    ) -> Result<(), PersistenceError> {
        let guard = self.connection();
        let updated = guard
            .execute(
                "UPDATE judgments SET block_slot = ?1 WHERE id = ?2",
                params![i64::try_from(slot).unwrap_or(i64::MAX), id.as_str()],
            )
            .map_err(SqliteStoreError::from)?;
        if updated == 0 {
            return Err(PersistenceError::NotFound(format!("judgment {id}")));
        }
        Ok(())
    }

    fn judgment(&self, id: &JudgmentId) -> Result<Option<Judgment>, PersistenceError> {
        let guard = self.connection();
        let row: Option<(String, Option<i64>)> = guard
            .query_row(
                "SELECT payload_json, block_slot FROM judgments WHERE id = ?1",
                params![id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(SqliteStoreError::from)?;
        match row {
            None => Ok(None),
            Some((payload, slot)) => {
                let slot = slot.and_then(|value| u64::try_from(value).ok());
                Ok(Some(decode_judgment(&payload, slot)?))
            }
        }
    }

    fn search_judgments(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Judgment>, PersistenceError> {
        let guard = self.connection();
        let pattern = format!("%{}%", escape_like(query));
        let mut stmt = guard
            .prepare(
                "SELECT payload_json, block_slot FROM judgments
                 WHERE item_content LIKE ?1 ESCAPE '\\'
                 ORDER BY created_at DESC, seq DESC LIMIT ?2",
            )
            .map_err(SqliteStoreError::from)?;
        let rows = stmt
            .query_map(params![pattern, i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Option<i64>>(1)?))
            })
            .map_err(SqliteStoreError::from)?;
        let mut judgments = Vec::new();
        for row in rows {
            let (payload, slot) = row.map_err(SqliteStoreError::from)?;
            let slot = slot.and_then(|value| u64::try_from(value).ok());
            judgments.push(decode_judgment(&payload, slot)?);
        }
        Ok(judgments)
    }

    fn recent_judgments(&self, limit: usize) -> Result<Vec<Judgment>, PersistenceError> {
        let guard = self.connection();
        let mut stmt = guard
            .prepare(
                "SELECT payload_json, block_slot FROM judgments
                 ORDER BY created_at DESC, seq DESC LIMIT ?1",
            )
            .map_err(SqliteStoreError::from)?;
        let rows = stmt
            .query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Option<i64>>(1)?))
            })
            .map_err(SqliteStoreError::from)?;
        let mut judgments = Vec::new();
        for row in rows {
            let (payload, slot) = row.map_err(SqliteStoreError::from)?;
            let slot = slot.and_then(|value| u64::try_from(value).ok());
            judgments.push(decode_judgment(&payload, slot)?);
        }
        Ok(judgments)
    }

    fn store_sealed_block(&self, block: &Block) -> Result<(), PersistenceError> {
        let mut guard = self.connection();
        let tx = guard.transaction().map_err(SqliteStoreError::from)?;
        let slot = i64::try_from(block.slot).unwrap_or(i64::MAX);
        let inserted = tx
            .execute(
                "INSERT OR IGNORE INTO blocks (slot, hash, prev_hash, payload_json, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![slot, block.hash, block.prev_hash, encode(block)?, block.created_at],
            )
            .map_err(SqliteStoreError::from)?;
        if inserted == 0 {
            return Err(PersistenceError::Invalid(format!(
                "block slot {} already exists",
                block.slot
            )));
        }
        for (position, id) in block.judgment_ids.iter().enumerate() {
            let updated = tx
                .execute(
                    "UPDATE judgments SET block_slot = ?1 WHERE id = ?2",
                    params![slot, id.as_str()],
                )
                .map_err(SqliteStoreError::from)?;
            if updated == 0 {
                return Err(PersistenceError::NotFound(format!("judgment {id}")));
            }
            tx.execute(
                "INSERT INTO block_judgments (slot, judgment_id, position) VALUES (?1, ?2, ?3)",
                params![slot, id.as_str(), i64::try_from(position).unwrap_or(i64::MAX)],
            )
            .map_err(SqliteStoreError::from)?;
        }
        tx.commit().map_err(SqliteStoreError::from)?;
        Ok(())
    }

    fn block_by_slot(&self, slot: u64) -> Result<Option<Block>, PersistenceError> {
        let guard = self.connection();
        let payload: Option<String> = guard
            .query_row(
                "SELECT payload_json FROM blocks WHERE slot = ?1",
                params![i64::try_from(slot).unwrap_or(i64::MAX)],
                |row| row.get(0),
            )
            .optional()
            .map_err(SqliteStoreError::from)?;
        payload
            .map(|payload| {
                serde_json::from_str(&payload).map_err(|err| {
                    PersistenceError::Corrupt(format!("block payload: {err}"))
                })
            })
            .transpose()
    }

    fn head_block(&self) -> Result<Option<Block>, PersistenceError> {
        let guard = self.connection();
        let payload: Option<String> = guard
            .query_row(
                "SELECT payload_json FROM blocks ORDER BY slot DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(SqliteStoreError::from)?;
        payload
            .map(|payload| {
                serde_json::from_str(&payload).map_err(|err| {
                    PersistenceError::Corrupt(format!("block payload: {err}"))
                })
            })
            .transpose()
    }

    fn recent_blocks(&self, limit: usize) -> Result<Vec<Block>, PersistenceError> {
        let guard = self.connection();
        let mut stmt = guard
            .prepare("SELECT payload_json FROM blocks ORDER BY slot DESC LIMIT ?1")
            .map_err(SqliteStoreError::from)?;
        let rows = stmt
            .query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
                row.get::<_, String>(0)
            })
            .map_err(SqliteStoreError::from)?;
        let mut blocks = Vec::new();
        for row in rows {
            let payload = row.map_err(SqliteStoreError::from)?;
            blocks.push(serde_json::from_str(&payload).map_err(|err| {
                PersistenceError::Corrupt(format!("block payload: {err}"))
            })?);
        }
        Ok(blocks)
    }

    fn store_feedback(&self, new: &NewFeedback) -> Result<Feedback, PersistenceError> {
        let mut guard = self.connection();
        let tx = guard.transaction().map_err(SqliteStoreError::from)?;
        let known: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM judgments WHERE id = ?1",
                params![new.judgment_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(SqliteStoreError::from)?;
        if known.is_none() {
            return Err(PersistenceError::NotFound(format!("judgment {}", new.judgment_id)));
        }
        let id = FeedbackId::new(mint_id(&tx, "f")?);
        let feedback = Feedback::from_new(new.clone(), id, now_millis());
        tx.execute(
            "INSERT INTO feedback (id, judgment_id, payload_json, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                feedback.id.as_str(),
                feedback.judgment_id.as_str(),
                encode(&feedback)?,
                feedback.created_at,
            ],
        )
        .map_err(SqliteStoreError::from)?;
        tx.commit().map_err(SqliteStoreError::from)?;
        Ok(feedback)
    }

    fn feedback_for(&self, id: &JudgmentId) -> Result<Vec<Feedback>, PersistenceError> {
        let guard = self.connection();
        let mut stmt = guard
            .prepare(
                "SELECT payload_json FROM feedback WHERE judgment_id = ?1 ORDER BY seq ASC",
            )
            .map_err(SqliteStoreError::from)?;
        let rows = stmt
            .query_map(params![id.as_str()], |row| row.get::<_, String>(0))
            .map_err(SqliteStoreError::from)?;
        let mut records = Vec::new();
        for row in rows {
            let payload = row.map_err(SqliteStoreError::from)?;
            records.push(serde_json::from_str(&payload).map_err(|err| {
                PersistenceError::Corrupt(format!("feedback payload: {err}"))
            })?);
        }
        Ok(records)
    }

    fn store_digest(&self, new: &NewDigest) -> Result<Digest, PersistenceError> {
        let mut guard = self.connection();
        let tx = guard.transaction().map_err(SqliteStoreError::from)?;
        let id = DigestId::new(mint_id(&tx, "d")?);
        let digest = Digest::from_new(new.clone(), id, now_millis());
        tx.execute(
            "INSERT INTO digests (id, source, content, payload_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                digest.id.as_str(),
                digest.source,
                digest.content,
                encode(&digest)?,
                digest.created_at,
            ],
        )
        .map_err(SqliteStoreError::from)?;
        tx.commit().map_err(SqliteStoreError::from)?;
        Ok(digest)
    }

    fn search_digests(&self, query: &str, limit: usize) -> Result<Vec<Digest>, PersistenceError> {
        let guard = self.connection();
        let pattern = format!("%{}%", escape_like(query));
        let mut stmt = guard
            .prepare(
                "SELECT payload_json FROM digests
                 WHERE content LIKE ?1 ESCAPE '\\' OR source LIKE ?1 ESCAPE '\\'
                 ORDER BY created_at DESC, seq DESC LIMIT ?2",
            )
            .map_err(SqliteStoreError::from)?;
        let rows = stmt
            .query_map(params![pattern, i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
                row.get::<_, String>(0)
            })
            .map_err(SqliteStoreError::from)?;
        let mut digests = Vec::new();
        for row in rows {
            let payload = row.map_err(SqliteStoreError::from)?;
            digests.push(serde_json::from_str(&payload).map_err(|err| {
                PersistenceError::Corrupt(format!("digest payload: {err}"))
            })?);
        }
        Ok(digests)
    }

    fn upsert_trigger(&self, trigger: &Trigger) -> Result<(), PersistenceError> {
        let guard = self.connection();
        guard
            .execute(
                "INSERT INTO triggers (id, enabled, payload_json) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET enabled = ?2, payload_json = ?3",
                params![trigger.id.as_str(), i64::from(trigger.enabled), encode(trigger)?],
            )
            .map_err(SqliteStoreError::from)?;
        Ok(())
    }

    fn list_triggers(&self) -> Result<Vec<Trigger>, PersistenceError> {
        let guard = self.connection();
        let mut stmt = guard
            .prepare("SELECT payload_json FROM triggers ORDER BY id ASC")
            .map_err(SqliteStoreError::from)?;
        let rows =
            stmt.query_map([], |row| row.get::<_, String>(0)).map_err(SqliteStoreError::from)?;
        let mut triggers = Vec::new();
        for row in rows {
            let payload = row.map_err(SqliteStoreError::from)?;
            triggers.push(serde_json::from_str(&payload).map_err(|err| {
                PersistenceError::Corrupt(format!("trigger payload: {err}"))
            })?);
        }
        Ok(triggers)
    }

    fn delete_trigger(&self, id: &TriggerId) -> Result<bool, PersistenceError> {
        let guard = self.connection();
        let deleted = guard
            .execute("DELETE FROM triggers WHERE id = ?1", params![id.as_str()])
            .map_err(SqliteStoreError::from)?;
        Ok(deleted > 0)
    }

    fn set_trigger_enabled(
        &self,
        id: &TriggerId,
        enabled: bool,
    ) -> Result<bool, PersistenceError> {
        let mut guard = self.connection();
        let tx = guard.transaction().map_err(SqliteStoreError::from)?;
        let payload: Option<String> = tx
            .query_row(
                "SELECT payload_json FROM triggers WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(SqliteStoreError::from)?;
        let Some(payload) = payload else {
            return Ok(false);
        };
        let mut trigger: Trigger = serde_json::from_str(&payload)
            .map_err(|err| PersistenceError::Corrupt(format!("trigger payload: {err}")))?;
        trigger.enabled = enabled;
        tx.execute(
            "UPDATE triggers SET enabled = ?1, payload_json = ?2 WHERE id = ?3",
            params![
                i64::from(enabled),
                encode(&trigger).map_err(SqliteStoreError::from)?,
                id.as_str()
            ],
        )
        .map_err(SqliteStoreError::from)?;
        tx.commit().map_err(SqliteStoreError::from)?;
        Ok(true)
    }

    fn load_learning_state(&self) -> Result<Option<LearningState>, PersistenceError> {
        let guard = self.connection();
        let payload: Option<String> = guard
            .query_row(
                "SELECT value FROM meta WHERE key = 'learning_state'",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(SqliteStoreError::from)?;
        payload
            .map(|payload| {
                serde_json::from_str(&payload).map_err(|err| {
                    PersistenceError::Corrupt(format!("learning state payload: {err}"))
                })
            })
            .transpose()
    }

    fn save_learning_state(&self, state: &LearningState) -> Result<(), PersistenceError> {
        let guard = self.connection();
        guard
            .execute(
                "INSERT INTO meta (key, value) VALUES ('learning_state', ?1)
                 ON CONFLICT(key) DO UPDATE SET value = ?1",
                params![encode(state)?],
            )
            .map_err(SqliteStoreError::from)?;
        Ok(())
    }

    fn count_unlinked_judgments(&self) -> Result<u64, PersistenceError> {
        let guard = self.connection();
        let count: i64 = guard
            .query_row("SELECT COUNT(*) FROM judgments WHERE block_slot IS NULL", [], |row| {
                row.get(0)
            })
            .map_err(SqliteStoreError::from)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn find_orphaned_judgments(&self) -> Result<Vec<Judgment>, PersistenceError> {
        let guard = self.connection();
        let mut stmt = guard
            .prepare(
                "SELECT payload_json FROM judgments
                 WHERE block_slot IS NULL
                   AND id NOT IN (SELECT judgment_id FROM block_judgments)
                 ORDER BY created_at ASC, id ASC",
            )
            .map_err(SqliteStoreError::from)?;
        let rows =
            stmt.query_map([], |row| row.get::<_, String>(0)).map_err(SqliteStoreError::from)?;
        let mut judgments = Vec::new();
        for row in rows {
            let payload = row.map_err(SqliteStoreError::from)?;
            judgments.push(decode_judgment(&payload, None)?);
        }
        Ok(judgments)
    }

    fn reset_all(&self, confirmation_token: &str) -> Result<(), PersistenceError> {
        if confirmation_token != RESET_CONFIRMATION_TOKEN {
            return Err(PersistenceError::Invalid(
                "reset requires the exact confirmation token".to_string(),
            ));
        }
        let mut guard = self.connection();
        let tx = guard.transaction().map_err(SqliteStoreError::from)?;
        for table in ["judgments", "blocks", "block_judgments", "feedback", "digests", "triggers"] {
            tx.execute(&format!("DELETE FROM {table}"), [])
                .map_err(SqliteStoreError::from)?;
        }
        tx.execute("DELETE FROM meta WHERE key != 'schema_version'", [])
            .map_err(SqliteStoreError::from)?;
        tx.commit().map_err(SqliteStoreError::from)?;
        Ok(())
    }

    fn readiness(&self) -> Result<(), PersistenceError> {
        let guard = self.connection();
        guard
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(SqliteStoreError::from)?;
        Ok(())
    }
}
