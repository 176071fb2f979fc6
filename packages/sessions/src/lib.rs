#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Persistent session state backed by `SQLite`.
//!
//! Two kinds of state live in `data/sessions.db`:
//! - short-lived associations (call → conversation, conversation → report
//!   record, call → pending spoken reply) in a key-value table with a TTL,
//! - the LLM message history of each conversation, kept for follow-up turns
//!   and auditing through the `detective_sessions` CLI.
//!
//! Uses `switchy_database` for all database operations.

pub mod history;
pub mod kv;

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use detective_ai::providers::Message;
use switchy_database::Database;
use switchy_database_connection::init_sqlite_rusqlite;
use thiserror::Error;

/// Default path for the sessions database.
pub const DEFAULT_DB_PATH: &str = "data/sessions.db";

/// Default lifetime of an association.
pub const DEFAULT_TTL_HOURS: i64 = 24;

/// Errors from session storage operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A database query or command failed.
    #[error("Database error: {0}")]
    Database(String),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A conversation id or prefix did not resolve to exactly one
    /// conversation.
    #[error("{message}")]
    Resolve {
        /// Description.
        message: String,
    },
}

/// Stored form of an instant: RFC 3339 UTC with second precision and a
/// `Z` suffix, so lexical order equals time order.
pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Reads `SESSION_TTL_HOURS`, falling back to [`DEFAULT_TTL_HOURS`].
#[must_use]
pub fn ttl_from_env() -> Duration {
    let hours = std::env::var("SESSION_TTL_HOURS")
        .ok()
        .and_then(|h| h.parse::<i64>().ok())
        .filter(|h| *h > 0)
        .unwrap_or(DEFAULT_TTL_HOURS);
    Duration::hours(hours)
}

/// What one [`purge`] removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeSummary {
    /// Expired associations.
    pub values: u64,
    /// Conversations idle for longer than the TTL.
    pub conversations: u64,
}

/// Deletes expired associations and conversations not updated within
/// `ttl` of `now`.
///
/// # Errors
///
/// Returns [`SessionError`] if the database operation fails.
pub async fn purge(db: &dyn Database, now: DateTime<Utc>, ttl: Duration) -> Result<PurgeSummary, SessionError> {
    Ok(PurgeSummary {
        values: kv::purge_expired(db, now).await?,
        conversations: history::purge_stale(db, now - ttl).await?,
    })
}

/// Opens (or creates) the sessions `SQLite` database and ensures the
/// schema exists.
///
/// # Errors
///
/// Returns [`SessionError`] if the database cannot be opened or schema
/// creation fails.
pub async fn open_db(path: &Path) -> Result<Box<dyn Database>, SessionError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let db = init_sqlite_rusqlite(Some(path)).map_err(|e| SessionError::Database(e.to_string()))?;

    ensure_schema(db.as_ref()).await?;

    Ok(db)
}

/// Creates all tables if they don't already exist.
async fn ensure_schema(db: &dyn Database) -> Result<(), SessionError> {
    for statement in [
        "CREATE TABLE IF NOT EXISTS session_values (
            session_key TEXT PRIMARY KEY,
            value       TEXT NOT NULL,
            expires_at  TEXT NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_session_values_expires
         ON session_values (expires_at)",
        "CREATE TABLE IF NOT EXISTS conversations (
            id          TEXT PRIMARY KEY,
            title       TEXT,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS messages (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
            sequence        INTEGER NOT NULL,
            role            TEXT NOT NULL,
            content         TEXT NOT NULL,
            created_at      TEXT NOT NULL,
            UNIQUE(conversation_id, sequence)
        )",
        "CREATE INDEX IF NOT EXISTS idx_messages_conversation
         ON messages (conversation_id, sequence)",
        "CREATE INDEX IF NOT EXISTS idx_conversations_updated
         ON conversations (updated_at)",
        // SQLite has foreign keys off by default
        "PRAGMA foreign_keys = ON",
    ] {
        db.exec_raw(statement)
            .await
            .map_err(|e| SessionError::Database(e.to_string()))?;
    }

    Ok(())
}

/// Per-conversation associations and history behind one handle.
///
/// Key namespaces: `call:{CallSid}` → conversation id,
/// `record:{conversation}` → report record id, `reply:{CallSid}` →
/// pending spoken reply.
#[derive(Clone)]
pub struct SessionStore {
    db: Arc<dyn Database>,
    ttl: Duration,
}

impl SessionStore {
    /// Wraps an open database.
    #[must_use]
    pub fn new(db: Arc<dyn Database>, ttl: Duration) -> Self {
        Self { db, ttl }
    }

    /// Opens the database at `SESSIONS_DB_PATH` with a TTL of
    /// `SESSION_TTL_HOURS`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the database cannot be opened.
    pub async fn from_env() -> Result<Self, SessionError> {
        let path = std::env::var("SESSIONS_DB_PATH").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());
        let ttl = ttl_from_env();

        log::info!("Opening session store at {path} (TTL {}h)", ttl.num_hours());
        let db = open_db(Path::new(&path)).await?;
        Ok(Self::new(Arc::from(db), ttl))
    }

    /// The underlying database.
    #[must_use]
    pub fn db(&self) -> &dyn Database {
        self.db.as_ref()
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    /// Conversation bound to a phone call.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the database operation fails.
    pub async fn conversation_for_call(&self, call_sid: &str) -> Result<Option<String>, SessionError> {
        kv::get(self.db(), &format!("call:{call_sid}"), Self::now()).await
    }

    /// Binds a phone call to a conversation.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the database operation fails.
    pub async fn link_call(&self, call_sid: &str, conversation_id: &str) -> Result<(), SessionError> {
        kv::set(
            self.db(),
            &format!("call:{call_sid}"),
            conversation_id,
            Self::now() + self.ttl,
        )
        .await
    }

    /// Report record created for a conversation.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the database operation fails.
    pub async fn record_for_conversation(&self, conversation_id: &str) -> Result<Option<String>, SessionError> {
        kv::get(self.db(), &format!("record:{conversation_id}"), Self::now()).await
    }

    /// Remembers the report record of a conversation.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the database operation fails.
    pub async fn link_record(&self, conversation_id: &str, record_id: &str) -> Result<(), SessionError> {
        kv::set(
            self.db(),
            &format!("record:{conversation_id}"),
            record_id,
            Self::now() + self.ttl,
        )
        .await
    }

    /// Stores the reply to speak on the caller's next turn.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the database operation fails.
    pub async fn set_pending_reply(&self, call_sid: &str, reply: &str) -> Result<(), SessionError> {
        kv::set(
            self.db(),
            &format!("reply:{call_sid}"),
            reply,
            Self::now() + self.ttl,
        )
        .await
    }

    /// Removes and returns the pending reply for a call.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the database operation fails.
    pub async fn take_pending_reply(&self, call_sid: &str) -> Result<Option<String>, SessionError> {
        kv::take(self.db(), &format!("reply:{call_sid}"), Self::now()).await
    }

    /// Message history of a conversation, empty when unknown.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the database operation fails.
    pub async fn history(&self, conversation_id: &str) -> Result<Vec<Message>, SessionError> {
        Ok(history::load_messages(self.db(), conversation_id)
            .await?
            .unwrap_or_default())
    }

    /// Replaces the message history of a conversation.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the database operation fails.
    pub async fn save_history(&self, conversation_id: &str, messages: &[Message]) -> Result<(), SessionError> {
        history::save_conversation(self.db(), conversation_id, messages).await
    }

    /// Deletes expired associations and idle conversations.
    ///
    /// Every turn refreshes both the history and the record link, so a
    /// conversation and its associations expire together.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the database operation fails.
    pub async fn purge(&self) -> Result<PurgeSummary, SessionError> {
        purge(self.db(), Self::now(), self.ttl).await
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::PathBuf;

    use switchy_database::Database;

    pub struct TempDb {
        pub path: PathBuf,
        pub db: Box<dyn Database>,
    }

    impl Drop for TempDb {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    pub async fn temp_db() -> TempDb {
        let path = std::env::temp_dir().join(format!("detective-sessions-{}.db", uuid::Uuid::new_v4()));
        let db = super::open_db(&path).await.unwrap();
        TempDb { path, db }
    }
}
