//! Key-value associations with expiry.
//!
//! Expiry instants are stored as RFC 3339 UTC strings with second
//! precision and a `Z` suffix, so lexical order equals time order and
//! expiry checks stay in SQL.

use chrono::{DateTime, Utc};
use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{Database, DatabaseValue};

use crate::{SessionError, timestamp};

/// Stores `value` under `key` until `expires_at`, replacing any previous
/// value.
///
/// # Errors
///
/// Returns [`SessionError`] if the database operation fails.
pub async fn set(
    db: &dyn Database,
    key: &str,
    value: &str,
    expires_at: DateTime<Utc>,
) -> Result<(), SessionError> {
    db.exec_raw_params(
        "INSERT INTO session_values (session_key, value, expires_at)
         VALUES ($1, $2, $3)
         ON CONFLICT (session_key) DO UPDATE SET
           value = excluded.value,
           expires_at = excluded.expires_at",
        &[
            DatabaseValue::String(key.to_string()),
            DatabaseValue::String(value.to_string()),
            DatabaseValue::String(timestamp(expires_at)),
        ],
    )
    .await
    .map_err(|e| SessionError::Database(e.to_string()))?;

    Ok(())
}

/// Returns the value under `key` unless it has expired at `now`.
///
/// # Errors
///
/// Returns [`SessionError`] if the database operation fails.
pub async fn get(db: &dyn Database, key: &str, now: DateTime<Utc>) -> Result<Option<String>, SessionError> {
    let rows = db
        .query_raw_params(
            "SELECT value FROM session_values
             WHERE session_key = $1 AND expires_at > $2",
            &[
                DatabaseValue::String(key.to_string()),
                DatabaseValue::String(timestamp(now)),
            ],
        )
        .await
        .map_err(|e| SessionError::Database(e.to_string()))?;

    Ok(rows.first().and_then(|r| r.to_value("value").ok()))
}

/// Removes `key` and returns its value if it had not expired.
///
/// # Errors
///
/// Returns [`SessionError`] if the database operation fails.
pub async fn take(db: &dyn Database, key: &str, now: DateTime<Utc>) -> Result<Option<String>, SessionError> {
    let value = get(db, key, now).await?;
    delete(db, key).await?;
    Ok(value)
}

/// Removes `key`. Returns `true` if a row was deleted.
///
/// # Errors
///
/// Returns [`SessionError`] if the database operation fails.
pub async fn delete(db: &dyn Database, key: &str) -> Result<bool, SessionError> {
    let deleted = db
        .exec_raw_params(
            "DELETE FROM session_values WHERE session_key = $1",
            &[DatabaseValue::String(key.to_string())],
        )
        .await
        .map_err(|e| SessionError::Database(e.to_string()))?;

    Ok(deleted > 0)
}

/// Deletes every entry that has expired at `now` and returns how many
/// were removed.
///
/// # Errors
///
/// Returns [`SessionError`] if the database operation fails.
pub async fn purge_expired(db: &dyn Database, now: DateTime<Utc>) -> Result<u64, SessionError> {
    let deleted = db
        .exec_raw_params(
            "DELETE FROM session_values WHERE expires_at <= $1",
            &[DatabaseValue::String(timestamp(now))],
        )
        .await
        .map_err(|e| SessionError::Database(e.to_string()))?;

    if deleted > 0 {
        log::info!("Purged {deleted} expired session value(s)");
    }

    Ok(deleted)
}
