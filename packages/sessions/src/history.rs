//! Conversation message history.
//!
//! The agent returns the complete history each turn, so saving replaces
//! all stored messages of the conversation.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use detective_ai::providers::{ContentBlock, Message, MessageContent};
use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{Database, DatabaseValue};

use crate::SessionError;

/// Maximum title length (truncated from first user message).
const MAX_TITLE_LENGTH: usize = 100;

/// Tool results longer than this are cut in readable output.
const MAX_DISPLAY_RESULT_CHARS: usize = 500;

/// Summary of a conversation for listing.
#[derive(Debug, Clone)]
pub struct ConversationSummary {
    /// Conversation UUID.
    pub id: String,
    /// Title (first user message, truncated).
    pub title: Option<String>,
    /// When the conversation was created.
    pub created_at: String,
    /// When the conversation was last updated.
    pub updated_at: String,
    /// Total number of messages.
    pub message_count: i64,
}

/// A single stored message.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    /// Ordering within the conversation.
    pub sequence: i32,
    /// Role: "user" or "assistant".
    pub role: String,
    /// JSON-serialized `MessageContent`.
    pub content: String,
    /// When this message was stored.
    pub created_at: String,
}

/// Saves a conversation and its full message history.
///
/// # Errors
///
/// Returns [`SessionError`] if any database operation fails.
pub async fn save_conversation(
    db: &dyn Database,
    id: &str,
    messages: &[Message],
) -> Result<(), SessionError> {
    let now = crate::timestamp(Utc::now());

    let title = messages
        .iter()
        .find(|m| m.role == "user")
        .map(Message::text)
        .filter(|t| !t.trim().is_empty())
        .map(|t| truncate_chars(t.trim(), MAX_TITLE_LENGTH));

    db.exec_raw_params(
        "INSERT INTO conversations (id, title, created_at, updated_at)
         VALUES ($1, $2, $3, $3)
         ON CONFLICT (id) DO UPDATE SET
           title = COALESCE(conversations.title, excluded.title),
           updated_at = excluded.updated_at",
        &[
            DatabaseValue::String(id.to_string()),
            title.map_or(DatabaseValue::Null, DatabaseValue::String),
            DatabaseValue::String(now.clone()),
        ],
    )
    .await
    .map_err(|e| SessionError::Database(e.to_string()))?;

    db.exec_raw_params(
        "DELETE FROM messages WHERE conversation_id = $1",
        &[DatabaseValue::String(id.to_string())],
    )
    .await
    .map_err(|e| SessionError::Database(e.to_string()))?;

    for (i, msg) in messages.iter().enumerate() {
        let content_json = serde_json::to_string(&msg.content)?;

        db.exec_raw_params(
            "INSERT INTO messages (conversation_id, sequence, role, content, created_at)
             VALUES ($1, $2, $3, $4, $5)",
            &[
                DatabaseValue::String(id.to_string()),
                DatabaseValue::Int32(i32::try_from(i).unwrap_or(i32::MAX)),
                DatabaseValue::String(msg.role.clone()),
                DatabaseValue::String(content_json),
                DatabaseValue::String(now.clone()),
            ],
        )
        .await
        .map_err(|e| SessionError::Database(e.to_string()))?;
    }

    log::debug!("Saved {} message(s) for conversation {id}", messages.len());

    Ok(())
}

/// Loads the message history for a conversation.
///
/// Returns `None` if the conversation doesn't exist.
///
/// # Errors
///
/// Returns [`SessionError`] if the database operation fails.
pub async fn load_messages(
    db: &dyn Database,
    conversation_id: &str,
) -> Result<Option<Vec<Message>>, SessionError> {
    let Some(stored) = get_conversation_messages(db, conversation_id).await? else {
        return Ok(None);
    };

    let mut messages = Vec::with_capacity(stored.len());
    for msg in stored {
        let content: MessageContent = serde_json::from_str(&msg.content)?;
        messages.push(Message {
            role: msg.role,
            content,
        });
    }

    Ok(Some(messages))
}

/// Lists recent conversations, most recently updated first.
///
/// # Errors
///
/// Returns [`SessionError`] if the database operation fails.
pub async fn list_conversations(
    db: &dyn Database,
    limit: u32,
    offset: u32,
) -> Result<Vec<ConversationSummary>, SessionError> {
    let rows = db
        .query_raw_params(
            "SELECT c.id, c.title, c.created_at, c.updated_at,
                    (SELECT COUNT(*) FROM messages m WHERE m.conversation_id = c.id) as message_count
             FROM conversations c
             ORDER BY c.updated_at DESC
             LIMIT $1 OFFSET $2",
            &[
                DatabaseValue::Int32(i32::try_from(limit).unwrap_or(i32::MAX)),
                DatabaseValue::Int32(i32::try_from(offset).unwrap_or(0)),
            ],
        )
        .await
        .map_err(|e| SessionError::Database(e.to_string()))?;

    Ok(rows
        .iter()
        .map(|row| ConversationSummary {
            id: row.to_value("id").unwrap_or_default(),
            title: row.to_value("title").unwrap_or(None),
            created_at: row.to_value("created_at").unwrap_or_default(),
            updated_at: row.to_value("updated_at").unwrap_or_default(),
            message_count: row.to_value("message_count").unwrap_or(0),
        })
        .collect())
}

/// Loads the raw stored messages of a conversation.
///
/// # Errors
///
/// Returns [`SessionError`] if the database operation fails.
pub async fn get_conversation_messages(
    db: &dyn Database,
    conversation_id: &str,
) -> Result<Option<Vec<StoredMessage>>, SessionError> {
    let rows = db
        .query_raw_params(
            "SELECT sequence, role, content, created_at FROM messages
             WHERE conversation_id = $1
             ORDER BY sequence",
            &[DatabaseValue::String(conversation_id.to_string())],
        )
        .await
        .map_err(|e| SessionError::Database(e.to_string()))?;

    if rows.is_empty() {
        return Ok(None);
    }

    Ok(Some(
        rows.iter()
            .map(|row| StoredMessage {
                sequence: row.to_value("sequence").unwrap_or(0),
                role: row.to_value("role").unwrap_or_default(),
                content: row.to_value("content").unwrap_or_default(),
                created_at: row.to_value("created_at").unwrap_or_default(),
            })
            .collect(),
    ))
}

/// Deletes a conversation and all its messages.
///
/// # Errors
///
/// Returns [`SessionError`] if the database operation fails.
pub async fn delete_conversation(db: &dyn Database, conversation_id: &str) -> Result<bool, SessionError> {
    db.exec_raw_params(
        "DELETE FROM messages WHERE conversation_id = $1",
        &[DatabaseValue::String(conversation_id.to_string())],
    )
    .await
    .map_err(|e| SessionError::Database(e.to_string()))?;

    let deleted = db
        .exec_raw_params(
            "DELETE FROM conversations WHERE id = $1",
            &[DatabaseValue::String(conversation_id.to_string())],
        )
        .await
        .map_err(|e| SessionError::Database(e.to_string()))?;

    Ok(deleted > 0)
}

/// Deletes conversations, and their messages, last updated before
/// `cutoff`. Returns how many conversations were removed.
///
/// # Errors
///
/// Returns [`SessionError`] if the database operation fails.
pub async fn purge_stale(db: &dyn Database, cutoff: DateTime<Utc>) -> Result<u64, SessionError> {
    let cutoff = DatabaseValue::String(crate::timestamp(cutoff));

    db.exec_raw_params(
        "DELETE FROM messages WHERE conversation_id IN
           (SELECT id FROM conversations WHERE updated_at < $1)",
        &[cutoff.clone()],
    )
    .await
    .map_err(|e| SessionError::Database(e.to_string()))?;

    let deleted = db
        .exec_raw_params("DELETE FROM conversations WHERE updated_at < $1", &[cutoff])
        .await
        .map_err(|e| SessionError::Database(e.to_string()))?;

    if deleted > 0 {
        log::info!("Purged {deleted} stale conversation(s)");
    }

    Ok(deleted)
}

/// Resolves a conversation ID, supporting prefix matching.
///
/// A full UUID (36+ chars) is returned as is. Otherwise the prefix must
/// match exactly one stored conversation.
///
/// # Errors
///
/// Returns [`SessionError::Resolve`] if no conversation or more than one
/// matches the prefix.
pub async fn resolve_id(db: &dyn Database, id: &str) -> Result<String, SessionError> {
    if id.len() >= 36 {
        return Ok(id.to_string());
    }

    let rows = db
        .query_raw_params(
            "SELECT id FROM conversations WHERE id LIKE $1 || '%' LIMIT 2",
            &[DatabaseValue::String(id.to_string())],
        )
        .await
        .map_err(|e| SessionError::Database(e.to_string()))?;

    match rows.as_slice() {
        [] => Err(SessionError::Resolve {
            message: format!("No conversation found matching prefix: {id}"),
        }),
        [row] => Ok(row.to_value("id").unwrap_or_default()),
        _ => Err(SessionError::Resolve {
            message: format!("Multiple conversations match prefix '{id}'. Be more specific."),
        }),
    }
}

/// Formats a conversation for human-readable display.
///
/// Shows user messages, tool calls with their arguments, tool results
/// (cut when long) and assistant replies.
#[must_use]
pub fn format_conversation(messages: &[StoredMessage]) -> String {
    let mut output = String::new();

    for msg in messages {
        let content: Result<MessageContent, _> = serde_json::from_str(&msg.content);

        match (msg.role.as_str(), content) {
            (role @ ("user" | "assistant"), Ok(MessageContent::Text(text))) => {
                let _ = writeln!(output, "--- {} ---\n{text}\n", role.to_uppercase());
            }
            ("assistant", Ok(MessageContent::Blocks(blocks))) => {
                let _ = writeln!(output, "--- ASSISTANT ---");
                for block in &blocks {
                    match block {
                        ContentBlock::Text { text } => {
                            let _ = writeln!(output, "{text}");
                        }
                        ContentBlock::ToolUse { name, input, .. } => {
                            let _ = writeln!(output, "[TOOL CALL: {name}]");
                            if let Ok(pretty) = serde_json::to_string_pretty(input) {
                                let _ = writeln!(output, "{pretty}");
                            }
                        }
                        ContentBlock::ToolResult { content, .. } => {
                            let _ = writeln!(
                                output,
                                "[TOOL RESULT]\n{}",
                                truncate_chars(content, MAX_DISPLAY_RESULT_CHARS)
                            );
                        }
                    }
                }
                let _ = writeln!(output);
            }
            ("user", Ok(MessageContent::Blocks(blocks))) => {
                for block in &blocks {
                    if let ContentBlock::ToolResult {
                        tool_use_id,
                        content,
                    } = block
                    {
                        let _ = writeln!(
                            output,
                            "--- TOOL RESULT (for {tool_use_id}) ---\n{}\n",
                            truncate_chars(content, MAX_DISPLAY_RESULT_CHARS)
                        );
                    }
                }
            }
            _ => {
                let _ = writeln!(output, "--- {} ---\n{}\n", msg.role.to_uppercase(), msg.content);
            }
        }
    }

    output
}

/// Cuts `s` to at most `max` characters, marking the cut with `...`.
#[must_use]
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_support::temp_db;

    fn sample() -> Vec<Message> {
        vec![
            Message::user("Someone stole my bike outside the library"),
            Message {
                role: "assistant".to_string(),
                content: MessageContent::Blocks(vec![ContentBlock::ToolUse {
                    id: "call_1".to_string(),
                    name: "update_crime_report".to_string(),
                    input: json!({ "crime_type": "bicycle theft" }),
                }]),
            },
            Message {
                role: "user".to_string(),
                content: MessageContent::Blocks(vec![ContentBlock::ToolResult {
                    tool_use_id: "call_1".to_string(),
                    content: "{\"success\":true}".to_string(),
                }]),
            },
            Message::assistant("When did this happen?"),
        ]
    }

    #[tokio::test]
    async fn saves_and_loads_history() {
        let temp = temp_db().await;
        let db = temp.db.as_ref();

        assert!(load_messages(db, "conv-1").await.unwrap().is_none());
        save_conversation(db, "conv-1", &sample()).await.unwrap();
        assert_eq!(load_messages(db, "conv-1").await.unwrap().unwrap(), sample());

        let mut longer = sample();
        longer.push(Message::user("Yesterday around 5pm"));
        save_conversation(db, "conv-1", &longer).await.unwrap();
        assert_eq!(load_messages(db, "conv-1").await.unwrap().unwrap().len(), 5);

        let list = list_conversations(db, 10, 0).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].message_count, 5);
        assert_eq!(
            list[0].title.as_deref(),
            Some("Someone stole my bike outside the library")
        );
    }

    #[tokio::test]
    async fn resolves_prefixes() {
        let temp = temp_db().await;
        let db = temp.db.as_ref();

        save_conversation(db, "abc-111", &sample()).await.unwrap();
        save_conversation(db, "abd-222", &sample()).await.unwrap();

        assert_eq!(resolve_id(db, "abc").await.unwrap(), "abc-111");
        assert!(matches!(resolve_id(db, "ab").await, Err(SessionError::Resolve { .. })));
        assert!(matches!(resolve_id(db, "zzz").await, Err(SessionError::Resolve { .. })));
    }

    #[tokio::test]
    async fn deletes_conversations() {
        let temp = temp_db().await;
        let db = temp.db.as_ref();

        save_conversation(db, "conv-2", &sample()).await.unwrap();
        assert!(delete_conversation(db, "conv-2").await.unwrap());
        assert!(!delete_conversation(db, "conv-2").await.unwrap());
        assert!(load_messages(db, "conv-2").await.unwrap().is_none());
    }

    #[test]
    fn formats_tool_calls_and_results() {
        let stored: Vec<StoredMessage> = sample()
            .into_iter()
            .enumerate()
            .map(|(i, m)| StoredMessage {
                sequence: i32::try_from(i).unwrap(),
                role: m.role,
                content: serde_json::to_string(&m.content).unwrap(),
                created_at: String::new(),
            })
            .collect();

        let text = format_conversation(&stored);
        assert!(text.contains("--- USER ---\nSomeone stole my bike"));
        assert!(text.contains("[TOOL CALL: update_crime_report]"));
        assert!(text.contains("--- TOOL RESULT (for call_1) ---"));
        assert!(text.contains("--- ASSISTANT ---\nWhen did this happen?"));
    }

    #[test]
    fn truncates_by_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("ñññññññññññ", 6), "ñññ...");
    }
}
