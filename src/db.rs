//! Database module for the mashup service
//!
//! Provides persistence for conversations, their messages and the tool
//! calls issued on their behalf.

mod schema;

pub use schema::*;

use crate::state_machine::{ConversationContext, Phase};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),
    #[error("Tool call not pending: {0}")]
    ToolCallNotPending(String),
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Conversation Operations ====================

    /// Create a conversation if it does not exist yet and return it
    pub fn create_conversation(&self, id: &str) -> DbResult<Conversation> {
        {
            let conn = self.conn.lock().unwrap();
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT OR IGNORE INTO conversations (id, phase, context, ready_for_generation, created_at, updated_at)
                 VALUES (?1, ?2, '{}', 0, ?3, ?3)",
                params![id, Phase::Initial.as_str(), now],
            )?;
        }
        self.get_conversation(id)
    }

    /// Get conversation by ID
    pub fn get_conversation(&self, id: &str) -> DbResult<Conversation> {
        self.find_conversation(id)?
            .ok_or_else(|| DbError::ConversationNotFound(id.to_string()))
    }

    /// Get conversation by ID, `None` if it was never created
    pub fn find_conversation(&self, id: &str) -> DbResult<Option<Conversation>> {
        let conn = self.conn.lock().unwrap();
        let raw = conn
            .query_row(
                "SELECT id, phase, context, ready_for_generation, created_at, updated_at
                 FROM conversations WHERE id = ?1",
                params![id],
                |row| {
                    Ok(RawConversation {
                        id: row.get(0)?,
                        phase: row.get(1)?,
                        context: row.get(2)?,
                        ready_for_generation: row.get(3)?,
                        created_at: row.get(4)?,
                        updated_at: row.get(5)?,
                    })
                },
            )
            .optional()?;
        raw.map(RawConversation::decode).transpose()
    }

    /// Insert or replace the mutable fields of a conversation
    pub fn save_conversation(&self, conversation: &Conversation) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        upsert_conversation(&conn, conversation)
    }

    /// Save the conversation and append the turn's messages atomically.
    ///
    /// Either everything is written or nothing is.
    pub fn commit_turn(&self, conversation: &Conversation, messages: &[Message]) -> DbResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        upsert_conversation(&tx, conversation)?;
        for message in messages {
            insert_message(&tx, message)?;
        }
        tx.commit()?;
        Ok(())
    }

    // ==================== Message Operations ====================

    /// Append a single message to a conversation
    pub fn add_message(&self, message: &Message) -> DbResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        insert_message(&tx, message)?;
        tx.execute(
            "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
            params![message.created_at.to_rfc3339(), message.conversation_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Get all messages for a conversation in append order
    #[allow(dead_code)] // Used in tests
    pub fn get_messages(&self, conversation_id: &str) -> DbResult<Vec<Message>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT message_id, conversation_id, role, content, tool_calls, created_at
             FROM messages WHERE conversation_id = ?1 ORDER BY sequence_id ASC",
        )?;

        let rows = stmt.query_map(params![conversation_id], RawMessage::from_row)?;
        rows.map(|raw| raw?.decode()).collect()
    }

    /// Get the last `limit` messages for a conversation, oldest first
    pub fn recent_messages(&self, conversation_id: &str, limit: usize) -> DbResult<Vec<Message>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT message_id, conversation_id, role, content, tool_calls, created_at
             FROM messages WHERE conversation_id = ?1 ORDER BY sequence_id DESC LIMIT ?2",
        )?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![conversation_id, limit], RawMessage::from_row)?;
        let mut messages = rows
            .map(|raw| raw?.decode())
            .collect::<DbResult<Vec<_>>>()?;
        messages.reverse();
        Ok(messages)
    }

    pub fn message_count(&self, conversation_id: &str) -> DbResult<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1",
            params![conversation_id],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    // ==================== Tool Call Operations ====================

    /// Record a dispatched tool call
    pub fn add_tool_call(&self, call: &ToolCall) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO tool_calls (id, conversation_id, query, status, result_summary, error, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                call.id,
                call.conversation_id,
                call.query,
                call.status.as_str(),
                call.result_summary,
                call.error,
                call.started_at.to_rfc3339(),
                call.completed_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Finalise a pending tool call. A call can only be finalised once.
    pub fn finish_tool_call(
        &self,
        id: &str,
        outcome: &ToolCallOutcome,
        completed_at: DateTime<Utc>,
    ) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        let (summary, error) = match outcome {
            ToolCallOutcome::Completed { result_summary } => (Some(result_summary.as_str()), None),
            ToolCallOutcome::Failed { error } => (None, Some(error.as_str())),
        };
        let updated = conn.execute(
            "UPDATE tool_calls SET status = ?1, result_summary = ?2, error = ?3, completed_at = ?4
             WHERE id = ?5 AND status = 'pending'",
            params![
                outcome.status().as_str(),
                summary,
                error,
                completed_at.to_rfc3339(),
                id
            ],
        )?;
        if updated == 0 {
            return Err(DbError::ToolCallNotPending(id.to_string()));
        }
        Ok(())
    }

    /// Get all tool calls for a conversation in dispatch order
    pub fn get_tool_calls(&self, conversation_id: &str) -> DbResult<Vec<ToolCall>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, conversation_id, query, status, result_summary, error, started_at, completed_at
             FROM tool_calls WHERE conversation_id = ?1 ORDER BY started_at ASC, rowid ASC",
        )?;

        let rows = stmt.query_map(params![conversation_id], RawToolCall::from_row)?;
        rows.map(|raw| raw?.decode()).collect()
    }

    pub fn tool_stats(&self, conversation_id: &str) -> DbResult<ToolStats> {
        Ok(ToolStats::from_calls(&self.get_tool_calls(conversation_id)?))
    }

    /// Fail tool calls left pending by a previous process.
    ///
    /// Called on startup: nothing can still be in flight at that point.
    pub fn fail_interrupted_tool_calls(&self) -> DbResult<usize> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE tool_calls SET status = 'failed', error = 'interrupted by restart', completed_at = ?1
             WHERE status = 'pending'",
            params![Utc::now().to_rfc3339()],
        )?;
        Ok(updated)
    }
}

struct RawConversation {
    id: String,
    phase: String,
    context: String,
    ready_for_generation: bool,
    created_at: String,
    updated_at: String,
}

impl RawConversation {
    fn decode(self) -> DbResult<Conversation> {
        let phase: Phase = self
            .phase
            .parse()
            .map_err(|e| DbError::Corrupt(format!("conversation {}: {e}", self.id)))?;
        let context: ConversationContext = serde_json::from_str(&self.context)
            .map_err(|e| DbError::Corrupt(format!("conversation {} context: {e}", self.id)))?;
        Ok(Conversation {
            id: self.id,
            phase,
            context,
            ready_for_generation: self.ready_for_generation,
            created_at: parse_datetime(&self.created_at),
            updated_at: parse_datetime(&self.updated_at),
        })
    }
}

fn upsert_conversation(conn: &Connection, conversation: &Conversation) -> DbResult<()> {
    let context = serde_json::to_string(&conversation.context)?;
    conn.execute(
        "INSERT INTO conversations (id, phase, context, ready_for_generation, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
            phase = excluded.phase,
            context = excluded.context,
            ready_for_generation = excluded.ready_for_generation,
            updated_at = excluded.updated_at",
        params![
            conversation.id,
            conversation.phase.as_str(),
            context,
            conversation.ready_for_generation,
            conversation.created_at.to_rfc3339(),
            conversation.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn insert_message(tx: &Transaction<'_>, message: &Message) -> DbResult<()> {
    let tool_calls = serde_json::to_string(&message.tool_calls)?;
    tx.execute(
        "INSERT INTO messages (message_id, conversation_id, role, content, tool_calls, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            message.id,
            message.conversation_id,
            message.role.as_str(),
            message.content,
            tool_calls,
            message.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

struct RawMessage {
    id: String,
    conversation_id: String,
    role: String,
    content: String,
    tool_calls: String,
    created_at: String,
}

impl RawMessage {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            conversation_id: row.get(1)?,
            role: row.get(2)?,
            content: row.get(3)?,
            tool_calls: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn decode(self) -> DbResult<Message> {
        let role = MessageRole::parse(&self.role).ok_or_else(|| {
            DbError::Corrupt(format!("message {}: unknown role '{}'", self.id, self.role))
        })?;
        let tool_calls = serde_json::from_str(&self.tool_calls)
            .map_err(|e| DbError::Corrupt(format!("message {} tool calls: {e}", self.id)))?;
        Ok(Message {
            id: self.id,
            conversation_id: self.conversation_id,
            role,
            content: self.content,
            tool_calls,
            created_at: parse_datetime(&self.created_at),
        })
    }
}

struct RawToolCall {
    id: String,
    conversation_id: String,
    query: String,
    status: String,
    result_summary: Option<String>,
    error: Option<String>,
    started_at: String,
    completed_at: Option<String>,
}

impl RawToolCall {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            conversation_id: row.get(1)?,
            query: row.get(2)?,
            status: row.get(3)?,
            result_summary: row.get(4)?,
            error: row.get(5)?,
            started_at: row.get(6)?,
            completed_at: row.get(7)?,
        })
    }

    fn decode(self) -> DbResult<ToolCall> {
        let status = ToolCallStatus::parse(&self.status).ok_or_else(|| {
            DbError::Corrupt(format!("tool call {}: unknown status '{}'", self.id, self.status))
        })?;
        Ok(ToolCall {
            id: self.id,
            conversation_id: self.conversation_id,
            query: self.query,
            status,
            result_summary: self.result_summary,
            error: self.error,
            started_at: parse_datetime(&self.started_at),
            completed_at: self.completed_at.as_deref().map(parse_datetime),
        })
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_is_idempotent() {
        let db = Database::open_in_memory().unwrap();

        let conv = db.create_conversation("session-1").unwrap();
        assert_eq!(conv.phase, Phase::Initial);
        assert!(!conv.ready_for_generation);

        let mut updated = conv.clone();
        updated.phase = Phase::GenreExploration;
        db.save_conversation(&updated).unwrap();

        // Creating again must not clobber existing state
        let again = db.create_conversation("session-1").unwrap();
        assert_eq!(again.phase, Phase::GenreExploration);
    }

    #[test]
    fn test_find_missing_conversation() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.find_conversation("nope").unwrap().is_none());
        assert!(matches!(
            db.get_conversation("nope"),
            Err(DbError::ConversationNotFound(_))
        ));
    }

    #[test]
    fn test_commit_turn_persists_conversation_and_messages() {
        let db = Database::open_in_memory().unwrap();
        let mut conv = db.create_conversation("session-1").unwrap();
        conv.context.genres.insert("jazz");
        conv.phase = Phase::GenreExploration;

        let call = ToolCall::pending("session-1", "jazz history");
        db.add_tool_call(&call).unwrap();

        let messages = vec![
            Message::user("session-1", "I like jazz"),
            Message::assistant("session-1", "Great choice!", vec![call.to_ref()]),
        ];
        db.commit_turn(&conv, &messages).unwrap();

        let loaded = db.get_conversation("session-1").unwrap();
        assert_eq!(loaded.phase, Phase::GenreExploration);
        assert!(loaded.context.genres.contains("jazz"));

        let stored = db.get_messages("session-1").unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].role, MessageRole::User);
        assert_eq!(stored[1].tool_calls, vec![call.to_ref()]);
    }

    #[test]
    fn test_commit_turn_is_all_or_nothing() {
        let db = Database::open_in_memory().unwrap();
        let conv = db.create_conversation("session-1").unwrap();
        let first = Message::user("session-1", "hello");
        db.add_message(&first).unwrap();

        let mut changed = conv.clone();
        changed.phase = Phase::CulturalResearch;
        // Reusing a message id violates the unique constraint mid-transaction
        let messages = vec![Message::user("session-1", "new"), first.clone()];
        assert!(db.commit_turn(&changed, &messages).is_err());

        let loaded = db.get_conversation("session-1").unwrap();
        assert_eq!(loaded.phase, Phase::Initial);
        assert_eq!(db.message_count("session-1").unwrap(), 1);
    }

    #[test]
    fn test_recent_messages_oldest_first() {
        let db = Database::open_in_memory().unwrap();
        db.create_conversation("session-1").unwrap();
        for i in 0..5 {
            db.add_message(&Message::user("session-1", format!("m{i}")))
                .unwrap();
        }

        let recent = db.recent_messages("session-1", 3).unwrap();
        let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn test_tool_call_finalised_exactly_once() {
        let db = Database::open_in_memory().unwrap();
        db.create_conversation("session-1").unwrap();
        let call = ToolCall::pending("session-1", "blues origins");
        db.add_tool_call(&call).unwrap();

        let done = ToolCallOutcome::Completed {
            result_summary: "2 results".to_string(),
        };
        db.finish_tool_call(&call.id, &done, Utc::now()).unwrap();

        let again = ToolCallOutcome::Failed {
            error: "late".to_string(),
        };
        assert!(matches!(
            db.finish_tool_call(&call.id, &again, Utc::now()),
            Err(DbError::ToolCallNotPending(_))
        ));

        let calls = db.get_tool_calls("session-1").unwrap();
        assert_eq!(calls[0].status, ToolCallStatus::Completed);
        assert_eq!(calls[0].result_summary.as_deref(), Some("2 results"));
        assert!(calls[0].completed_at.is_some());
    }

    #[test]
    fn test_tool_stats_and_interrupted_calls() {
        let db = Database::open_in_memory().unwrap();
        db.create_conversation("session-1").unwrap();
        let ok = ToolCall::pending("session-1", "a");
        let bad = ToolCall::pending("session-1", "b");
        let stuck = ToolCall::pending("session-1", "c");
        for call in [&ok, &bad, &stuck] {
            db.add_tool_call(call).unwrap();
        }
        db.finish_tool_call(
            &ok.id,
            &ToolCallOutcome::Completed {
                result_summary: "1 result".to_string(),
            },
            Utc::now(),
        )
        .unwrap();
        db.finish_tool_call(
            &bad.id,
            &ToolCallOutcome::Failed {
                error: "timeout".to_string(),
            },
            Utc::now(),
        )
        .unwrap();

        let stats = db.tool_stats("session-1").unwrap();
        assert_eq!((stats.total, stats.successful, stats.failed, stats.pending), (3, 1, 1, 1));

        assert_eq!(db.fail_interrupted_tool_calls().unwrap(), 1);
        let stats = db.tool_stats("session-1").unwrap();
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.pending, 0);
    }

    #[test]
    fn test_corrupt_phase_is_reported() {
        let db = Database::open_in_memory().unwrap();
        db.create_conversation("session-1").unwrap();
        {
            let conn = db.conn.lock().unwrap();
            conn.execute(
                "UPDATE conversations SET phase = 'WHATEVER' WHERE id = 'session-1'",
                [],
            )
            .unwrap();
        }
        assert!(matches!(
            db.get_conversation("session-1"),
            Err(DbError::Corrupt(_))
        ));
    }

    #[test]
    fn test_corrupt_message_and_tool_call_rows_are_reported() {
        let db = Database::open_in_memory().unwrap();
        let conv = db.create_conversation("session-1").unwrap();
        db.commit_turn(&conv, &[Message::user("session-1", "hi")])
            .unwrap();
        db.add_tool_call(&ToolCall::pending("session-1", "jazz")).unwrap();

        let corrupt = |sql: &str| {
            let conn = db.conn.lock().unwrap();
            conn.execute(sql, []).unwrap();
        };

        corrupt("UPDATE messages SET role = 'narrator'");
        assert!(matches!(db.get_messages("session-1"), Err(DbError::Corrupt(_))));
        corrupt("UPDATE messages SET role = 'user', tool_calls = '{not json'");
        assert!(matches!(
            db.recent_messages("session-1", 5),
            Err(DbError::Corrupt(_))
        ));

        corrupt("UPDATE tool_calls SET status = 'exploded'");
        assert!(matches!(db.get_tool_calls("session-1"), Err(DbError::Corrupt(_))));
        assert!(matches!(db.tool_stats("session-1"), Err(DbError::Corrupt(_))));
    }

    #[test]
    fn test_file_backed_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conversations.db");
        {
            let db = Database::open(&path).unwrap();
            let mut conv = db.create_conversation("session-1").unwrap();
            conv.ready_for_generation = true;
            db.commit_turn(&conv, &[Message::user("session-1", "hi")])
                .unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert!(db.get_conversation("session-1").unwrap().ready_for_generation);
        assert_eq!(db.message_count("session-1").unwrap(), 1);
    }
}
