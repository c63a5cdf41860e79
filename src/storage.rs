//! Chat history persistence: sessions and messages in SQLite.

use anyhow::{Result, anyhow};
use chrono::Utc;
use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const NEW_CHAT_TITLE: &str = "New Chat";
const TITLE_MAX_CHARS: usize = 30;

#[derive(Clone)]
pub struct ChatStorage {
    conn: Arc<Mutex<Connection>>,
}

/// A sidebar entry: one saved conversation.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub role: String,
    pub content: String,
}

impl ChatStorage {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// In-memory store, used in tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                FOREIGN KEY (session_id) REFERENCES sessions(id)
            );

            CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id);
            "#,
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Start a fresh conversation, returning its id.
    pub fn create_session(&self) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now().to_rfc3339();

        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow!("Lock poisoned: {}", e))?;
        conn.execute(
            "INSERT INTO sessions (id, title, created_at) VALUES (?1, ?2, ?3)",
            params![id, NEW_CHAT_TITLE, created_at],
        )?;

        Ok(id)
    }

    /// Append a message to a session. The first user message replaces the
    /// placeholder title with a preview of its content.
    pub fn add_message(&self, session_id: &str, role: &str, content: &str) -> Result<()> {
        let timestamp = Utc::now().to_rfc3339();

        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow!("Lock poisoned: {}", e))?;
        conn.execute(
            "INSERT INTO messages (session_id, role, content, timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![session_id, role, content, timestamp],
        )?;

        if role == "user" {
            let current: Option<String> = conn
                .query_row(
                    "SELECT title FROM sessions WHERE id = ?1",
                    params![session_id],
                    |row| row.get(0),
                )
                .ok();

            if current.as_deref() == Some(NEW_CHAT_TITLE) {
                conn.execute(
                    "UPDATE sessions SET title = ?1 WHERE id = ?2",
                    params![title_preview(content), session_id],
                )?;
            }
        }

        Ok(())
    }

    /// Sessions newest-first, for the sidebar.
    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow!("Lock poisoned: {}", e))?;

        let mut stmt =
            conn.prepare(
                "SELECT id, title, created_at FROM sessions ORDER BY created_at DESC, rowid DESC",
            )?;
        let rows = stmt.query_map([], |row| {
            Ok(SessionSummary {
                id: row.get(0)?,
                title: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?);
        }
        Ok(sessions)
    }

    /// All messages of a session in insert order.
    pub fn session_messages(&self, session_id: &str) -> Result<Vec<StoredMessage>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow!("Lock poisoned: {}", e))?;

        let mut stmt = conn
            .prepare("SELECT role, content FROM messages WHERE session_id = ?1 ORDER BY id ASC")?;
        let rows = stmt.query_map(params![session_id], |row| {
            Ok(StoredMessage {
                role: row.get(0)?,
                content: row.get(1)?,
            })
        })?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    pub fn session_title(&self, session_id: &str) -> Result<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow!("Lock poisoned: {}", e))?;

        let title = conn
            .query_row(
                "SELECT title FROM sessions WHERE id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .ok();
        Ok(title)
    }

    /// Delete a session and its messages.
    pub fn delete_session(&self, session_id: &str) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow!("Lock poisoned: {}", e))?;

        conn.execute(
            "DELETE FROM messages WHERE session_id = ?1",
            params![session_id],
        )?;
        conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;
        Ok(())
    }
}

/// First 30 characters of the message, with an ellipsis when truncated.
fn title_preview(content: &str) -> String {
    let preview: String = content.chars().take(TITLE_MAX_CHARS).collect();
    if content.chars().count() > TITLE_MAX_CHARS {
        format!("{}...", preview)
    } else {
        preview
    }
}
