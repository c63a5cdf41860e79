//! SQLite-backed memory store: embedding BLOBs plus an FTS5 shadow table
//! for BM25 keyword search. Sync triggers keep FTS5 up to date.

use anyhow::{Result, anyhow};
use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// A stored memory row.
#[derive(Debug, Clone)]
pub struct MemoryRecord {
    pub id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub created_at: String,
}

#[derive(Clone)]
pub struct MemoryStore {
    conn: Arc<Mutex<Connection>>,
}

impl MemoryStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    /// In-memory store, used in tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS memories (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts USING fts5(
                content,
                content='memories',
                content_rowid='rowid'
            );

            CREATE TRIGGER IF NOT EXISTS memories_ai AFTER INSERT ON memories BEGIN
                INSERT INTO memories_fts(rowid, content) VALUES (new.rowid, new.content);
            END;

            CREATE TRIGGER IF NOT EXISTS memories_ad AFTER DELETE ON memories BEGIN
                INSERT INTO memories_fts(memories_fts, rowid, content)
                    VALUES('delete', old.rowid, old.content);
            END;

            CREATE INDEX IF NOT EXISTS idx_memories_created ON memories(created_at);
            "#,
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn insert(&self, record: &MemoryRecord) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow!("Lock poisoned: {}", e))?;

        conn.execute(
            "INSERT INTO memories (id, content, embedding, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.id,
                record.content,
                vec_to_blob(&record.embedding),
                record.created_at
            ],
        )?;
        Ok(())
    }

    /// All (id, embedding) pairs, for brute-force vector search.
    /// Rows stored without an embedding are skipped.
    pub fn embeddings(&self) -> Result<Vec<(String, Vec<f32>)>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow!("Lock poisoned: {}", e))?;

        let mut stmt = conn.prepare("SELECT id, embedding FROM memories")?;
        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let blob: Vec<u8> = row.get(1)?;
            Ok((id, blob_to_vec(&blob)))
        })?;

        let mut results = Vec::new();
        for row in rows {
            let (id, embedding) = row?;
            if !embedding.is_empty() {
                results.push((id, embedding));
            }
        }
        Ok(results)
    }

    pub fn contents_by_ids(&self, ids: &[String]) -> Result<Vec<String>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow!("Lock poisoned: {}", e))?;

        // Fetch one by one to preserve the ranked order of `ids`
        let mut stmt = conn.prepare("SELECT content FROM memories WHERE id = ?1")?;
        let mut contents = Vec::with_capacity(ids.len());
        for id in ids {
            if let Ok(content) = stmt.query_row(params![id], |row| row.get::<_, String>(0)) {
                contents.push(content);
            }
        }
        Ok(contents)
    }

    /// BM25 keyword search via FTS5. Scores are negative (more negative = more
    /// relevant), so ascending order is best-first.
    pub fn search_bm25(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let escaped = fts_query_any(query);
        if escaped.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow!("Lock poisoned: {}", e))?;

        let mut stmt = conn.prepare(
            r#"
            SELECT m.content
            FROM memories_fts fts
            JOIN memories m ON fts.rowid = m.rowid
            WHERE memories_fts MATCH ?1
            ORDER BY bm25(memories_fts)
            LIMIT ?2
            "#,
        )?;

        let rows = stmt.query_map(params![escaped, limit as i64], |row| row.get(0))?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow!("Lock poisoned: {}", e))?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Delete every stored memory. The FTS table follows via triggers.
    pub fn clear(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow!("Lock poisoned: {}", e))?;
        conn.execute("DELETE FROM memories", [])?;
        Ok(())
    }
}

/// Convert f32 vector to bytes for SQLite BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vec.len() * 4);
    for v in vec {
        blob.extend_from_slice(&v.to_le_bytes());
    }
    blob
}

/// Convert SQLite BLOB bytes back to an f32 vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Build an any-term FTS5 query: each word quoted (so punctuation cannot
/// break the syntax) and OR-joined, letting BM25 rank partial matches.
fn fts_query_any(query: &str) -> String {
    query
        .split_whitespace()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" OR ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: &str, content: &str, embedding: Vec<f32>) -> MemoryRecord {
        MemoryRecord {
            id: id.to_string(),
            content: content.to_string(),
            embedding,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn blob_roundtrip() {
        let original: Vec<f32> = (0..384).map(|i| i as f32 / 384.0).collect();
        let decoded = blob_to_vec(&vec_to_blob(&original));
        assert_eq!(decoded.len(), 384);
        for (a, b) in original.iter().zip(decoded.iter()) {
            assert!((a - b).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn insert_and_count() {
        let store = MemoryStore::open_in_memory().unwrap();
        assert_eq!(store.count().unwrap(), 0);

        store
            .insert(&record("mem-1", "User: hi\nAI: hello", vec![0.1; 384]))
            .unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn embeddings_skip_empty_blobs() {
        let store = MemoryStore::open_in_memory().unwrap();
        store
            .insert(&record("mem-1", "with vector", vec![0.5; 4]))
            .unwrap();
        store.insert(&record("mem-2", "no vector", vec![])).unwrap();

        let embeddings = store.embeddings().unwrap();
        assert_eq!(embeddings.len(), 1);
        assert_eq!(embeddings[0].0, "mem-1");
    }

    #[test]
    fn bm25_finds_inserted_memory() {
        let store = MemoryStore::open_in_memory().unwrap();
        store
            .insert(&record(
                "mem-1",
                "User: my dog is a golden retriever\nAI: noted",
                vec![],
            ))
            .unwrap();

        let results = store.search_bm25("golden retriever", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].contains("golden retriever"));

        assert!(store.search_bm25("quantum physics", 10).unwrap().is_empty());
    }

    #[test]
    fn bm25_survives_punctuation_in_query() {
        let store = MemoryStore::open_in_memory().unwrap();
        store
            .insert(&record("mem-1", "the \"answer\" is 42", vec![]))
            .unwrap();

        // Quotes and question marks must not break FTS5 syntax
        let results = store.search_bm25("what is the \"answer\"?", 10).unwrap();
        assert_eq!(results.len(), 1);

        assert!(store.search_bm25("", 10).unwrap().is_empty());
    }

    #[test]
    fn bm25_matches_any_term() {
        let store = MemoryStore::open_in_memory().unwrap();
        store
            .insert(&record("mem-1", "User: my dog is named Max\nAI: noted", vec![]))
            .unwrap();

        // A natural-language question shares only some terms with the memory
        let results = store.search_bm25("what is my dog called?", 10).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn contents_preserve_ranked_order() {
        let store = MemoryStore::open_in_memory().unwrap();
        store.insert(&record("a", "first", vec![])).unwrap();
        store.insert(&record("b", "second", vec![])).unwrap();

        let contents = store
            .contents_by_ids(&["b".to_string(), "a".to_string()])
            .unwrap();
        assert_eq!(contents, vec!["second".to_string(), "first".to_string()]);
    }

    #[test]
    fn clear_empties_store_and_fts() {
        let store = MemoryStore::open_in_memory().unwrap();
        store
            .insert(&record("mem-1", "something searchable", vec![]))
            .unwrap();

        store.clear().unwrap();

        assert_eq!(store.count().unwrap(), 0);
        assert!(store.search_bm25("searchable", 10).unwrap().is_empty());
    }
}
