//! SQLite-backed chunk store.
//!
//! Every statement binds its inputs as parameters; keyword patterns go in as
//! LIKE parameters with `\` as the escape character. Embeddings are stored as
//! little-endian f32 BLOBs and scored in Rust.
//!
//! SQLite's own `lower()` folds ASCII only, so each connection gets a
//! `unicode_lower()` scalar function and keyword patterns are matched against
//! its output.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;

use super::{rank_chunks, ChunkStore};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::models::{Candidate, Chunk, Document, ScoreKind};
use crate::search::keywords::KeywordPattern;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    original_filename TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS chunks (
    document_id TEXT NOT NULL,
    id INTEGER NOT NULL,
    chunk_text TEXT NOT NULL,
    embedding BLOB NOT NULL,
    PRIMARY KEY (document_id, id)
);
CREATE INDEX IF NOT EXISTS documents_filename_idx ON documents(original_filename);
";

/// Chunk store over a single SQLite connection. Access is serialized.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `config.path`.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let path: &Path = &config.path;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open chunk store at {}", path.display()))?;
        Self::init(conn, config.busy_timeout_ms)
    }

    /// Private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory chunk store")?;
        Self::init(conn, StoreConfig::default().busy_timeout_ms)
    }

    fn init(conn: Connection, busy_timeout_ms: u64) -> Result<Self> {
        conn.busy_timeout(Duration::from_millis(busy_timeout_ms))
            .context("Failed to set busy_timeout")?;
        conn.create_scalar_function(
            "unicode_lower",
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| Ok(ctx.get::<String>(0)?.to_lowercase()),
        )
        .context("Failed to register unicode_lower")?;
        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to create chunk store schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn insert_document(&self, document: &Document) -> Result<()> {
        self.conn
            .lock()
            .execute(
                "INSERT OR REPLACE INTO documents (id, original_filename) VALUES (?1, ?2)",
                params![document.id, document.original_filename],
            )
            .context("Failed to insert document")?;
        Ok(())
    }

    pub fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO chunks (document_id, id, chunk_text, embedding)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for chunk in chunks {
                let id = i64::try_from(chunk.id).context("chunk id out of range")?;
                stmt.execute(params![
                    chunk.document_id,
                    id,
                    chunk.text,
                    encode_embedding(&chunk.embedding)
                ])?;
            }
        }
        tx.commit().context("Failed to commit chunks")?;
        Ok(())
    }
}

impl ChunkStore for SqliteStore {
    fn query_topk(
        &self,
        query: &[f32],
        kind: ScoreKind,
        limit: usize,
        filter: Option<&KeywordPattern>,
    ) -> StoreResult<Vec<Candidate>> {
        let patterns = filter.map(KeywordPattern::like_patterns).unwrap_or_default();
        let mut sql = String::from(
            "SELECT c.document_id, c.id, c.chunk_text, c.embedding
             FROM chunks AS c
             JOIN documents AS d ON d.id = c.document_id",
        );
        append_like_clauses(&mut sql, patterns.len());
        sql.push_str(" ORDER BY c.rowid");

        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| StoreError::query("similarity_scan", e))?;
        let rows = stmt
            .query_map(params_from_iter(patterns.iter()), read_chunk)
            .map_err(|e| StoreError::query("similarity_scan", e))?;

        let chunks = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| StoreError::query("similarity_scan", e))?;
        Ok(rank_chunks(&chunks, query, kind, limit))
    }

    fn query_by_text_pattern(&self, pattern: &KeywordPattern) -> StoreResult<Vec<Chunk>> {
        let patterns = pattern.like_patterns();
        let mut sql = String::from(
            "SELECT c.document_id, c.id, c.chunk_text, c.embedding FROM chunks AS c",
        );
        append_like_clauses(&mut sql, patterns.len());
        sql.push_str(" ORDER BY c.rowid");

        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| StoreError::query("keyword_filter", e))?;
        let rows = stmt
            .query_map(params_from_iter(patterns.iter()), read_chunk)
            .map_err(|e| StoreError::query("keyword_filter", e))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| StoreError::query("keyword_filter", e))
    }

    fn count_by_text_pattern(&self, pattern: &KeywordPattern) -> StoreResult<usize> {
        let patterns = pattern.like_patterns();
        let mut sql = String::from("SELECT COUNT(*) FROM chunks AS c");
        append_like_clauses(&mut sql, patterns.len());

        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row(&sql, params_from_iter(patterns.iter()), |row| row.get(0))
            .map_err(|e| StoreError::query("keyword_filter", e))?;
        usize::try_from(count).map_err(|_| StoreError::InvalidValue(format!("count {count}")))
    }

    fn chunks_in_window(&self, document_id: &str, from: u64, to: u64) -> StoreResult<Vec<Chunk>> {
        let from = i64::try_from(from).unwrap_or(i64::MAX);
        let to = i64::try_from(to).unwrap_or(i64::MAX);

        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT document_id, id, chunk_text, embedding
                 FROM chunks
                 WHERE document_id = ?1 AND id >= ?2 AND id <= ?3
                 ORDER BY id",
            )
            .map_err(|e| StoreError::query("context_window", e))?;
        let rows = stmt
            .query_map(params![document_id, from, to], read_chunk)
            .map_err(|e| StoreError::query("context_window", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| StoreError::query("context_window", e))
    }

    fn first_chunk(&self, document_id: &str) -> StoreResult<Option<Chunk>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT document_id, id, chunk_text, embedding
             FROM chunks
             WHERE document_id = ?1
             ORDER BY id ASC
             LIMIT 1",
            params![document_id],
            read_chunk,
        )
        .optional()
        .map_err(|e| StoreError::query("first_chunk", e))
    }

    fn document(&self, document_id: &str) -> StoreResult<Option<Document>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, original_filename FROM documents WHERE id = ?1",
            params![document_id],
            read_document,
        )
        .optional()
        .map_err(|e| StoreError::query("document_lookup", e))
    }

    fn documents_by_filename_fragment(&self, fragment: &str) -> StoreResult<Vec<Document>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, original_filename FROM documents
                 WHERE instr(original_filename, ?1) > 0
                 ORDER BY id",
            )
            .map_err(|e| StoreError::query("filename_lookup", e))?;
        let rows = stmt
            .query_map(params![fragment], read_document)
            .map_err(|e| StoreError::query("filename_lookup", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| StoreError::query("filename_lookup", e))
    }

    fn random_document(&self) -> StoreResult<Option<Document>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, original_filename FROM documents ORDER BY random() LIMIT 1",
            [],
            read_document,
        )
        .optional()
        .map_err(|e| StoreError::query("random_document", e))
    }

    fn document_ids(&self) -> StoreResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT id FROM documents ORDER BY id")
            .map_err(|e| StoreError::query("document_ids", e))?;
        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| StoreError::query("document_ids", e))?;
        rows.collect::<rusqlite::Result<Vec<String>>>()
            .map_err(|e| StoreError::query("document_ids", e))
    }

    fn document_count(&self) -> StoreResult<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .map_err(|e| StoreError::query("document_count", e))?;
        usize::try_from(count).map_err(|_| StoreError::InvalidValue(format!("count {count}")))
    }
}

/// Adds `n` ANDed `LIKE ?k ESCAPE '\'` conditions on the chunk text.
fn append_like_clauses(sql: &mut String, n: usize) {
    for i in 0..n {
        sql.push_str(if i == 0 { " WHERE " } else { " AND " });
        sql.push_str(&format!(
            "unicode_lower(c.chunk_text) LIKE ?{} ESCAPE '\\'",
            i + 1
        ));
    }
}

fn read_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chunk> {
    let document_id: String = row.get(0)?;
    let id: i64 = row.get(1)?;
    let text: String = row.get(2)?;
    let blob: Vec<u8> = row.get(3)?;
    Ok(Chunk {
        id: u64::try_from(id).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(1, id))?,
        document_id,
        text,
        embedding: decode_embedding(&blob),
    })
}

fn read_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        original_filename: row.get(1)?,
    })
}

fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(std::mem::size_of_val(vector));
    for &value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// A malformed blob decodes to an empty vector, which scores as incomparable.
fn decode_embedding(blob: &[u8]) -> Vec<f32> {
    if blob.len() % 4 != 0 {
        tracing::warn!(len = blob.len(), "Embedding blob is not a whole number of f32s");
        return Vec::new();
    }
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::keywords::KeywordMatch;

    fn seeded() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_document(&Document {
                id: "d1".to_string(),
                original_filename: "None/archive/o'brien%20notes.pdf".to_string(),
            })
            .unwrap();
        let mut chunks: Vec<Chunk> = (0..6)
            .map(|i| Chunk {
                id: i,
                document_id: "d1".to_string(),
                text: format!("chunk {i} about 100% rent_control"),
                embedding: vec![i as f32, 1.0],
            })
            .collect();
        chunks.push(Chunk {
            id: 6,
            document_id: "d1".to_string(),
            text: "rentxcontrol".to_string(),
            embedding: vec![6.0, 1.0],
        });
        store.insert_chunks(&chunks).unwrap();
        store
    }

    #[test]
    fn test_embedding_blob_round_trip() {
        let v = vec![0.25, -1.5, 3.0];
        assert_eq!(decode_embedding(&encode_embedding(&v)), v);
        assert!(decode_embedding(&[1, 2, 3]).is_empty());
    }

    #[test]
    fn test_window_is_ordered_and_bounded() {
        let store = seeded();
        let window = store.chunks_in_window("d1", 2, 4).unwrap();
        let ids: Vec<u64> = window.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 3, 4]);
    }

    #[test]
    fn test_quote_in_filename_is_bound_not_spliced() {
        let store = seeded();
        let docs = store.documents_by_filename_fragment("o'brien").unwrap();
        assert_eq!(docs.len(), 1);
        assert!(store.document("x' OR '1'='1").unwrap().is_none());
    }

    #[test]
    fn test_like_wildcards_in_keywords_are_literal() {
        let store = seeded();
        let words = vec!["rent_control".to_string()];
        let pattern = KeywordPattern::new(&words, KeywordMatch::Ordered).unwrap();
        let hits = store.query_by_text_pattern(&pattern).unwrap();
        assert_eq!(hits.len(), 6);
        assert!(hits.iter().all(|c| c.id != 6));

        let words = vec!["100%".to_string()];
        let pattern = KeywordPattern::new(&words, KeywordMatch::Ordered).unwrap();
        assert_eq!(store.query_by_text_pattern(&pattern).unwrap().len(), 6);
    }

    #[test]
    fn test_topk_with_filter() {
        let store = seeded();
        let words = vec!["chunk".to_string(), "3".to_string()];
        let pattern = KeywordPattern::new(&words, KeywordMatch::Ordered).unwrap();
        let hits = store
            .query_topk(&[1.0, 0.0], ScoreKind::CosineSimilarity, 5, Some(&pattern))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, 3);
    }

    #[test]
    fn test_first_chunk_and_counts() {
        let store = seeded();
        assert_eq!(store.first_chunk("d1").unwrap().unwrap().id, 0);
        assert!(store.first_chunk("missing").unwrap().is_none());
        assert_eq!(store.document_count().unwrap(), 1);
        assert_eq!(store.document_ids().unwrap(), vec!["d1".to_string()]);
        assert!(store.random_document().unwrap().is_some());
    }

    #[test]
    fn test_count_by_text_pattern_matches_query() {
        let store = seeded();
        let words = vec!["rent_control".to_string()];
        let pattern = KeywordPattern::new(&words, KeywordMatch::Ordered).unwrap();
        assert_eq!(store.count_by_text_pattern(&pattern).unwrap(), 6);

        let words = vec!["zoning".to_string()];
        let pattern = KeywordPattern::new(&words, KeywordMatch::Ordered).unwrap();
        assert_eq!(store.count_by_text_pattern(&pattern).unwrap(), 0);
    }

    #[test]
    fn test_keyword_match_folds_non_ascii_case() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_document(&Document {
                id: "d1".to_string(),
                original_filename: "miete.pdf".to_string(),
            })
            .unwrap();
        store
            .insert_chunks(&[Chunk {
                id: 0,
                document_id: "d1".to_string(),
                text: "Über Mietpreisbremse".to_string(),
                embedding: vec![1.0, 0.0],
            }])
            .unwrap();

        let words = vec!["über".to_string(), "mietpreisbremse".to_string()];
        let pattern = KeywordPattern::new(&words, KeywordMatch::Ordered).unwrap();
        assert_eq!(store.query_by_text_pattern(&pattern).unwrap().len(), 1);
        assert_eq!(store.count_by_text_pattern(&pattern).unwrap(), 1);
        let hits = store
            .query_topk(&[1.0, 0.0], ScoreKind::CosineSimilarity, 5, Some(&pattern))
            .unwrap();
        assert_eq!(hits.len(), 1);
    }
}
