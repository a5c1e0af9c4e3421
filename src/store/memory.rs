use anyhow::{Context, Result};
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::{rank_chunks, ChunkStore};
use crate::error::StoreResult;
use crate::models::{Candidate, Chunk, Document, ScoreKind};
use crate::search::keywords::KeywordPattern;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    documents: Vec<Document>,
    chunks: Vec<Chunk>,
}

/// In-memory chunk store with optional JSON snapshot persistence.
pub struct MemoryStore {
    inner: RwLock<Snapshot>,
    persist_path: Option<PathBuf>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// A store that lives only as long as the process.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Snapshot::default()),
            persist_path: None,
        }
    }

    /// Load `archive.json` from `dir`, or start empty and write there on
    /// every mutation.
    pub fn open_or_create(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let persist_path = dir.join("archive.json");

        let snapshot = if persist_path.exists() {
            let data =
                std::fs::read_to_string(&persist_path).context("Failed to read archive snapshot")?;
            serde_json::from_str(&data).context("Failed to parse archive snapshot")?
        } else {
            Snapshot::default()
        };

        Ok(Self {
            inner: RwLock::new(snapshot),
            persist_path: Some(persist_path),
        })
    }

    /// Add or replace a document record.
    pub fn insert_document(&self, document: Document) -> Result<()> {
        let mut inner = self.inner.write();
        inner.documents.retain(|d| d.id != document.id);
        inner.documents.push(document);
        self.persist(&inner)
    }

    /// Append chunks. A chunk with the same (document, ordinal) replaces the
    /// stored one.
    pub fn add_chunks(&self, chunks: Vec<Chunk>) -> Result<()> {
        let mut inner = self.inner.write();
        let incoming: HashSet<(String, u64)> = chunks
            .iter()
            .map(|c| (c.document_id.clone(), c.id))
            .collect();
        inner
            .chunks
            .retain(|c| !incoming.contains(&(c.document_id.clone(), c.id)));
        inner.chunks.extend(chunks);
        self.persist(&inner)
    }

    pub fn chunk_count(&self) -> usize {
        self.inner.read().chunks.len()
    }

    fn persist(&self, snapshot: &Snapshot) -> Result<()> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        let data = serde_json::to_string(snapshot)?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, data).context("Failed to write archive snapshot")?;
        std::fs::rename(&tmp_path, path).context("Failed to replace archive snapshot")?;
        Ok(())
    }
}

impl ChunkStore for MemoryStore {
    fn query_topk(
        &self,
        query: &[f32],
        kind: ScoreKind,
        limit: usize,
        filter: Option<&KeywordPattern>,
    ) -> StoreResult<Vec<Candidate>> {
        let inner = self.inner.read();
        let known: HashSet<&str> = inner.documents.iter().map(|d| d.id.as_str()).collect();

        let eligible = inner.chunks.iter().filter(|c| {
            known.contains(c.document_id.as_str())
                && filter.map_or(true, |pattern| pattern.matches(&c.text))
        });

        Ok(rank_chunks(eligible, query, kind, limit))
    }

    fn query_by_text_pattern(&self, pattern: &KeywordPattern) -> StoreResult<Vec<Chunk>> {
        let inner = self.inner.read();
        Ok(inner
            .chunks
            .iter()
            .filter(|c| pattern.matches(&c.text))
            .cloned()
            .collect())
    }

    fn count_by_text_pattern(&self, pattern: &KeywordPattern) -> StoreResult<usize> {
        let inner = self.inner.read();
        Ok(inner.chunks.iter().filter(|c| pattern.matches(&c.text)).count())
    }

    fn chunks_in_window(&self, document_id: &str, from: u64, to: u64) -> StoreResult<Vec<Chunk>> {
        let inner = self.inner.read();
        let mut window: Vec<Chunk> = inner
            .chunks
            .iter()
            .filter(|c| c.document_id == document_id && c.id >= from && c.id <= to)
            .cloned()
            .collect();
        window.sort_by_key(|c| c.id);
        Ok(window)
    }

    fn first_chunk(&self, document_id: &str) -> StoreResult<Option<Chunk>> {
        let inner = self.inner.read();
        Ok(inner
            .chunks
            .iter()
            .filter(|c| c.document_id == document_id)
            .min_by_key(|c| c.id)
            .cloned())
    }

    fn document(&self, document_id: &str) -> StoreResult<Option<Document>> {
        let inner = self.inner.read();
        Ok(inner.documents.iter().find(|d| d.id == document_id).cloned())
    }

    fn documents_by_filename_fragment(&self, fragment: &str) -> StoreResult<Vec<Document>> {
        let inner = self.inner.read();
        let mut found: Vec<Document> = inner
            .documents
            .iter()
            .filter(|d| d.original_filename.contains(fragment))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    fn random_document(&self) -> StoreResult<Option<Document>> {
        let inner = self.inner.read();
        Ok(inner.documents.choose(&mut rand::thread_rng()).cloned())
    }

    fn document_ids(&self) -> StoreResult<Vec<String>> {
        let inner = self.inner.read();
        let mut ids: Vec<String> = inner.documents.iter().map(|d| d.id.clone()).collect();
        ids.sort();
        Ok(ids)
    }

    fn document_count(&self) -> StoreResult<usize> {
        Ok(self.inner.read().documents.len())
    }
}
