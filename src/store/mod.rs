//! The chunk store seam.
//!
//! Retrieval only ever reads from the store. Two adapters are provided:
//! [`memory::MemoryStore`] for tests and small corpora, and
//! [`sqlite::SqliteStore`] for a file-backed archive.

pub mod memory;
pub mod sqlite;

use crate::error::StoreResult;
use crate::models::{Candidate, Chunk, Document, ScoreKind};
use crate::search::keywords::KeywordPattern;
use crate::search::similarity;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Read-only access to chunks and their documents.
///
/// Implementations must be safe to share across threads; how they serialize
/// access to an underlying connection is their own business.
pub trait ChunkStore: Send + Sync {
    /// Best `limit` chunks for `query` under `kind`, best first. Only chunks
    /// whose document exists are ranked. With `filter`, only chunks whose text
    /// matches it are considered. Ties keep store iteration order.
    fn query_topk(
        &self,
        query: &[f32],
        kind: ScoreKind,
        limit: usize,
        filter: Option<&KeywordPattern>,
    ) -> StoreResult<Vec<Candidate>>;

    /// All chunks whose text matches `pattern`.
    fn query_by_text_pattern(&self, pattern: &KeywordPattern) -> StoreResult<Vec<Chunk>>;

    /// Number of chunks [`query_by_text_pattern`](Self::query_by_text_pattern)
    /// would return, without loading them.
    fn count_by_text_pattern(&self, pattern: &KeywordPattern) -> StoreResult<usize>;

    /// Chunks of `document_id` with `from <= id <= to`, ascending by id.
    fn chunks_in_window(&self, document_id: &str, from: u64, to: u64) -> StoreResult<Vec<Chunk>>;

    /// Lowest-ordinal chunk of a document.
    fn first_chunk(&self, document_id: &str) -> StoreResult<Option<Chunk>>;

    fn document(&self, document_id: &str) -> StoreResult<Option<Document>>;

    /// Documents whose stored filename contains `fragment` (case-sensitive).
    fn documents_by_filename_fragment(&self, fragment: &str) -> StoreResult<Vec<Document>>;

    /// A uniformly random document, or `None` on an empty corpus.
    fn random_document(&self) -> StoreResult<Option<Document>>;

    /// Every document id, ascending.
    fn document_ids(&self) -> StoreResult<Vec<String>>;

    fn document_count(&self) -> StoreResult<usize>;
}

/// Score `chunks` against `query`, sort best-first (stable) and keep `limit`.
pub(crate) fn rank_chunks<'a, I>(
    chunks: I,
    query: &[f32],
    kind: ScoreKind,
    limit: usize,
) -> Vec<Candidate>
where
    I: IntoIterator<Item = &'a Chunk>,
{
    let mut scored: Vec<(f32, &Chunk)> = chunks
        .into_iter()
        .map(|c| (similarity::score(kind, query, &c.embedding), c))
        .collect();

    scored.sort_by(|a, b| kind.best_first(a.0, b.0));
    scored.truncate(limit);

    scored
        .into_iter()
        .map(|(score, c)| Candidate {
            chunk_id: c.id,
            document_id: c.document_id.clone(),
            text: c.text.clone(),
            score,
            score_kind: kind,
        })
        .collect()
}
