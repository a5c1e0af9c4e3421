use anyhow::{Context, Result};
use tracing::Instrument;

use crate::config::Config;
use crate::llm::embeddings::{Embedder, HttpEmbedder};
use crate::models::{
    EntryKind, ScoreKind, SearchMethod, SingleAnswer, TopDocuments, NO_ADDITIONAL_DESCRIPTION,
};
use crate::search::describe::describe;
use crate::search::keywords::extract_important_words;
use crate::search::resolver::UrlResolver;
use crate::search::{dedup, ranker};
use crate::store::{ChunkStore, SqliteStore};

/// Owns one embedder and one store connection. Queries never mutate either,
/// so a pipeline can serve any number of sequential queries; give each
/// concurrent worker its own.
pub struct RetrievalPipeline<E, S> {
    embedder: E,
    store: S,
    config: Config,
}

impl RetrievalPipeline<HttpEmbedder, SqliteStore> {
    /// HTTP embedder plus the SQLite archive named by `config.store`.
    pub fn from_config(config: Config) -> Result<Self> {
        let embedder =
            HttpEmbedder::new(config.llm.clone()).context("Failed to create embedder")?;
        let store = SqliteStore::open(&config.store).context("Failed to open chunk store")?;
        tracing::info!(
            provider = %config.llm.provider,
            store = %config.store.path.display(),
            "Retrieval pipeline ready"
        );
        Ok(Self::new(embedder, store, config))
    }
}

impl<E: Embedder, S: ChunkStore> RetrievalPipeline<E, S> {
    pub fn new(embedder: E, store: S, config: Config) -> Self {
        Self {
            embedder,
            store,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn resolver(&self) -> UrlResolver<'_> {
        UrlResolver::new(&self.store, &self.config.archive_base_url)
    }

    /// Best single chunk and its source URL. For [`SearchMethod::AnnSearch`]
    /// the text is the expanded context of the top hit.
    pub async fn answer(&self, query: &str, method: SearchMethod) -> Option<SingleAnswer> {
        let span = tracing::info_span!("answer", query = %self.query_label(query), %method);
        async {
            let embedding = self.embed(query).await?;
            let resolver = self.resolver();

            let kind = match method {
                SearchMethod::CosineSimilarity => ScoreKind::CosineSimilarity,
                SearchMethod::CosineDistance => ScoreKind::CosineDistance,
                SearchMethod::EuclideanSearch => ScoreKind::EuclideanDistance,
                SearchMethod::AnnSearch => {
                    let ranked = ranker::ann_search(&resolver, &embedding, 1, &self.config.retrieval);
                    let hit = ranked.hits.into_iter().next()?;
                    return Some(SingleAnswer {
                        text: hit.context,
                        source_url: hit.source_url,
                        score: hit.score,
                        score_kind: ScoreKind::CosineSimilarity,
                    });
                }
            };
            ranker::best_match(&resolver, &embedding, kind)
        }
        .instrument(span)
        .await
    }

    /// [`answer`](Self::answer) with the method given by name. Unknown names
    /// are logged and produce no answer.
    pub async fn answer_by_name(&self, query: &str, method: &str) -> Option<SingleAnswer> {
        match method.parse::<SearchMethod>() {
            Ok(method) => self.answer(query, method).await,
            Err(e) => {
                tracing::warn!("{e}");
                None
            }
        }
    }

    /// [`top_documents`](Self::top_documents) with the configured `top_n`.
    pub async fn search(&self, query: &str) -> TopDocuments {
        self.top_documents(query, self.config.retrieval.top_n).await
    }

    /// Exactly `top_n` entries (fewer only when the corpus runs out of
    /// distinct documents), each with a description.
    ///
    /// A query with no important words, or one that cannot be embedded,
    /// yields `top_n` placeholder entries.
    pub async fn top_documents(&self, query: &str, top_n: usize) -> TopDocuments {
        let span = tracing::info_span!("top_documents", query = %self.query_label(query), top_n);
        async {
            let words = extract_important_words(query);
            if words.is_empty() {
                tracing::info!("No important words, returning placeholders");
                return TopDocuments::placeholders(top_n);
            }

            let Some(embedding) = self.embed(query).await else {
                return TopDocuments::placeholders(top_n);
            };

            let retrieval = &self.config.retrieval;
            let resolver = self.resolver();
            let hits = ranker::keyword_then_similarity_hits(
                &resolver,
                &words,
                &embedding,
                retrieval.keyword_stage_limit,
                retrieval,
            );

            let mut result = dedup::dedupe_and_pad(
                &resolver,
                &hits,
                top_n,
                retrieval.backfill_max_attempts,
            );

            for entry in &mut result.entries {
                match entry.kind {
                    EntryKind::Match => {
                        let description = describe(
                            &resolver,
                            &entry.source_url,
                            &retrieval.document_extensions,
                            retrieval.description_max_chars,
                        );
                        entry.description = Some(description.to_string());
                    }
                    EntryKind::Filler => {
                        entry.description = Some(NO_ADDITIONAL_DESCRIPTION.to_string());
                    }
                    EntryKind::Placeholder => {}
                }
            }
            result.entries.truncate(top_n);

            tracing::info!(
                entries = result.entries.len(),
                exhausted = result.exhausted,
                "Query complete"
            );
            result
        }
        .instrument(span)
        .await
    }

    async fn embed(&self, query: &str) -> Option<Vec<f32>> {
        match self.embedder.embed(query).await {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                tracing::error!(stage = "embed", "{e}");
                None
            }
        }
    }

    /// What the logs show for a query: a short content hash unless raw query
    /// logging is switched on.
    fn query_label(&self, query: &str) -> String {
        if self.config.log_query_text {
            query.to_string()
        } else {
            query_hash(query)
        }
    }
}

/// First 12 hex digits of the query's blake3 hash.
pub fn query_hash(query: &str) -> String {
    let hash = blake3::hash(query.as_bytes()).to_hex();
    hash.as_str()[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmbeddingError;
    use crate::models::{Chunk, Document, NO_CONTENT};
    use crate::store::MemoryStore;

    struct FixedEmbedder(Option<Vec<f32>>);

    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            self.0.clone().ok_or(EmbeddingError::Empty)
        }
    }

    fn config() -> Config {
        Config {
            archive_base_url: "https://archive.example.org/".to_string(),
            ..Config::default()
        }
    }

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_document(Document {
                id: "d1".to_string(),
                original_filename: "Nonerent.pdf".to_string(),
            })
            .unwrap();
        store
            .add_chunks(vec![Chunk {
                id: 0,
                document_id: "d1".to_string(),
                text: "rent control notes".to_string(),
                embedding: vec![1.0, 0.0],
            }])
            .unwrap();
        store
    }

    #[test]
    fn test_query_hash_is_stable_and_short() {
        assert_eq!(query_hash("rent control"), query_hash("rent control"));
        assert_ne!(query_hash("rent control"), query_hash("rent"));
        assert_eq!(query_hash("x").len(), 12);
    }

    #[tokio::test]
    async fn test_answer_each_method() {
        let pipeline = RetrievalPipeline::new(FixedEmbedder(Some(vec![1.0, 0.0])), store(), config());
        for method in [
            SearchMethod::CosineSimilarity,
            SearchMethod::CosineDistance,
            SearchMethod::EuclideanSearch,
            SearchMethod::AnnSearch,
        ] {
            let answer = pipeline.answer("rent control", method).await.unwrap();
            assert_eq!(answer.text, "rent control notes");
            assert_eq!(answer.source_url, "https://archive.example.org/rent");
        }
    }

    #[tokio::test]
    async fn test_answer_by_unknown_name() {
        let pipeline = RetrievalPipeline::new(FixedEmbedder(Some(vec![1.0, 0.0])), store(), config());
        assert!(pipeline.answer_by_name("rent", "bm25").await.is_none());
        assert!(pipeline.answer_by_name("rent", "ann_search").await.is_some());
    }

    #[tokio::test]
    async fn test_failed_embedding_gives_placeholders() {
        let pipeline = RetrievalPipeline::new(FixedEmbedder(None), store(), config());
        assert!(pipeline.answer("rent", SearchMethod::AnnSearch).await.is_none());

        let result = pipeline.top_documents("rent control", 3).await;
        assert_eq!(result.entries.len(), 3);
        assert!(result.entries.iter().all(|e| e.context == NO_CONTENT));
    }

    #[tokio::test]
    async fn test_stop_words_only_gives_placeholders() {
        let pipeline = RetrievalPipeline::new(FixedEmbedder(Some(vec![1.0, 0.0])), store(), config());
        let result = pipeline.top_documents("what is the", 5).await;
        assert_eq!(result, TopDocuments::placeholders(5));
    }

    #[tokio::test]
    async fn test_top_documents_describes_matches() {
        let pipeline = RetrievalPipeline::new(FixedEmbedder(Some(vec![1.0, 0.0])), store(), config());
        let result = pipeline.top_documents("rent control", 3).await;

        assert_eq!(result.entries.len(), 1);
        assert!(result.exhausted);
        let entry = &result.entries[0];
        assert_eq!(entry.kind, EntryKind::Match);
        assert_eq!(entry.description.as_deref(), Some("rent control notes"));
    }
}
