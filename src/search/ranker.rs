use crate::config::RetrievalConfig;
use crate::models::{Candidate, ContextHit, RankedHits, ScoreKind, SingleAnswer};
use crate::search::context;
use crate::search::describe::describe;
use crate::search::keywords::KeywordPattern;
use crate::search::resolver::UrlResolver;

/// Single best chunk under `kind`, without context expansion.
///
/// Store faults are logged and yield `None`, as does a candidate whose
/// document cannot be resolved to any URL.
pub fn best_match(
    resolver: &UrlResolver<'_>,
    query: &[f32],
    kind: ScoreKind,
) -> Option<SingleAnswer> {
    let top = match resolver.store().query_topk(query, kind, 1, None) {
        Ok(mut candidates) if !candidates.is_empty() => candidates.swap_remove(0),
        Ok(_) => {
            tracing::info!(stage = "best_match", ?kind, "No chunks retrieved");
            return None;
        }
        Err(e) => {
            tracing::error!(stage = "best_match", ?kind, "{e}");
            return None;
        }
    };

    let source = resolver.resolve(&top.document_id)?;
    Some(SingleAnswer {
        text: top.text,
        source_url: source.url,
        score: top.score,
        score_kind: top.score_kind,
    })
}

/// Top `top_n` chunks by cosine similarity, each expanded to its context
/// window and resolved to a URL.
pub fn ann_search(
    resolver: &UrlResolver<'_>,
    query: &[f32],
    top_n: usize,
    config: &RetrievalConfig,
) -> RankedHits {
    ann_stage(resolver, query, top_n, top_n, config)
}

/// Two-stage hybrid: keep chunks matching the keyword pattern, then rank
/// only those by cosine similarity. Falls back to [`ann_search`] when the
/// keyword stage matches nothing.
pub fn keyword_then_similarity(
    resolver: &UrlResolver<'_>,
    important_words: &[String],
    query: &[f32],
    top_n: usize,
    config: &RetrievalConfig,
) -> RankedHits {
    keyword_stage(resolver, important_words, query, top_n, top_n, config)
}

/// [`keyword_then_similarity`] without descriptions, for callers that
/// describe the final entries themselves.
pub fn keyword_then_similarity_hits(
    resolver: &UrlResolver<'_>,
    important_words: &[String],
    query: &[f32],
    top_n: usize,
    config: &RetrievalConfig,
) -> Vec<ContextHit> {
    keyword_stage(resolver, important_words, query, top_n, 0, config).hits
}

fn ann_stage(
    resolver: &UrlResolver<'_>,
    query: &[f32],
    top_n: usize,
    describe_limit: usize,
    config: &RetrievalConfig,
) -> RankedHits {
    match resolver
        .store()
        .query_topk(query, ScoreKind::CosineSimilarity, top_n, None)
    {
        Ok(candidates) => collect_hits(resolver, candidates, describe_limit, config),
        Err(e) => {
            tracing::error!(stage = "ann_search", "{e}");
            RankedHits::default()
        }
    }
}

fn keyword_stage(
    resolver: &UrlResolver<'_>,
    important_words: &[String],
    query: &[f32],
    top_n: usize,
    describe_limit: usize,
    config: &RetrievalConfig,
) -> RankedHits {
    let Some(pattern) = KeywordPattern::new(important_words, config.keyword_match) else {
        return ann_stage(resolver, query, top_n, describe_limit, config);
    };

    let store = resolver.store();
    let matched = match store.count_by_text_pattern(&pattern) {
        Ok(count) => count,
        Err(e) => {
            tracing::error!(stage = "keyword_filter", "{e}");
            return RankedHits::default();
        }
    };

    if matched == 0 {
        tracing::info!(
            stage = "keyword_filter",
            words = important_words.len(),
            "No keyword matches, falling back to ann_search"
        );
        return ann_stage(resolver, query, top_n, describe_limit, config);
    }
    tracing::debug!(stage = "keyword_filter", matched, "Keyword stage done");

    match store.query_topk(query, ScoreKind::CosineSimilarity, top_n, Some(&pattern)) {
        // Stage-one matches whose document is gone leave nothing to rank.
        Ok(candidates) if candidates.is_empty() => {
            ann_stage(resolver, query, top_n, describe_limit, config)
        }
        Ok(candidates) => collect_hits(resolver, candidates, describe_limit, config),
        Err(e) => {
            tracing::error!(stage = "keyword_rerank", "{e}");
            RankedHits::default()
        }
    }
}

/// Expand and resolve every candidate. At most `describe_limit` hits on
/// document files get a description.
fn collect_hits(
    resolver: &UrlResolver<'_>,
    candidates: Vec<Candidate>,
    describe_limit: usize,
    config: &RetrievalConfig,
) -> RankedHits {
    let mut ranked = RankedHits::default();

    for candidate in candidates {
        let context = context::expand(
            resolver.store(),
            candidate.chunk_id,
            &candidate.document_id,
            config.window_size,
        )
        .unwrap_or_else(|e| {
            tracing::warn!(stage = "expand", document_id = %candidate.document_id, "{e}");
            candidate.text.clone()
        });

        let Some(source) = resolver.resolve(&candidate.document_id) else {
            continue;
        };

        if ranked.descriptions.len() < describe_limit
            && is_document_file(source.extension.as_deref(), config)
        {
            ranked.descriptions.push(describe(
                resolver,
                &source.url,
                &config.document_extensions,
                config.description_max_chars,
            ));
        }

        ranked.hits.push(ContextHit {
            chunk_id: candidate.chunk_id,
            document_id: candidate.document_id,
            context,
            source_url: source.url,
            score: candidate.score,
        });
    }

    let found = ranked.descriptions.iter().filter(|d| d.is_found()).count();
    tracing::debug!(
        hits = ranked.hits.len(),
        descriptions = ranked.descriptions.len(),
        found,
        "Ranked candidates"
    );
    ranked
}

fn is_document_file(extension: Option<&str>, config: &RetrievalConfig) -> bool {
    extension.is_some_and(|ext| {
        config
            .document_extensions
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, Description, Document};
    use crate::search::keywords::KeywordMatch;
    use crate::store::MemoryStore;

    const BASE: &str = "https://archive.example.org/";

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|w| w.to_string()).collect()
    }

    fn add_doc(store: &MemoryStore, id: &str, filename: &str, chunks: &[(&str, [f32; 2])]) {
        store
            .insert_document(Document {
                id: id.to_string(),
                original_filename: filename.to_string(),
            })
            .unwrap();
        store
            .add_chunks(
                chunks
                    .iter()
                    .enumerate()
                    .map(|(i, (text, emb))| Chunk {
                        id: i as u64,
                        document_id: id.to_string(),
                        text: text.to_string(),
                        embedding: emb.to_vec(),
                    })
                    .collect(),
            )
            .unwrap();
    }

    fn corpus() -> MemoryStore {
        let store = MemoryStore::new();
        add_doc(
            &store,
            "housing",
            "Nonehousing.pdf",
            &[
                ("housing report", [0.9, 0.1]),
                ("rent control was extended", [1.0, 0.0]),
                ("appendix", [0.0, 1.0]),
            ],
        );
        add_doc(
            &store,
            "budget",
            "budget.docx",
            &[("control the rent budget", [0.8, 0.6]), ("totals", [0.1, 0.9])],
        );
        store
    }

    #[test]
    fn test_best_match_per_kind() {
        let store = corpus();
        let resolver = UrlResolver::new(&store, BASE);

        for kind in [
            ScoreKind::CosineSimilarity,
            ScoreKind::CosineDistance,
            ScoreKind::EuclideanDistance,
        ] {
            let answer = best_match(&resolver, &[1.0, 0.0], kind).unwrap();
            assert_eq!(answer.text, "rent control was extended");
            assert_eq!(answer.source_url, format!("{BASE}housing"));
            assert_eq!(answer.score_kind, kind);
        }
    }

    #[test]
    fn test_best_match_on_empty_store() {
        let store = MemoryStore::new();
        let resolver = UrlResolver::new(&store, BASE);
        assert!(best_match(&resolver, &[1.0, 0.0], ScoreKind::CosineSimilarity).is_none());
    }

    #[test]
    fn test_ann_search_sorted_and_expanded() {
        let store = corpus();
        let resolver = UrlResolver::new(&store, BASE);
        let config = RetrievalConfig::default();

        let ranked = ann_search(&resolver, &[1.0, 0.0], 4, &config);
        assert_eq!(ranked.hits.len(), 4);
        assert!(ranked.hits.windows(2).all(|w| w[0].score >= w[1].score));

        let top = &ranked.hits[0];
        assert_eq!(top.chunk_id, 1);
        assert_eq!(top.context, "housing report rent control was extended appendix");
    }

    #[test]
    fn test_descriptions_only_for_document_files() {
        let store = corpus();
        let resolver = UrlResolver::new(&store, BASE);
        let config = RetrievalConfig::default();

        let ranked = ann_search(&resolver, &[1.0, 0.0], 5, &config);
        let pdf_hits = ranked
            .hits
            .iter()
            .filter(|h| h.document_id == "housing")
            .count();
        assert_eq!(ranked.descriptions.len(), pdf_hits);
        assert!(ranked
            .descriptions
            .iter()
            .all(|d| *d == Description::Text("housing report".to_string())));
    }

    #[test]
    fn test_descriptions_capped_at_top_n() {
        let store = corpus();
        let resolver = UrlResolver::new(&store, BASE);
        let config = RetrievalConfig {
            document_extensions: words(&["pdf", "docx"]),
            ..RetrievalConfig::default()
        };

        let ranked = ann_search(&resolver, &[1.0, 0.0], 2, &config);
        assert_eq!(ranked.hits.len(), 2);
        assert!(ranked.descriptions.len() <= 2);
    }

    #[test]
    fn test_keyword_stage_respects_order() {
        let store = corpus();
        let resolver = UrlResolver::new(&store, BASE);
        let config = RetrievalConfig::default();

        let ranked =
            keyword_then_similarity(&resolver, &words(&["rent", "control"]), &[0.0, 1.0], 5, &config);
        assert_eq!(ranked.hits.len(), 1);
        assert_eq!(ranked.hits[0].document_id, "housing");
        assert_eq!(ranked.hits[0].chunk_id, 1);
    }

    #[test]
    fn test_keyword_stage_any_order() {
        let store = corpus();
        let resolver = UrlResolver::new(&store, BASE);
        let config = RetrievalConfig {
            keyword_match: KeywordMatch::AnyOrder,
            ..RetrievalConfig::default()
        };

        let ranked =
            keyword_then_similarity(&resolver, &words(&["rent", "control"]), &[0.0, 1.0], 5, &config);
        assert_eq!(ranked.hits.len(), 2);
        assert_eq!(ranked.hits[0].document_id, "budget");
    }

    #[test]
    fn test_keyword_stage_falls_back_to_ann() {
        let store = corpus();
        let resolver = UrlResolver::new(&store, BASE);
        let config = RetrievalConfig::default();

        let hybrid =
            keyword_then_similarity(&resolver, &words(&["zoning"]), &[1.0, 0.0], 3, &config);
        let ann = ann_search(&resolver, &[1.0, 0.0], 3, &config);
        assert_eq!(hybrid, ann);
        assert_eq!(hybrid.hits.len(), 3);
    }

    #[test]
    fn test_hits_variant_skips_descriptions() {
        let store = corpus();
        let resolver = UrlResolver::new(&store, BASE);
        let config = RetrievalConfig::default();
        let words = words(&["rent", "control"]);

        let described = keyword_then_similarity(&resolver, &words, &[1.0, 0.0], 5, &config);
        assert!(!described.descriptions.is_empty());

        let hits = keyword_then_similarity_hits(&resolver, &words, &[1.0, 0.0], 5, &config);
        assert_eq!(hits, described.hits);

        let zoning = vec!["zoning".to_string()];
        let fallback = keyword_then_similarity_hits(&resolver, &zoning, &[1.0, 0.0], 3, &config);
        assert_eq!(fallback, ann_search(&resolver, &[1.0, 0.0], 3, &config).hits);
    }
}
