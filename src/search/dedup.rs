use rand::seq::SliceRandom;
use std::collections::HashSet;

use crate::models::{ContextHit, EntryKind, ResultEntry, TopDocuments, NO_ADDITIONAL_CONTENT};
use crate::search::resolver::{ResolvedSource, UrlResolver};

/// Keep the first hit per source URL, up to `top_n`, then pad with random
/// documents not yet present.
///
/// Padding draws random documents for up to `max_attempts` tries, then
/// walks the rest of the corpus. The result is shorter than `top_n`, and
/// flagged `exhausted`, only when no unused URL remains. No hits at all
/// yields `top_n` placeholders. Descriptions are left unset.
pub fn dedupe_and_pad(
    resolver: &UrlResolver<'_>,
    hits: &[ContextHit],
    top_n: usize,
    max_attempts: usize,
) -> TopDocuments {
    if hits.is_empty() {
        return TopDocuments::placeholders(top_n);
    }

    let mut seen: HashSet<&str> = HashSet::new();
    let mut entries: Vec<ResultEntry> = Vec::with_capacity(top_n);

    for hit in hits {
        if entries.len() >= top_n {
            break;
        }
        if seen.insert(hit.source_url.as_str()) {
            entries.push(ResultEntry {
                context: hit.context.clone(),
                source_url: hit.source_url.clone(),
                description: None,
                kind: EntryKind::Match,
            });
        }
    }

    if entries.len() < top_n {
        let unique = entries.len();
        backfill(resolver, &mut entries, top_n, max_attempts);
        tracing::debug!(
            stage = "backfill",
            unique,
            filled = entries.len() - unique,
            "Padded short result set"
        );
    }

    let exhausted = entries.len() < top_n;
    if exhausted {
        tracing::info!(
            stage = "backfill",
            returned = entries.len(),
            top_n,
            "Corpus exhausted before reaching top_n"
        );
    }
    TopDocuments { entries, exhausted }
}

fn backfill(
    resolver: &UrlResolver<'_>,
    entries: &mut Vec<ResultEntry>,
    top_n: usize,
    max_attempts: usize,
) {
    let available = match resolver.store().document_count() {
        Ok(count) => count,
        Err(e) => {
            tracing::warn!(stage = "backfill", "Document count failed: {e}");
            return;
        }
    };

    let mut seen: HashSet<String> = entries.iter().map(|e| e.source_url.clone()).collect();
    let mut attempts = 0;

    while entries.len() < top_n && attempts < max_attempts && seen.len() < available {
        attempts += 1;
        if let Some(source) = resolver.resolve_random() {
            push_filler(entries, &mut seen, source);
        }
    }

    if entries.len() < top_n && seen.len() < available {
        sweep(resolver, entries, &mut seen, top_n, attempts);
    }
}

/// Walk every document once, in random order, after the random draws have
/// run out. Only documents whose URL is not yet present are added.
fn sweep(
    resolver: &UrlResolver<'_>,
    entries: &mut Vec<ResultEntry>,
    seen: &mut HashSet<String>,
    top_n: usize,
    attempts: usize,
) {
    let mut ids = match resolver.store().document_ids() {
        Ok(ids) => ids,
        Err(e) => {
            tracing::warn!(stage = "backfill", "Document listing failed: {e}");
            return;
        }
    };
    ids.shuffle(&mut rand::thread_rng());
    tracing::debug!(stage = "backfill", attempts, documents = ids.len(), "Sweeping corpus");

    for id in ids {
        if entries.len() >= top_n {
            break;
        }
        match resolver.try_resolve(&id) {
            Ok(source) => push_filler(entries, seen, source),
            Err(e) => tracing::debug!(stage = "backfill", document_id = %id, "{e}"),
        }
    }
}

fn push_filler(
    entries: &mut Vec<ResultEntry>,
    seen: &mut HashSet<String>,
    source: ResolvedSource,
) {
    if seen.insert(source.url.clone()) {
        entries.push(ResultEntry {
            context: NO_ADDITIONAL_CONTENT.to_string(),
            source_url: source.url,
            description: None,
            kind: EntryKind::Filler,
        });
    }
}
