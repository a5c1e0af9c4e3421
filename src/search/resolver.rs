//! Document filename → public URL.
//!
//! Stored filenames come out of ingestion with artifacts: a literal `None`
//! glued to the front, full source URLs, percent-encoding. The resolver keeps
//! only the decoded last path segment without its extension and appends that
//! to the archive base URL.

use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::ResolutionError;
use crate::models::Document;
use crate::store::ChunkStore;

/// A document's public URL plus what is known about the stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub document_id: String,
    pub url: String,
    /// Lowercase extension of the stored filename, without the dot
    pub extension: Option<String>,
    /// The requested document could not be resolved and this one was drawn
    /// at random instead
    pub fallback: bool,
}

/// Cleaned-up form of a stored filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileName {
    pub stem: String,
    pub extension: Option<String>,
}

pub struct UrlResolver<'a> {
    store: &'a dyn ChunkStore,
    base_url: &'a str,
}

impl<'a> UrlResolver<'a> {
    pub fn new(store: &'a dyn ChunkStore, base_url: &'a str) -> Self {
        Self { store, base_url }
    }

    pub fn store(&self) -> &'a dyn ChunkStore {
        self.store
    }

    /// URL of `document_id`, or of a random document if that fails. `None`
    /// only when the corpus is empty (or the random draw itself fails).
    pub fn resolve(&self, document_id: &str) -> Option<ResolvedSource> {
        match self.try_resolve(document_id) {
            Ok(source) => Some(source),
            Err(e) => {
                tracing::warn!(
                    stage = "resolve",
                    document_id,
                    "Falling back to a random document: {e}"
                );
                self.resolve_random()
            }
        }
    }

    pub fn try_resolve(&self, document_id: &str) -> Result<ResolvedSource, ResolutionError> {
        let document = self
            .store
            .document(document_id)?
            .ok_or_else(|| ResolutionError::DocumentNotFound(document_id.to_string()))?;
        self.source_for(&document, false)
    }

    /// Same transformation applied to a uniformly random document.
    pub fn resolve_random(&self) -> Option<ResolvedSource> {
        let document = match self.store.random_document() {
            Ok(Some(document)) => document,
            Ok(None) => {
                tracing::debug!(stage = "resolve_random", "Corpus is empty");
                return None;
            }
            Err(e) => {
                tracing::warn!(stage = "resolve_random", "Random document lookup failed: {e}");
                return None;
            }
        };
        match self.source_for(&document, true) {
            Ok(source) => Some(source),
            Err(e) => {
                tracing::warn!(stage = "resolve_random", document_id = %document.id, "{e}");
                None
            }
        }
    }

    /// The document a resolved URL points at: the first document (by id)
    /// whose normalized filename equals the URL's stem. Only extensions in
    /// `document_extensions` are stripped from the URL side.
    pub fn locate(
        &self,
        url: &str,
        document_extensions: &[String],
    ) -> Result<Option<Document>, ResolutionError> {
        let stem = url_stem(url, self.base_url, document_extensions);
        if stem.is_empty() {
            return Ok(None);
        }

        let candidates = self
            .store
            .documents_by_filename_fragment(search_fragment(&stem))?;
        Ok(candidates.into_iter().find(|d| {
            normalize_filename(&d.original_filename)
                .map(|name| name.stem == stem)
                .unwrap_or(false)
        }))
    }

    fn source_for(
        &self,
        document: &Document,
        fallback: bool,
    ) -> Result<ResolvedSource, ResolutionError> {
        let name = normalize_filename(&document.original_filename)?;
        Ok(ResolvedSource {
            document_id: document.id.clone(),
            url: format!("{}{}", self.base_url, name.stem),
            extension: name.extension,
            fallback,
        })
    }
}

/// Drop everything through the first `None`, trim, take the URL/path
/// portion, percent-decode, keep the last segment and split off its
/// extension.
pub fn normalize_filename(raw: &str) -> Result<FileName, ResolutionError> {
    let cleaned = match raw.split_once("None") {
        Some((_, rest)) => rest,
        None => raw,
    }
    .trim();

    let path = match Url::parse(cleaned) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => cleaned
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    let decoded = percent_decode_str(&path).decode_utf8_lossy();
    let segment = decoded.rsplit('/').next().unwrap_or_default().trim();
    let (stem, extension) = split_extension(segment);

    if stem.is_empty() {
        return Err(ResolutionError::UnusableFilename {
            filename: raw.to_string(),
        });
    }

    Ok(FileName {
        stem: stem.to_string(),
        extension: extension.map(|e| e.to_ascii_lowercase()),
    })
}

/// `("report.v2", Some("pdf"))` for `report.v2.pdf`; leading dots are part
/// of the stem.
fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(i) if name[..i].chars().any(|c| c != '.') && i + 1 < name.len() => {
            (&name[..i], Some(&name[i + 1..]))
        }
        _ => (name, None),
    }
}

/// Stem of a resolved URL: base URL removed, last segment, with a
/// recognized document extension removed if one is present. Resolved URLs
/// already carry the decoded stem, so nothing is decoded here.
fn url_stem(url: &str, base_url: &str, document_extensions: &[String]) -> String {
    let rest = if base_url.is_empty() {
        url
    } else {
        url.strip_prefix(base_url).unwrap_or(url)
    };
    let segment = rest.rsplit('/').next().unwrap_or_default().trim();

    match split_extension(segment) {
        (stem, Some(ext))
            if document_extensions
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext)) =>
        {
            stem.to_string()
        }
        _ => segment.to_string(),
    }
}

/// Longest run of URL-unreserved characters in `stem`. Those are never
/// percent-encoded, so the run appears verbatim in the stored filename.
fn search_fragment(stem: &str) -> &str {
    stem.split(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~')))
        .max_by_key(|run| run.len())
        .unwrap_or_default()
}
