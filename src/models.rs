use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Filler context for entries added by backfill.
pub const NO_ADDITIONAL_CONTENT: &str = "No additional unique content available";
/// Description attached to backfill entries.
pub const NO_ADDITIONAL_DESCRIPTION: &str = "No additional unique description available";
/// Placeholder context when nothing matched at all.
pub const NO_CONTENT: &str = "No content available";
/// Placeholder source when nothing matched at all.
pub const NO_FILE: &str = "No file available";
/// Placeholder description when nothing matched at all.
pub const NO_DESCRIPTION: &str = "No description available";

/// A stored slice of a document, with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Ordinal within the document
    pub id: u64,
    pub document_id: String,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// A source document as recorded at ingestion time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    /// May carry ingestion artifacts: a stray "None" prefix, URL-encoded segments
    pub original_filename: String,
}

/// How a candidate's score should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreKind {
    CosineSimilarity,
    CosineDistance,
    EuclideanDistance,
}

impl ScoreKind {
    pub fn higher_is_better(self) -> bool {
        matches!(self, ScoreKind::CosineSimilarity)
    }

    /// Score assigned to a chunk that cannot be compared (zero vector,
    /// dimension mismatch).
    pub fn worst(self) -> f32 {
        match self {
            ScoreKind::CosineSimilarity => 0.0,
            ScoreKind::CosineDistance | ScoreKind::EuclideanDistance => f32::MAX,
        }
    }

    /// Order two scores best-first.
    pub fn best_first(self, a: f32, b: f32) -> std::cmp::Ordering {
        let ord = a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal);
        if self.higher_is_better() {
            ord.reverse()
        } else {
            ord
        }
    }
}

/// A chunk proposed as a match for the current query.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub chunk_id: u64,
    pub document_id: String,
    pub text: String,
    pub score: f32,
    pub score_kind: ScoreKind,
}

/// A candidate after context expansion and URL resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextHit {
    pub chunk_id: u64,
    pub document_id: String,
    pub context: String,
    pub source_url: String,
    pub score: f32,
}

/// Output of the multi-candidate strategies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedHits {
    pub hits: Vec<ContextHit>,
    /// Descriptions of the hits whose source is a document file, in hit order
    pub descriptions: Vec<Description>,
}

/// The best single match for a query.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleAnswer {
    pub text: String,
    pub source_url: String,
    pub score: f32,
    pub score_kind: ScoreKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Came from a real match
    Match,
    /// Random document added to reach the requested count
    Filler,
    /// Nothing could be retrieved
    Placeholder,
}

/// One externally visible result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultEntry {
    pub context: String,
    pub source_url: String,
    pub description: Option<String>,
    pub kind: EntryKind,
}

impl ResultEntry {
    pub fn placeholder() -> Self {
        Self {
            context: NO_CONTENT.to_string(),
            source_url: NO_FILE.to_string(),
            description: Some(NO_DESCRIPTION.to_string()),
            kind: EntryKind::Placeholder,
        }
    }
}

/// Result of the top-N entry point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopDocuments {
    pub entries: Vec<ResultEntry>,
    /// The corpus ran out of unique documents before `top_n` was reached
    pub exhausted: bool,
}

impl TopDocuments {
    pub fn placeholders(top_n: usize) -> Self {
        Self {
            entries: vec![ResultEntry::placeholder(); top_n],
            exhausted: false,
        }
    }
}

/// Outcome of looking up a description for a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Description {
    Text(String),
    /// No document has a matching filename
    FileNotFound,
    /// The document exists but has no chunks
    NotFound,
    /// The store failed while looking
    Error,
}

impl Description {
    pub fn is_found(&self) -> bool {
        matches!(self, Description::Text(_))
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Description::Text(text) => f.write_str(text),
            Description::FileNotFound => f.write_str("File not found."),
            Description::NotFound => f.write_str("Description not found."),
            Description::Error => f.write_str("Error retrieving description."),
        }
    }
}

/// Retrieval strategy for the single-answer entry point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMethod {
    CosineSimilarity,
    CosineDistance,
    EuclideanSearch,
    #[default]
    AnnSearch,
}

impl SearchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMethod::CosineSimilarity => "cosine_similarity",
            SearchMethod::CosineDistance => "vector_search_cosine_distance",
            SearchMethod::EuclideanSearch => "euclidean_search",
            SearchMethod::AnnSearch => "ann_search",
        }
    }
}

impl FromStr for SearchMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "cosine_similarity" => Ok(SearchMethod::CosineSimilarity),
            "vector_search_cosine_distance" | "cosine_distance" => {
                Ok(SearchMethod::CosineDistance)
            }
            "euclidean_search" | "euclidean_distance" => Ok(SearchMethod::EuclideanSearch),
            "ann_search" => Ok(SearchMethod::AnnSearch),
            other => Err(format!("Search method '{other}' is not valid")),
        }
    }
}

impl fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
