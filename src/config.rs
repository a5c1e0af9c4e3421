use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::search::context::DEFAULT_WINDOW_SIZE;
use crate::search::keywords::KeywordMatch;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Prepended to every resolved filename to form the public URL
    pub archive_base_url: String,
    /// Chunk store configuration
    pub store: StoreConfig,
    /// Embedding / generation provider configuration
    pub llm: LlmConfig,
    /// Retrieval knobs
    pub retrieval: RetrievalConfig,
    /// Log raw query text instead of a hash
    pub log_query_text: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database holding `documents` and `chunks`
    pub path: PathBuf,
    /// How long a query waits on a locked database before failing.
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/archive.sqlite"),
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama", "openai" or "tei"
    pub provider: String,
    /// Base URL for the provider API
    pub base_url: String,
    /// Model name for answer synthesis
    pub chat_model: String,
    /// Model name for embeddings
    pub embedding_model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    /// Embedding vector dimension
    pub embedding_dim: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            chat_model: "llama3.2".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            api_key: None,
            embedding_dim: 768,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Chunks on each side of a match included in its context
    pub window_size: usize,
    /// Number of entries returned by the top-N entry point
    pub top_n: usize,
    /// Candidates pulled from the hybrid search before dedup
    pub keyword_stage_limit: usize,
    /// Description length cap, ellipsis included
    pub description_max_chars: usize,
    /// File extensions (lowercase, no dot) that count as document files
    pub document_extensions: Vec<String>,
    /// How Stage 1 matches important words
    pub keyword_match: KeywordMatch,
    /// Random draws allowed while backfilling a short result set
    pub backfill_max_attempts: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            top_n: 5,
            keyword_stage_limit: 20,
            description_max_chars: 250,
            document_extensions: vec!["pdf".to_string()],
            keyword_match: KeywordMatch::Ordered,
            backfill_max_attempts: 50,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            archive_base_url: String::new(),
            store: StoreConfig::default(),
            llm: LlmConfig::default(),
            retrieval: RetrievalConfig::default(),
            log_query_text: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("ARCHIVE_BASE_URL") {
            config.archive_base_url = url;
        }
        if let Ok(val) = std::env::var("RAG_LOG_QUERY_TEXT") {
            config.log_query_text = parse_bool(&val);
        }

        // Store
        if let Ok(path) = std::env::var("RAG_STORE_PATH") {
            config.store.path = PathBuf::from(path);
        }
        if let Ok(val) = std::env::var("STORE_BUSY_TIMEOUT_MS") {
            if let Ok(v) = val.parse() {
                config.store.busy_timeout_ms = v;
            }
        }

        // Providers
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Ok(model) = std::env::var("LLM_EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            config.llm.api_key = Some(key);
        }
        if let Ok(dim) = std::env::var("LLM_EMBEDDING_DIM") {
            if let Ok(d) = dim.parse() {
                config.llm.embedding_dim = d;
            }
        }
        if let Ok(val) = std::env::var("LLM_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                config.llm.timeout_secs = v;
            }
        }

        // Retrieval
        if let Ok(val) = std::env::var("RAG_WINDOW_SIZE") {
            if let Ok(v) = val.parse() {
                config.retrieval.window_size = v;
            }
        }
        if let Ok(val) = std::env::var("RAG_TOP_N") {
            if let Ok(v) = val.parse() {
                config.retrieval.top_n = v;
            }
        }
        if let Ok(val) = std::env::var("RAG_KEYWORD_STAGE_LIMIT") {
            if let Ok(v) = val.parse() {
                config.retrieval.keyword_stage_limit = v;
            }
        }
        if let Ok(val) = std::env::var("RAG_DESCRIPTION_MAX_CHARS") {
            if let Ok(v) = val.parse() {
                config.retrieval.description_max_chars = v;
            }
        }
        if let Ok(val) = std::env::var("RAG_DOCUMENT_EXTENSIONS") {
            config.retrieval.document_extensions = parse_extensions(&val);
        }
        if let Ok(val) = std::env::var("RAG_KEYWORD_MATCH") {
            match val.parse() {
                Ok(mode) => config.retrieval.keyword_match = mode,
                Err(e) => tracing::warn!("Ignoring RAG_KEYWORD_MATCH: {e}"),
            }
        }
        if let Ok(val) = std::env::var("RAG_BACKFILL_MAX_ATTEMPTS") {
            if let Ok(v) = val.parse() {
                config.retrieval.backfill_max_attempts = v;
            }
        }

        config
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Comma-separated list, lowercased, leading dots dropped.
fn parse_extensions(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_pipeline_constants() {
        let config = Config::default();
        assert_eq!(config.retrieval.window_size, 2);
        assert_eq!(config.retrieval.top_n, 5);
        assert_eq!(config.retrieval.keyword_stage_limit, 20);
        assert_eq!(config.retrieval.description_max_chars, 250);
        assert_eq!(config.retrieval.keyword_match, KeywordMatch::Ordered);
        assert!(!config.log_query_text);
    }

    #[test]
    fn test_parse_extensions_normalizes() {
        assert_eq!(
            parse_extensions(" .PDF, docx,,txt "),
            vec!["pdf".to_string(), "docx".to_string(), "txt".to_string()]
        );
    }

    #[test]
    fn test_parse_bool_variants() {
        assert!(parse_bool("true"));
        assert!(parse_bool(" YES "));
        assert!(parse_bool("1"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
    }
}
