//! # archive-rag
//!
//! Retrieval over an archive of documents that were chunked and embedded
//! ahead of time. A natural-language query is embedded, matched against the
//! chunk store, expanded into a readable passage, and mapped back to the
//! public URL of the document it came from.
//!
//! ## Architecture
//!
//! ```text
//!                      ┌──────────────┐
//!                      │  User Query  │
//!                      └──────┬───────┘
//!                 ┌───────────┴───────────┐
//!                 ▼                       ▼
//!        ┌────────────────┐      ┌─────────────────┐
//!        │ Important words│      │    Embedder     │
//!        │ (stop-word drop)│     │ (mean-pooled)   │
//!        └───────┬────────┘      └────────┬────────┘
//!                └───────────┬────────────┘
//!                            ▼
//!              ┌───────────────────────────┐
//!              │ Stage 1: keyword filter   │──── no match ───┐
//!              │ lower(text) LIKE %w1%w2%  │                 │
//!              └─────────────┬─────────────┘                 ▼
//!                            ▼                   ┌──────────────────────┐
//!              ┌───────────────────────────┐     │ ANN: cosine top-N    │
//!              │ Stage 2: cosine re-rank   │     │ over the whole corpus│
//!              └─────────────┬─────────────┘     └──────────┬───────────┘
//!                            └──────────────┬───────────────┘
//!                                           ▼
//!                       ┌────────────────────────────────────┐
//!                       │ Context window (±2 chunks)         │
//!                       │ + filename → URL (random fallback) │
//!                       └─────────────────┬──────────────────┘
//!                                         ▼
//!                       ┌────────────────────────────────────┐
//!                       │ Dedup by URL, backfill to top_n    │
//!                       └─────────────────┬──────────────────┘
//!                                         ▼
//!                       ┌────────────────────────────────────┐
//!                       │ Descriptions (first chunk, 250 ch) │
//!                       └────────────────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for the archive, store, providers and retrieval knobs
//! - [`error`] - Typed failures per component boundary
//! - [`models`] - Chunks, documents, candidates, result entries and sentinels
//! - [`store`] - The `ChunkStore` seam with in-memory and SQLite adapters
//! - [`search::similarity`] - Cosine / Euclidean scoring with zero-vector handling
//! - [`search::keywords`] - Important-word extraction and keyword patterns
//! - [`search::context`] - Context window expansion around a matched chunk
//! - [`search::resolver`] - Document filename → public URL, with random fallback
//! - [`search::describe`] - URL → short description from the document's first chunk
//! - [`search::ranker`] - Single-best, ANN top-N and keyword-then-similarity strategies
//! - [`search::dedup`] - Per-URL dedup and backfill to a fixed result count
//! - [`llm::embeddings`] - Query embedding via Ollama, OpenAI-compatible or TEI providers
//! - [`llm::generate`] - Chat-completion clients behind the `TextGenerator` trait
//! - [`llm::synthesis`] - Optional answer synthesis
//! - [`pipeline`] - The two entry operations wiring everything together

pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod search;
pub mod store;
