use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::EmbeddingError;

/// Maximum characters of query text sent to the embedding service.
/// BERT-style encoders take 512 tokens; 2 000 chars stays under that for
/// ordinary prose, and every provider is also asked to truncate.
const MAX_EMBED_CHARS: usize = 2_000;

/// Turns query text into a vector comparable with stored chunk embeddings.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, EmbeddingError>> + Send;
}

/// Truncate `text` to at most `MAX_EMBED_CHARS` bytes on a UTF-8 char boundary.
pub(crate) fn truncate_for_embedding(text: &str) -> &str {
    if text.len() <= MAX_EMBED_CHARS {
        return text;
    }
    let mut end = MAX_EMBED_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Average per-token hidden states over the token axis. `None` for no
/// tokens or rows of differing width.
pub fn mean_pool(token_states: &[Vec<f32>]) -> Option<Vec<f32>> {
    let width = token_states.first()?.len();
    if width == 0 || token_states.iter().any(|t| t.len() != width) {
        return None;
    }

    let mut pooled = vec![0.0f32; width];
    for token in token_states {
        for (acc, v) in pooled.iter_mut().zip(token) {
            *acc += v;
        }
    }
    let n = token_states.len() as f32;
    pooled.iter_mut().for_each(|v| *v /= n);
    Some(pooled)
}

/// `expected == 0` disables the check.
fn check_dimension(embedding: Vec<f32>, expected: usize) -> Result<Vec<f32>, EmbeddingError> {
    if embedding.is_empty() {
        return Err(EmbeddingError::Empty);
    }
    if expected != 0 && embedding.len() != expected {
        return Err(EmbeddingError::DimensionMismatch {
            expected,
            actual: embedding.len(),
        });
    }
    Ok(embedding)
}

/// Embedder backed by an HTTP embedding service.
///
/// `provider` selects the wire format:
/// - `ollama`: `POST /api/embed`, pooled by the server
/// - `openai`: `POST /v1/embeddings`, pooled by the server
/// - `tei`: text-embeddings-inference `POST /embed_all`, which returns the
///   final hidden state of every token; these are mean-pooled here
pub struct HttpEmbedder {
    client: reqwest::Client,
    config: LlmConfig,
}

impl HttpEmbedder {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build embedding HTTP client")?;
        Ok(Self { client, config })
    }

    async fn request(&self, text: &str) -> Result<Vec<f32>> {
        match self.config.provider.as_str() {
            "ollama" => embed_ollama(&self.client, &self.config, text).await,
            "openai" => embed_openai(&self.client, &self.config, text).await,
            "tei" => embed_tei(&self.client, &self.config, text).await,
            other => anyhow::bail!("Unknown LLM provider: {other}"),
        }
    }
}

impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if !matches!(self.config.provider.as_str(), "ollama" | "openai" | "tei") {
            return Err(EmbeddingError::UnknownProvider(self.config.provider.clone()));
        }

        let embedding = self
            .request(truncate_for_embedding(text))
            .await
            .map_err(|e| EmbeddingError::Request(format!("{e:#}")))?;
        check_dimension(embedding, self.config.embedding_dim)
    }
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
    truncate: bool,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

async fn embed_ollama(client: &reqwest::Client, config: &LlmConfig, text: &str) -> Result<Vec<f32>> {
    let url = format!("{}/api/embed", config.base_url);
    let req = OllamaEmbedRequest {
        model: &config.embedding_model,
        input: text,
        truncate: true,
    };

    let resp = client
        .post(&url)
        .json(&req)
        .send()
        .await
        .context("Failed to call Ollama embed API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Ollama embed API returned {status}: {body}");
    }

    let body: OllamaEmbedResponse = resp
        .json()
        .await
        .context("Failed to parse Ollama embed response")?;
    Ok(body.embeddings.into_iter().next().unwrap_or_default())
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiEmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedData>,
}

#[derive(Deserialize)]
struct OpenAiEmbedData {
    embedding: Vec<f32>,
}

async fn embed_openai(client: &reqwest::Client, config: &LlmConfig, text: &str) -> Result<Vec<f32>> {
    let url = format!("{}/v1/embeddings", config.base_url);
    let api_key = config.api_key.as_deref().unwrap_or_default();
    let req = OpenAiEmbedRequest {
        model: &config.embedding_model,
        input: text,
    };

    let resp = client
        .post(&url)
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&req)
        .send()
        .await
        .context("Failed to call OpenAI embed API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("OpenAI embed API returned {status}: {body}");
    }

    let body: OpenAiEmbedResponse = resp
        .json()
        .await
        .context("Failed to parse OpenAI embed response")?;
    Ok(body
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .unwrap_or_default())
}

// ─── text-embeddings-inference ───────────────────────────

#[derive(Serialize)]
struct TeiEmbedAllRequest<'a> {
    inputs: &'a str,
    truncate: bool,
}

/// One matrix per input: tokens × hidden size.
type TeiEmbedAllResponse = Vec<Vec<Vec<f32>>>;

async fn embed_tei(client: &reqwest::Client, config: &LlmConfig, text: &str) -> Result<Vec<f32>> {
    let url = format!("{}/embed_all", config.base_url);
    let req = TeiEmbedAllRequest {
        inputs: text,
        truncate: true,
    };

    let resp = client
        .post(&url)
        .json(&req)
        .send()
        .await
        .context("Failed to call TEI embed_all API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("TEI embed_all API returned {status}: {body}");
    }

    let body: TeiEmbedAllResponse = resp
        .json()
        .await
        .context("Failed to parse TEI embed_all response")?;
    let tokens = body.into_iter().next().unwrap_or_default();
    mean_pool(&tokens).context("TEI returned no usable token states")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundary() {
        let text = "ü".repeat(MAX_EMBED_CHARS);
        let cut = truncate_for_embedding(&text);
        assert!(cut.len() <= MAX_EMBED_CHARS);
        assert!(cut.chars().all(|c| c == 'ü'));
        assert_eq!(truncate_for_embedding("short"), "short");
    }

    #[test]
    fn test_mean_pool_averages_tokens() {
        let states = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 0.0]];
        assert_eq!(mean_pool(&states), Some(vec![3.0, 2.0]));
    }

    #[test]
    fn test_mean_pool_rejects_empty_and_ragged() {
        assert_eq!(mean_pool(&[]), None);
        assert_eq!(mean_pool(&[vec![1.0], vec![1.0, 2.0]]), None);
    }

    #[test]
    fn test_check_dimension() {
        assert!(check_dimension(vec![0.1; 4], 4).is_ok());
        assert!(check_dimension(vec![0.1; 4], 0).is_ok());
        assert!(matches!(
            check_dimension(vec![0.1; 3], 4),
            Err(EmbeddingError::DimensionMismatch {
                expected: 4,
                actual: 3
            })
        ));
        assert!(matches!(check_dimension(Vec::new(), 4), Err(EmbeddingError::Empty)));
    }

    #[test]
    fn test_tei_response_shape() {
        let raw = r#"[[[1.0, 0.0], [0.0, 1.0]]]"#;
        let parsed: TeiEmbedAllResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(mean_pool(&parsed[0]), Some(vec![0.5, 0.5]));
    }

    #[tokio::test]
    async fn test_unknown_provider_is_rejected_before_any_request() {
        let config = LlmConfig {
            provider: "bogus".to_string(),
            ..LlmConfig::default()
        };
        let embedder = HttpEmbedder::new(config).unwrap();
        assert!(matches!(
            embedder.embed("query").await,
            Err(EmbeddingError::UnknownProvider(p)) if p == "bogus"
        ));
    }
}
