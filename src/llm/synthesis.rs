//! Optional answer synthesis with a chat model. Nothing in retrieval depends
//! on it.

use crate::llm::generate::{ChatMessage, GenerationParams, TextGenerator};

const ANSWER_PARAMS: GenerationParams = GenerationParams {
    max_tokens: 100,
    temperature: 0.01,
    top_p: 1.0,
};

/// A short readable answer to `query` built from the retrieved `context`.
/// `None` when the generator fails or returns nothing.
pub async fn synthesize<G: TextGenerator>(
    generator: &G,
    query: &str,
    context: &str,
) -> Option<String> {
    let messages = [
        ChatMessage::system(format!("Question: {query}")),
        ChatMessage::system(format!("Answer: {context}")),
    ];
    match generator.generate(&messages, ANSWER_PARAMS).await {
        Ok(text) => Some(text.trim().to_string()),
        Err(e) => {
            tracing::warn!(stage = "synthesize", "{e}");
            None
        }
    }
}
