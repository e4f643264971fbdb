use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{AssistantError, Result};
use crate::models::{GeminiRequest, Generation, GenerationConfig};
use crate::transport::Transport;

/// Marker the first-pass prompt asks the model to use when it needs a search.
pub const SEARCH_SENTINEL: &str = "SEARCH:";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// First pass: answer directly or ask for a search.
    async fn draft(&self, message: &str) -> Result<Generation>;

    /// Second pass: answer `message` from a retrieved `passage` only.
    async fn answer_with_context(&self, message: &str, passage: &str) -> Result<String>;
}

pub struct GeminiGenerator {
    tx: Arc<dyn Transport>,
    domain: String,
    config: GenerationConfig,
}

impl GeminiGenerator {
    pub fn new(tx: Arc<dyn Transport>, domain: String, config: GenerationConfig) -> Self {
        Self { tx, domain, config }
    }

    async fn generate(&self, prompt: String) -> Result<String> {
        let request = GeminiRequest::from_prompt(prompt, Some(self.config.clone()));
        let response = self.tx.generate(&request).await?;
        response.text().ok_or_else(|| {
            AssistantError::Internal("Gemini API returned no candidate text".to_string())
        })
    }
}

/// Split first-pass output into a direct answer or a search request.
///
/// The query is whatever follows the first sentinel, cut at a second one.
pub fn parse_generation(text: String) -> Generation {
    match text.split_once(SEARCH_SENTINEL) {
        Some((_, rest)) => {
            let query = rest.split(SEARCH_SENTINEL).next().unwrap_or_default();
            Generation::Search {
                query: query.trim().to_string(),
            }
        }
        None => Generation::Direct { text },
    }
}

pub fn draft_prompt(message: &str, domain: &str) -> String {
    format!(
        r#"You are a helpful UBL banking assistant. You have access to a web search tool to find current information ONLY from UBL Digital website ({domain}).

User's question: "{message}"

Instructions:
1. If the user is asking about UBL services, products, rates, or any specific information, use the web search tool to find current information from {domain} ONLY
2. If it's a general greeting or simple question, respond directly
3. Always provide helpful, accurate, and conversational responses based ONLY on UBL Digital website content
4. Don't mention that you're using a search tool - just provide the information naturally
5. If no information is found on {domain}, direct users to visit the website

Available tool: web_search(query) - searches ONLY {domain} for information

How would you like to respond? If you need to search for information, respond with: {SEARCH_SENTINEL} [your search query]
If you can answer directly, just provide your response."#
    )
}

pub fn context_prompt(message: &str, passage: &str, domain: &str) -> String {
    format!(
        r#"You are a helpful UBL banking assistant. Based on the following information from UBL Digital website ({domain}), provide a natural response to the user's question.

User's question: "{message}"

UBL Digital website information: "{passage}"

Please provide a helpful, natural response that directly answers the user's question using ONLY the information from {domain}. Be conversational and friendly. If the information is incomplete, suggest visiting {domain} for more details."#
    )
}

#[async_trait]
impl AnswerGenerator for GeminiGenerator {
    async fn draft(&self, message: &str) -> Result<Generation> {
        tracing::info!("Drafting answer with Gemini");
        let text = self.generate(draft_prompt(message, &self.domain)).await?;
        Ok(parse_generation(text))
    }

    async fn answer_with_context(&self, message: &str, passage: &str) -> Result<String> {
        tracing::info!(passage_len = passage.len(), "Answering from search context");
        self.generate(context_prompt(message, passage, &self.domain))
            .await
    }
}
