//! Site-scoped web search through the Tavily API.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::config::TavilyConfig;
use crate::error::{AssistantError, Result};
use crate::models::{SearchResult, TavilyRequest, TavilyResponse};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Look up `query` and return a passage of text to answer from.
    async fn retrieve(&self, query: &str) -> Result<String>;
}

pub struct TavilyRetriever {
    client: Client,
    config: TavilyConfig,
}

impl TavilyRetriever {
    pub fn new(config: TavilyConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn scoped_query(&self, query: &str) -> String {
        format!("site:{} {}", self.config.domain, query)
    }

    fn unavailable(&self) -> String {
        format!(
            "Unable to search for information at the moment. Please visit {} for assistance.",
            self.config.domain
        )
    }

    fn not_found(&self) -> String {
        format!(
            "I couldn't find specific information about that on our UBL Digital website. Please visit {} for more details or contact our customer service.",
            self.config.domain
        )
    }

    async fn search(&self, query: &str) -> Result<TavilyResponse> {
        let body = TavilyRequest {
            query: self.scoped_query(query),
            search_depth: self.config.search_depth.clone(),
            max_results: self.config.max_results,
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

/// Join every snippet longer than `min_chars` with single spaces.
pub fn combine_results(results: &[SearchResult], min_chars: usize) -> String {
    results
        .iter()
        .map(|r| r.content.as_str())
        .filter(|c| c.chars().count() > min_chars)
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

#[async_trait]
impl Retriever for TavilyRetriever {
    /// Never fails: search problems come back as apology text for the user.
    async fn retrieve(&self, query: &str) -> Result<String> {
        tracing::info!(%query, domain = %self.config.domain, "Searching");

        let response = match self.search(query).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Tavily search error: {}", e);
                return Ok(self.unavailable());
            }
        };

        let passage = combine_results(&response.results, self.config.min_content_chars);
        tracing::debug!(
            results = response.results.len(),
            passage_len = passage.len(),
            "Search finished"
        );

        if passage.is_empty() {
            Ok(self.not_found())
        } else {
            Ok(passage)
        }
    }
}
