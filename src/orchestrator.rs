//! Decides per message whether to answer directly, search first, or fall back.
//!
//! Every upstream stage is individually guarded: an error or timeout at any
//! stage yields the canned answer for the user's message, never an error.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Credentials;
use crate::error::{AssistantError, Result};
use crate::fallback::FallbackResponder;
use crate::generator::AnswerGenerator;
use crate::models::Generation;
use crate::search::Retriever;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    MissingCredentials,
    GenerationFailed,
    RetrievalFailed,
    FinalGenerationFailed,
}

/// How a reply was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Direct,
    Searched,
    Fallback(FallbackReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub outcome: Outcome,
}

pub struct Orchestrator {
    credentials: Credentials,
    generator: Arc<dyn AnswerGenerator>,
    retriever: Arc<dyn Retriever>,
    fallback: FallbackResponder,
    stage_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        credentials: Credentials,
        generator: Arc<dyn AnswerGenerator>,
        retriever: Arc<dyn Retriever>,
        stage_timeout: Duration,
    ) -> Self {
        Self {
            credentials,
            generator,
            retriever,
            fallback: FallbackResponder::new(),
            stage_timeout,
        }
    }

    pub fn fallback(&self) -> &FallbackResponder {
        &self.fallback
    }

    fn fall_back(&self, message: &str, reason: FallbackReason) -> Reply {
        tracing::warn!(?reason, "Answering with fallback text");
        Reply {
            text: self.fallback.respond(message).to_string(),
            outcome: Outcome::Fallback(reason),
        }
    }

    async fn guarded<T, F>(&self, stage: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.stage_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(AssistantError::Timeout {
                stage,
                secs: self.stage_timeout.as_secs(),
            }),
        }
    }

    pub async fn respond(&self, message: &str) -> Reply {
        if !self.credentials.usable() {
            tracing::info!("API keys not configured");
            return self.fall_back(message, FallbackReason::MissingCredentials);
        }

        let draft = match self.guarded("generation", self.generator.draft(message)).await {
            Ok(draft) => draft,
            Err(e) => {
                tracing::error!("Gemini processing error: {}", e);
                return self.fall_back(message, FallbackReason::GenerationFailed);
            }
        };

        let query = match draft {
            Generation::Direct { text } => {
                tracing::info!("Answered directly");
                return Reply {
                    text,
                    outcome: Outcome::Direct,
                };
            }
            Generation::Search { query } => query,
        };

        tracing::info!(%query, "Search requested");
        let passage = match self.guarded("search", self.retriever.retrieve(&query)).await {
            Ok(passage) => passage,
            Err(e) => {
                tracing::error!("Search error: {}", e);
                return self.fall_back(message, FallbackReason::RetrievalFailed);
            }
        };

        match self
            .guarded(
                "final generation",
                self.generator.answer_with_context(message, &passage),
            )
            .await
        {
            Ok(text) => Reply {
                text,
                outcome: Outcome::Searched,
            },
            Err(e) => {
                tracing::error!("Final Gemini processing error: {}", e);
                self.fall_back(message, FallbackReason::FinalGenerationFailed)
            }
        }
    }
}
