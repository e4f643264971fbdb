use serde::{Deserialize, Serialize};

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

impl ChatRequest {
    /// The message text, or `None` when it is missing or empty.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref().filter(|m| !m.is_empty())
    }
}

/// One server-sent event payload on the chat stream.
///
/// Serialized untagged so the wire carries exactly `{"content": ..}`,
/// `{"done": true}` or `{"error": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamChunk {
    Content { content: String },
    Done { done: bool },
    Error { error: String },
}

impl StreamChunk {
    pub fn content(text: impl Into<String>) -> Self {
        Self::Content {
            content: text.into(),
        }
    }

    pub fn done() -> Self {
        Self::Done { done: true }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    /// `done` and `error` both close a stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { done: true } | Self::Error { .. })
    }
}

/// What the first generation pass asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    /// The model answered on its own.
    Direct { text: String },
    /// The model wants a site-scoped search before answering.
    Search { query: String },
}

// Gemini generateContent request format
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct GeminiPart {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

// Gemini generateContent response format
#[derive(Debug, Deserialize, Clone, Default)]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Candidate {
    #[serde(default)]
    pub content: GeminiContent,
}

impl GeminiRequest {
    /// A single user turn carrying `prompt`.
    pub fn from_prompt(prompt: impl Into<String>, config: Option<GenerationConfig>) -> Self {
        Self {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: Some(prompt.into()),
                }],
            }],
            generation_config: config,
        }
    }

    /// Concatenated text of every part, in order.
    pub fn prompt_text(&self) -> String {
        self.contents
            .iter()
            .flat_map(|c| c.parts.iter())
            .filter_map(|p| p.text.as_deref())
            .collect()
    }
}

impl GeminiResponse {
    /// Text of the first candidate, `None` if the model returned nothing usable.
    pub fn text(&self) -> Option<String> {
        let candidate = self.candidates.first()?;
        let text: String = candidate
            .content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.is_empty() { None } else { Some(text) }
    }
}

// Tavily search request format
#[derive(Debug, Serialize, Clone)]
pub struct TavilyRequest {
    pub query: String,
    pub search_depth: String,
    pub max_results: u32,
}

// Tavily search response format
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TavilyResponse {
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct SearchResult {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub score: Option<f64>,
}
