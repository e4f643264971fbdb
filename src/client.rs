//! Consumer side of the chat stream: decodes SSE frames into a transcript.

use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ChatRequest, StreamChunk};

pub const WELCOME_MESSAGE: &str =
    "Hi! I'm your UBL banking assistant. Ask me anything about UBL services!";

pub const TECHNICAL_ISSUES: &str = "Sorry, I'm having some technical issues. Please try again!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(text: impl Into<String>, sender: Sender) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            sender,
            timestamp: Utc::now(),
        }
    }
}

/// Append-only list of messages for one session.
#[derive(Debug, Clone)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            messages: vec![Message::new(WELCOME_MESSAGE, Sender::Bot)],
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: Uuid) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn push_user(&mut self, text: impl Into<String>) -> Uuid {
        self.push(Message::new(text, Sender::User))
    }

    /// Empty bot entry that streamed chunks are written into.
    pub fn push_bot_placeholder(&mut self) -> Uuid {
        self.push(Message::new(String::new(), Sender::Bot))
    }

    fn push(&mut self, message: Message) -> Uuid {
        let id = message.id;
        self.messages.push(message);
        id
    }

    fn get_mut(&mut self, id: Uuid) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    pub fn replace(&mut self, id: Uuid, text: impl Into<String>) {
        if let Some(m) = self.get_mut(id) {
            m.text = text.into();
        }
    }

    /// Apply one stream event to entry `id`. Returns true once the stream is finished.
    pub fn apply(&mut self, id: Uuid, chunk: &StreamChunk) -> bool {
        match chunk {
            StreamChunk::Content { content } => {
                if let Some(m) = self.get_mut(id) {
                    m.text.push_str(content);
                }
                false
            }
            StreamChunk::Done { done } => *done,
            StreamChunk::Error { error } => {
                self.replace(id, error.clone());
                true
            }
        }
    }
}

/// Incremental decoder for `data: <json>` frames.
///
/// Network reads can split a frame anywhere, so partial lines are buffered
/// until their newline arrives.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamChunk> {
        self.buffer.extend_from_slice(bytes);
        let mut chunks = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);

            let Some(payload) = line.strip_prefix("data: ") else {
                continue;
            };
            match serde_json::from_str::<StreamChunk>(payload) {
                Ok(chunk) => chunks.push(chunk),
                Err(e) => tracing::warn!("Error parsing stream data: {}", e),
            }
        }

        chunks
    }
}

#[derive(Debug, Deserialize)]
struct PlainReply {
    message: String,
}

pub struct ChatClient {
    http: Client,
    endpoint: String,
}

impl ChatClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Send `text` and stream the answer into `transcript`.
    ///
    /// `on_content` sees each content payload as it arrives. Returns the id
    /// of the bot entry, which holds an apology if the request failed.
    pub async fn send<F>(&self, transcript: &mut Transcript, text: &str, mut on_content: F) -> Uuid
    where
        F: FnMut(&str),
    {
        transcript.push_user(text);
        let bot_id = transcript.push_bot_placeholder();

        if let Err(e) = self.stream_into(transcript, bot_id, text, &mut on_content).await {
            tracing::error!("Streaming error: {}", e);
            transcript.replace(bot_id, TECHNICAL_ISSUES);
        }

        bot_id
    }

    async fn stream_into<F>(
        &self,
        transcript: &mut Transcript,
        bot_id: Uuid,
        text: &str,
        on_content: &mut F,
    ) -> anyhow::Result<()>
    where
        F: FnMut(&str),
    {
        let body = ChatRequest {
            message: Some(text.to_string()),
        };
        let response = self.http.post(&self.endpoint).json(&body).send().await?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP error! status: {}", response.status());
        }

        let is_event_stream = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/event-stream"));

        if !is_event_stream {
            // the server answered in one piece
            let reply: PlainReply = response.json().await?;
            on_content(&reply.message);
            transcript.replace(bot_id, reply.message);
            return Ok(());
        }

        let mut decoder = SseDecoder::new();
        let mut bytes = response.bytes_stream();
        while let Some(read) = bytes.next().await {
            for chunk in decoder.push(&read?) {
                if let StreamChunk::Content { content } = &chunk {
                    on_content(content);
                }
                if transcript.apply(bot_id, &chunk) {
                    return Ok(());
                }
            }
        }

        anyhow::bail!("stream ended without a done event")
    }
}
