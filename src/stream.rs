//! Re-chunks a finished answer into paced stream events.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::models::StreamChunk;

const CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy)]
pub struct StreamEmitter {
    chunk_words: usize,
    delay: Duration,
}

impl StreamEmitter {
    pub fn new(chunk_words: usize, delay: Duration) -> Self {
        Self {
            chunk_words: chunk_words.max(1),
            delay,
        }
    }

    /// Split `text` into batches of `chunk_words` space-separated tokens.
    ///
    /// Every batch but the last keeps a trailing space, so the batches
    /// concatenate back to `text` exactly.
    pub fn chunks(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        let words: Vec<&str> = text.split(' ').collect();
        let batches: Vec<_> = words.chunks(self.chunk_words).collect();
        let last = batches.len() - 1;
        batches
            .into_iter()
            .enumerate()
            .map(|(i, batch)| {
                let mut chunk = batch.join(" ");
                if i < last {
                    chunk.push(' ');
                }
                chunk
            })
            .collect()
    }

    /// Run `answer` on its own task and stream the result.
    ///
    /// If the task dies before producing text, `fallback` is sent instead.
    /// The stream always ends with `done` unless the receiver goes away first,
    /// in which case a still-running `answer` is aborted.
    pub fn spawn<F>(&self, answer: F, fallback: String) -> ReceiverStream<StreamChunk>
    where
        F: Future<Output = String> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let emitter = *self;

        tokio::spawn(async move {
            let mut task = tokio::spawn(answer);
            let joined = tokio::select! {
                joined = &mut task => joined,
                _ = tx.closed() => {
                    tracing::debug!("Client went away before the answer was ready");
                    task.abort();
                    return;
                }
            };
            let text = match joined {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("Streaming error: {}", e);
                    if tx.send(StreamChunk::content(fallback)).await.is_ok() {
                        let _ = tx.send(StreamChunk::done()).await;
                    }
                    return;
                }
            };
            emitter.emit(&text, &tx).await;
        });

        ReceiverStream::new(rx)
    }

    /// Send `text` as content events followed by `done`.
    pub async fn emit(&self, text: &str, tx: &mpsc::Sender<StreamChunk>) {
        let chunks = self.chunks(text);
        tracing::debug!(chunks = chunks.len(), "Starting stream");
        let last = chunks.len().saturating_sub(1);

        for (i, chunk) in chunks.into_iter().enumerate() {
            if tx.send(StreamChunk::content(chunk)).await.is_err() {
                tracing::debug!("Client went away mid-stream");
                return;
            }
            if i < last && !self.delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.delay) => {}
                    _ = tx.closed() => {
                        tracing::debug!("Client went away mid-stream");
                        return;
                    }
                }
            }
        }

        let _ = tx.send(StreamChunk::done()).await;
    }
}
