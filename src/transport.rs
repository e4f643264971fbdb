use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::time::sleep;

use crate::config::GeminiConfig;
use crate::error::{AssistantError, Result};
use crate::models::{GeminiRequest, GeminiResponse};

const MAX_BACKOFF: Duration = Duration::from_secs(5);
/// 200ms * 2^6 already exceeds `MAX_BACKOFF`.
const MAX_BACKOFF_EXPONENT: u32 = 6;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn generate(&self, req: &GeminiRequest) -> Result<GeminiResponse>;
}

pub struct GeminiTransport {
    client: Client,
    api_key: String,
    endpoint: String,
    max_attempts: u32,
}

impl GeminiTransport {
    pub fn new(cfg: &GeminiConfig, timeout: Duration, max_attempts: u32) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: cfg.api_key.clone(),
            endpoint: generate_url(&cfg.api_base, &cfg.model),
            max_attempts: max_attempts.max(1),
        })
    }
}

pub fn generate_url(api_base: &str, model: &str) -> String {
    format!(
        "{}/v1beta/models/{}:generateContent",
        api_base.trim_end_matches('/'),
        model
    )
}

/// Server-side and network failures are worth another try; quota and
/// request errors are not.
fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error()
}

fn backoff_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
    let base = Duration::from_millis(200 * 2u64.pow(exponent));
    let jitter = rand::thread_rng().gen_range(0.8..=1.2);
    let delay = Duration::from_millis((base.as_millis() as f64 * jitter) as u64);
    std::cmp::min(delay, MAX_BACKOFF)
}

#[async_trait]
impl Transport for GeminiTransport {
    async fn generate(&self, req: &GeminiRequest) -> Result<GeminiResponse> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            let outcome = self
                .client
                .post(&self.endpoint)
                .header("x-goog-api-key", &self.api_key)
                .json(req)
                .send()
                .await;

            let err = match outcome {
                Ok(response) if response.status().is_success() => {
                    return response.json().await.map_err(|e| {
                        AssistantError::Internal(format!("Failed to parse Gemini response: {e}"))
                    });
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    let err = AssistantError::Upstream {
                        status: status.as_u16(),
                        body,
                    };
                    if !is_retryable(status) {
                        return Err(err);
                    }
                    err
                }
                Err(e) => AssistantError::Http(e),
            };

            if attempts >= self.max_attempts {
                tracing::error!(attempts, error = %err, "Gemini request failed");
                return Err(err);
            }

            tracing::warn!(attempts, error = %err, "Gemini request failed, retrying");
            sleep(backoff_delay(attempts)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, extract::State, http::HeaderMap, routing::post};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    struct FakeGemini {
        hits: Arc<AtomicUsize>,
        fail_first: usize,
        fail_status: StatusCode,
    }

    async fn handler(
        State(fake): State<FakeGemini>,
        headers: HeaderMap,
        Json(body): Json<serde_json::Value>,
    ) -> (StatusCode, Json<serde_json::Value>) {
        let n = fake.hits.fetch_add(1, Ordering::SeqCst);
        if n < fake.fail_first {
            return (fake.fail_status, Json(serde_json::json!({"error": "nope"})));
        }
        let key = headers
            .get("x-goog-api-key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let prompt = body["contents"][0]["parts"][0]["text"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        (
            StatusCode::OK,
            Json(serde_json::json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": format!("{key}|{prompt}")}]}}]
            })),
        )
    }

    async fn spawn_fake(fail_first: usize, fail_status: StatusCode) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let fake = FakeGemini {
            hits: hits.clone(),
            fail_first,
            fail_status,
        };
        let app = Router::new()
            .route("/v1beta/models/:model", post(handler))
            .with_state(fake);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), hits)
    }

    fn config(api_base: String) -> GeminiConfig {
        GeminiConfig {
            api_key: "test-key".to_string(),
            model: "gemini-1.5-flash".to_string(),
            api_base,
            temperature: 0.0,
            max_output_tokens: 64,
        }
    }

    #[test]
    fn test_generate_url_shape() {
        assert_eq!(
            generate_url("https://generativelanguage.googleapis.com/", "gemini-1.5-flash"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn test_backoff_is_capped() {
        assert!(backoff_delay(1) <= Duration::from_millis(240));
        assert!(backoff_delay(30) <= MAX_BACKOFF);
        // large attempt counts saturate at the cap instead of overflowing
        assert_eq!(backoff_delay(64), MAX_BACKOFF);
        assert_eq!(backoff_delay(u32::MAX), MAX_BACKOFF);
    }

    #[tokio::test]
    async fn test_gemini_transport_sends_key_and_prompt() {
        let (base, hits) = spawn_fake(0, StatusCode::OK).await;
        let tx = GeminiTransport::new(&config(base), Duration::from_secs(5), 2).unwrap();

        let resp = tx
            .generate(&GeminiRequest::from_prompt("hello", None))
            .await
            .unwrap();

        assert_eq!(resp.text().as_deref(), Some("test-key|hello"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gemini_transport_retries_server_errors() {
        let (base, hits) = spawn_fake(1, StatusCode::SERVICE_UNAVAILABLE).await;
        let tx = GeminiTransport::new(&config(base), Duration::from_secs(5), 2).unwrap();

        let resp = tx
            .generate(&GeminiRequest::from_prompt("again", None))
            .await
            .unwrap();

        assert_eq!(resp.text().as_deref(), Some("test-key|again"));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gemini_transport_does_not_retry_quota_errors() {
        let (base, hits) = spawn_fake(10, StatusCode::TOO_MANY_REQUESTS).await;
        let tx = GeminiTransport::new(&config(base), Duration::from_secs(5), 3).unwrap();

        let err = tx
            .generate(&GeminiRequest::from_prompt("quota", None))
            .await
            .unwrap_err();

        assert!(matches!(err, AssistantError::Upstream { status: 429, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
