use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};

use crate::config::ModelConfig;
use crate::error::{PapergraphError, Result};

use super::types::{ChatRequest, ChatResponse, Message, ModelRequest, ResponseFormat};
use super::ChatModel;

/// Chat completions client for OpenAI-compatible providers (OpenRouter by default).
///
/// Makes exactly one HTTP request per call; retries and per-call deadlines
/// are the caller's concern.
pub struct ChatClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl ChatClient {
    /// Create a client from model configuration and an API key.
    pub fn new(config: &ModelConfig, api_key: String) -> Result<Self> {
        // Transport ceiling; the caller's per-call timeout is normally hit first
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.saturating_mul(2).max(1)))
            .build()
            .map_err(|e| PapergraphError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn build_request(&self, request: &ModelRequest) -> ChatRequest {
        let (system, response_format) = match &request.response_schema {
            Some(schema) => (
                format!(
                    "{}\n\nRespond with a single JSON object that conforms to this JSON schema:\n{}",
                    request.system, schema
                ),
                Some(ResponseFormat {
                    format_type: "json_object",
                }),
            ),
            None => (request.system.clone(), None),
        };

        ChatRequest {
            model: self.model.clone(),
            messages: vec![Message::system(system), Message::user(request.user.clone())],
            temperature: self.temperature,
            response_format,
        }
    }
}

#[async_trait]
impl ChatModel for ChatClient {
    async fn complete(&self, request: &ModelRequest) -> Result<String> {
        let start = Instant::now();
        let body = self.build_request(request);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PapergraphError::Model(format!("Network error: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return Err(status_error(status, body));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| PapergraphError::Model(format!("Failed to parse response: {}", e)))?;

        log::debug!("Model call to {} took {:?}", self.model, start.elapsed());

        result
            .into_content()
            .ok_or_else(|| PapergraphError::Model("Empty response from model API".to_string()))
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Classify a non-success response.
///
/// Timeouts (408), rate limits (429) and server errors stay retryable;
/// any other client error is a rejection that will not change on retry.
fn status_error(status: StatusCode, body: String) -> PapergraphError {
    let message = match status.as_u16() {
        408 | 429 => return PapergraphError::Model(format!("API error {}: {}", status, body)),
        400 => format!("Bad request: {}", body),
        401 => "Unauthorized: check the API key for the configured provider".to_string(),
        402 => "Payment required: insufficient credits".to_string(),
        403 => format!("Forbidden: {}", body),
        404 => format!("Model not found or endpoint unavailable: {}", body),
        _ if status.is_client_error() => format!("HTTP error {}: {}", status, body),
        _ => return PapergraphError::Model(format!("API error {}: {}", status, body)),
    };
    PapergraphError::ModelRejected {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{Extractor, RetryPolicy};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn client() -> ChatClient {
        let config = ModelConfig {
            base_url: "https://openrouter.ai/api/v1/".to_string(),
            ..ModelConfig::default()
        };
        ChatClient::new(&config, "test-key".to_string()).unwrap()
    }

    #[test]
    fn test_client_new() {
        let client = client();
        assert_eq!(client.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(client.name(), "meta-llama/llama-3.1-8b-instruct");
        assert_eq!(client.temperature, 0.0);
    }

    #[test]
    fn test_structured_request_embeds_schema() {
        let request = ModelRequest::structured(
            "extract things",
            "text",
            serde_json::json!({"type": "object"}),
        );
        let body = client().build_request(&request);
        let system = body.messages[0].content.as_deref().unwrap();
        assert!(system.starts_with("extract things"));
        assert!(system.contains(r#"{"type":"object"}"#));
        assert!(body.response_format.is_some());
    }

    #[test]
    fn test_text_request_has_no_format() {
        let body = client().build_request(&ModelRequest::text("summarize", "paper"));
        assert_eq!(body.messages[0].content.as_deref(), Some("summarize"));
        assert!(body.response_format.is_none());
    }

    #[test]
    fn test_client_errors_are_terminal() {
        for code in [400u16, 401, 402, 403, 404, 422] {
            let err = status_error(StatusCode::from_u16(code).unwrap(), "nope".to_string());
            assert!(
                matches!(err, PapergraphError::ModelRejected { status, .. } if status == code),
                "{} should be rejected, got {}",
                code,
                err
            );
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn test_transient_statuses_are_retryable() {
        for code in [408u16, 429, 500, 502, 503] {
            let err = status_error(StatusCode::from_u16(code).unwrap(), "busy".to_string());
            assert!(matches!(err, PapergraphError::Model(_)), "{} got {}", code, err);
            assert!(err.is_retryable());
        }
    }

    /// Drain one HTTP request (headers plus Content-Length body).
    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut data = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let Ok(n) = socket.read(&mut buf).await else {
                return;
            };
            if n == 0 {
                return;
            }
            data.extend_from_slice(&buf[..n]);

            let text = String::from_utf8_lossy(&data);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if data.len() >= header_end + 4 + content_length {
                    return;
                }
            }
        }
    }

    /// Serve `status_line` to every connection and count the requests.
    async fn fixed_status_server(status_line: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                read_request(&mut socket).await;
                let body = r#"{"error":"denied"}"#;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_line,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}", addr), hits)
    }

    fn local_client(base_url: String) -> ChatClient {
        let config = ModelConfig {
            base_url,
            timeout_secs: 5,
            ..ModelConfig::default()
        };
        ChatClient::new(&config, "bad-key".to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_unauthorized_extraction_is_not_retried() {
        let (base_url, hits) = fixed_status_server("401 Unauthorized").await;
        let extractor = Extractor::new(
            Arc::new(local_client(base_url)),
            RetryPolicy::new(3, Duration::from_secs(5)),
        );

        let err = extractor.extract("Some chunk of a paper.").await.unwrap_err();

        match err {
            PapergraphError::ChunkExtraction { attempts, message, .. } => {
                assert_eq!(attempts, 1);
                assert!(message.contains("401"), "unexpected message: {}", message);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let (base_url, hits) = fixed_status_server("503 Service Unavailable").await;
        let extractor = Extractor::new(
            Arc::new(local_client(base_url)),
            RetryPolicy::new(2, Duration::from_secs(5)),
        );

        let err = extractor.extract("Some chunk of a paper.").await.unwrap_err();

        assert!(matches!(err, PapergraphError::ChunkExtraction { attempts: 2, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    // Calls against a live provider need a real API key and are not run here.
}
