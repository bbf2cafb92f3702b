//! Gemini HTTP client for unary and streamed generation.
//!
//! Talks to the Google AI Studio generative API:
//! - Unary: `{base}/models/{model}:generateContent?key={key}`
//! - Streaming: `{base}/models/{model}:streamGenerateContent?key={key}&alt=sse`

use std::time::Duration;

use async_stream::try_stream;
use futures::stream::BoxStream;
use futures_util::StreamExt;
use gateway_core::{GatewayError, GatewayResult};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, trace};

/// Gemini client configuration
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Base URL of the generative API
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl GeminiConfig {
    /// Create a configuration with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// HTTP client for the Gemini generative API
#[derive(Debug, Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: Client,
}

impl GeminiClient {
    /// Create a new client
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn new(config: GeminiConfig) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(100)
            .build()
            .map_err(|e| GatewayError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Build the endpoint URL for a model
    fn endpoint_url(&self, model: &str, key: &SecretString, streaming: bool) -> String {
        let action = if streaming {
            "streamGenerateContent"
        } else {
            "generateContent"
        };

        let mut url = format!(
            "{}/models/{}:{}?key={}",
            self.config.base_url,
            model,
            action,
            key.expose_secret()
        );
        if streaming {
            url.push_str("&alt=sse");
        }
        url
    }

    /// Send a unary generation request and return the provider's response body
    ///
    /// # Errors
    /// `UpstreamConnect` when the request cannot be sent or the provider
    /// rejects the key, `Protocol` for malformed requests, `UpstreamRuntime`
    /// for provider-side failures
    pub async fn generate(
        &self,
        key: &SecretString,
        model: &str,
        body: &Value,
    ) -> GatewayResult<Value> {
        let url = self.endpoint_url(model, key, false);

        debug!(model = %model, "Sending generation request");

        let response = self.client.post(&url).json(body).send().await.map_err(|e| {
            error!(error = %e, "Gemini request failed");
            GatewayError::upstream_connect(format!("Request failed: {e}"), None)
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::upstream_runtime(format!("Failed to read response: {e}")))?;

        trace!(status = %status, body = %text, "Received Gemini response");

        if !status.is_success() {
            return Err(Self::parse_error(status.as_u16(), &text));
        }

        serde_json::from_str(&text)
            .map_err(|e| GatewayError::upstream_runtime(format!("Invalid response JSON: {e}")))
    }

    /// Send a streaming generation request.
    ///
    /// Yields the text delta of each SSE event in arrival order. Events
    /// without text are skipped.
    ///
    /// # Errors
    /// `UpstreamConnect` when the provider rejects the call before any
    /// content is produced
    pub async fn stream_generate(
        &self,
        key: &SecretString,
        model: &str,
        body: &Value,
    ) -> GatewayResult<BoxStream<'static, GatewayResult<String>>> {
        let url = self.endpoint_url(model, key, true);

        debug!(model = %model, "Sending streaming generation request");

        let response = self.client.post(&url).json(body).send().await.map_err(|e| {
            error!(error = %e, "Gemini streaming request failed");
            GatewayError::upstream_connect(format!("Streaming request failed: {e}"), None)
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Self::parse_error(status.as_u16(), &text));
        }

        let stream = try_stream! {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = chunk_result
                    .map_err(|e| GatewayError::upstream_runtime(format!("Stream error: {e}")))?;

                buffer.push_str(&String::from_utf8_lossy(&chunk));

                // Process complete SSE events
                while let Some(pos) = buffer.find("\n\n") {
                    let event = buffer[..pos].to_string();
                    buffer = buffer[pos + 2..].to_string();

                    for line in event.lines() {
                        if let Some(data) = line.strip_prefix("data: ") {
                            if data == "[DONE]" {
                                return;
                            }

                            if let Ok(parsed) = serde_json::from_str::<StreamChunk>(data) {
                                if let Some(text) = parsed.text() {
                                    yield text;
                                }
                            }
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    /// Map a provider error response onto the gateway taxonomy
    fn parse_error(status: u16, body: &str) -> GatewayError {
        #[derive(Deserialize)]
        struct GoogleErrorResponse {
            error: GoogleErrorDetail,
        }

        #[derive(Deserialize)]
        struct GoogleErrorDetail {
            message: String,
        }

        let message = serde_json::from_str::<GoogleErrorResponse>(body).map_or_else(
            |_| format!("HTTP {status}: {body}"),
            |parsed| parsed.error.message,
        );

        match status {
            400 => GatewayError::protocol(message),
            404 => GatewayError::protocol(format!("model not found: {message}")),
            500..=599 => GatewayError::upstream_runtime(message),
            _ => GatewayError::upstream_connect(message, Some(status)),
        }
    }
}

/// One SSE event from the streaming endpoint
#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<StreamCandidate>,
}

impl StreamChunk {
    /// Concatenated text of the first candidate's parts, `None` when empty
    fn text(self) -> Option<String> {
        let candidate = self.candidates.into_iter().next()?;
        let text: String = candidate
            .content
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamCandidate {
    #[serde(default)]
    content: StreamContent,
}

#[derive(Debug, Default, Deserialize)]
struct StreamContent {
    #[serde(default)]
    parts: Vec<StreamPart>,
}

#[derive(Debug, Deserialize)]
struct StreamPart {
    #[serde(default)]
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_key() -> SecretString {
        SecretString::new("test-key".to_string())
    }

    fn client_for(server: &MockServer) -> GeminiClient {
        GeminiClient::new(GeminiConfig::new().with_base_url(server.uri())).unwrap()
    }

    #[test]
    fn test_endpoint_url() {
        let client = GeminiClient::new(GeminiConfig::new()).unwrap();
        let key = test_key();

        let url = client.endpoint_url("gemini-2.0-flash", &key, false);
        assert!(url.contains("/models/gemini-2.0-flash:generateContent"));
        assert!(url.contains("key=test-key"));
        assert!(!url.contains("alt=sse"));

        let stream_url = client.endpoint_url("gemini-2.0-flash", &key, true);
        assert!(stream_url.contains(":streamGenerateContent"));
        assert!(stream_url.ends_with("&alt=sse"));
    }

    #[tokio::test]
    async fn test_generate_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:generateContent"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "Hello!"}]},
                    "finishReason": "STOP"
                }]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let body = json!({"contents": [{"role": "user", "parts": [{"text": "Hi"}]}]});
        let response = client
            .generate(&test_key(), "gemini-2.0-flash", &body)
            .await
            .unwrap();

        assert_eq!(
            response.pointer("/candidates/0/content/parts/0/text"),
            Some(&json!("Hello!"))
        );
    }

    #[tokio::test]
    async fn test_generate_maps_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": {"code": 500, "message": "backend blew up", "status": "INTERNAL"}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .generate(&test_key(), "gemini-2.0-flash", &json!({"contents": []}))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::UpstreamRuntime { .. }));
        assert!(err.to_string().contains("backend blew up"));
    }

    #[tokio::test]
    async fn test_generate_maps_auth_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {"code": 403, "message": "API key not valid", "status": "PERMISSION_DENIED"}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .generate(&test_key(), "gemini-2.0-flash", &json!({"contents": []}))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GatewayError::UpstreamConnect {
                status: Some(403),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_generate_maps_bad_requests() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": 400, "message": "contents is required", "status": "INVALID_ARGUMENT"}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .generate(&test_key(), "gemini-2.0-flash", &json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_generate_keeps_unparseable_error_bodies() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .generate(&test_key(), "gemini-2.0-flash", &json!({"contents": []}))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("HTTP 503"));
        assert!(err.to_string().contains("upstream unavailable"));
    }

    #[tokio::test]
    async fn test_stream_generate_yields_deltas_in_order() {
        let server = MockServer::start().await;
        let body = "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"He\"}]}}]}\n\n\
                    data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"llo\"}]}}]}\n\n";
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:streamGenerateContent"))
            .and(query_param("alt", "sse"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(body)
                    .append_header("Content-Type", "text/event-stream"),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let mut stream = client
            .stream_generate(&test_key(), "gemini-2.0-flash", &json!({"contents": []}))
            .await
            .unwrap();

        let mut deltas = Vec::new();
        while let Some(delta) = stream.next().await {
            deltas.push(delta.unwrap());
        }
        assert_eq!(deltas, ["He", "llo"]);
    }

    #[tokio::test]
    async fn test_stream_generate_skips_textless_events() {
        let server = MockServer::start().await;
        let body = "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"\"}]}}]}\n\n\
                    data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"ok\"}]},\"finishReason\":\"STOP\"}]}\n\n";
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(body)
                    .append_header("Content-Type", "text/event-stream"),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let mut stream = client
            .stream_generate(&test_key(), "gemini-2.0-flash", &json!({"contents": []}))
            .await
            .unwrap();

        let mut deltas = Vec::new();
        while let Some(delta) = stream.next().await {
            deltas.push(delta.unwrap());
        }
        assert_eq!(deltas, ["ok"]);
    }

    #[tokio::test]
    async fn test_stream_generate_rejected_before_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": {"code": 429, "message": "quota exceeded", "status": "RESOURCE_EXHAUSTED"}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result = client
            .stream_generate(&test_key(), "gemini-2.0-flash", &json!({"contents": []}))
            .await;

        assert!(matches!(
            result,
            Err(GatewayError::UpstreamConnect {
                status: Some(429),
                ..
            })
        ));
    }
}
