//! # Gateway Config
//!
//! Environment-driven configuration for the LLM Edge Gateway:
//! - Upstream API keys (`GEMINI_API_KEYS` / `GEMINI_API_KEY`)
//! - Listen address, port and default model
//! - Upstream endpoints and request timeout

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::env;
use std::time::Duration;

use gateway_core::{GatewayError, GatewayResult};
use secrecy::SecretString;
use tracing::debug;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_HTTP_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_WS_URL: &str =
    "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Gateway configuration, resolved once at startup
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address the server binds to
    pub host: String,
    /// Port the server binds to
    pub port: u16,
    /// Model used when a request names none
    pub default_model: String,
    /// Timeout applied to upstream HTTP requests
    pub upstream_timeout: Duration,
    /// Base URL of the generative HTTP API
    pub upstream_http_url: String,
    /// URL of the bidirectional streaming endpoint
    pub upstream_ws_url: String,
    /// Upstream API keys in rotation order
    pub api_keys: Vec<SecretString>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            default_model: DEFAULT_MODEL.to_string(),
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
            upstream_http_url: DEFAULT_HTTP_URL.to_string(),
            upstream_ws_url: DEFAULT_WS_URL.to_string(),
            api_keys: Vec::new(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from process environment variables.
    ///
    /// # Errors
    /// Returns `GatewayError::Configuration` when no API key is set or a
    /// numeric variable fails to parse.
    pub fn from_env() -> GatewayResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    /// Same conditions as [`GatewayConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> GatewayResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_keys = resolve_api_keys(&lookup)?;
        debug!(keys = api_keys.len(), "API keys loaded");

        let host = lookup("GATEWAY_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port: u16 = match lookup("GATEWAY_PORT") {
            Some(raw) => raw.parse().map_err(|_| {
                GatewayError::configuration(format!("GATEWAY_PORT is not a valid port: {raw}"))
            })?,
            None => DEFAULT_PORT,
        };

        let default_model =
            lookup("GATEWAY_DEFAULT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let upstream_timeout = match lookup("GATEWAY_UPSTREAM_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|_| {
                    GatewayError::configuration(format!(
                        "GATEWAY_UPSTREAM_TIMEOUT_SECS is not a valid number of seconds: {raw}"
                    ))
                })?;
                Duration::from_secs(secs)
            }
            None => DEFAULT_UPSTREAM_TIMEOUT,
        };

        let upstream_http_url =
            lookup("GATEWAY_UPSTREAM_HTTP_URL").unwrap_or_else(|| DEFAULT_HTTP_URL.to_string());
        let upstream_ws_url =
            lookup("GATEWAY_UPSTREAM_WS_URL").unwrap_or_else(|| DEFAULT_WS_URL.to_string());

        Ok(Self {
            host,
            port,
            default_model,
            upstream_timeout,
            upstream_http_url,
            upstream_ws_url,
            api_keys,
        })
    }

    /// Replace the API keys
    #[must_use]
    pub fn with_api_keys(mut self, keys: Vec<SecretString>) -> Self {
        self.api_keys = keys;
        self
    }

    /// Override the default model
    #[must_use]
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Override the upstream request timeout
    #[must_use]
    pub fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }

    /// Override the generative HTTP API base URL
    #[must_use]
    pub fn with_upstream_http_url(mut self, url: impl Into<String>) -> Self {
        self.upstream_http_url = url.into();
        self
    }

    /// Override the bidirectional streaming endpoint URL
    #[must_use]
    pub fn with_upstream_ws_url(mut self, url: impl Into<String>) -> Self {
        self.upstream_ws_url = url.into();
        self
    }
}

/// Resolve API keys from `GEMINI_API_KEYS` (comma separated, preferred) with
/// `GEMINI_API_KEY` as a single-key fallback.
fn resolve_api_keys<F>(lookup: &F) -> GatewayResult<Vec<SecretString>>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup("GEMINI_API_KEYS") {
        let keys: Vec<SecretString> = raw
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| SecretString::new(part.to_string()))
            .collect();
        if !keys.is_empty() {
            return Ok(keys);
        }
    }

    if let Some(single) = lookup("GEMINI_API_KEY") {
        let trimmed = single.trim();
        if !trimmed.is_empty() {
            return Ok(vec![SecretString::new(trimmed.to_string())]);
        }
    }

    Err(GatewayError::configuration(
        "no API keys configured, set GEMINI_API_KEYS or GEMINI_API_KEY",
    ))
}
