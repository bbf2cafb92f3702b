//! Shared application state.

use std::sync::Arc;

use gateway_config::GatewayConfig;
use gateway_core::GatewayResult;
use gateway_keys::{KeyPool, KeyPoolConfig};
use gateway_upstream::{GeminiClient, GeminiConfig, GeminiLive, LiveConnector};

/// State shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Gateway configuration
    pub config: GatewayConfig,
    /// Rotating API key pool
    pub keys: Arc<KeyPool>,
    /// Upstream HTTP client for generate calls
    pub client: GeminiClient,
    /// Upstream connector for realtime sessions
    pub live: Arc<dyn LiveConnector>,
}

impl AppState {
    /// Create a new state builder
    #[must_use]
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::default()
    }
}

/// Builder for [`AppState`]
#[derive(Default)]
pub struct AppStateBuilder {
    config: GatewayConfig,
    pool_config: KeyPoolConfig,
    live: Option<Arc<dyn LiveConnector>>,
}

impl AppStateBuilder {
    /// Set the gateway configuration
    #[must_use]
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the key pool configuration
    #[must_use]
    pub fn pool_config(mut self, pool_config: KeyPoolConfig) -> Self {
        self.pool_config = pool_config;
        self
    }

    /// Replace the realtime connector, used by tests to stub the upstream
    #[must_use]
    pub fn live_connector(mut self, live: Arc<dyn LiveConnector>) -> Self {
        self.live = Some(live);
        self
    }

    /// Build the application state
    ///
    /// # Errors
    /// Returns an error if the upstream HTTP client cannot be constructed
    pub fn build(self) -> GatewayResult<AppState> {
        let keys = Arc::new(KeyPool::new(self.config.api_keys.clone(), self.pool_config));
        let client = GeminiClient::new(
            GeminiConfig::new()
                .with_base_url(&self.config.upstream_http_url)
                .with_timeout(self.config.upstream_timeout),
        )?;
        let live = self
            .live
            .unwrap_or_else(|| Arc::new(GeminiLive::new(self.config.upstream_ws_url.clone())));

        Ok(AppState {
            config: self.config,
            keys,
            client,
            live,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let state = AppState::builder()
            .config(GatewayConfig::default())
            .build()
            .unwrap();

        assert!(state.keys.is_empty());
        assert_eq!(state.config.default_model, "gemini-2.0-flash");
    }

    #[test]
    fn test_builder_wires_keys_into_pool() {
        use secrecy::SecretString;

        let config = GatewayConfig::default().with_api_keys(vec![
            SecretString::new("key-a".into()),
            SecretString::new("key-b".into()),
        ]);
        let state = AppState::builder().config(config).build().unwrap();

        assert_eq!(state.keys.len(), 2);
        assert_eq!(state.keys.stats().available, 2);
    }
}
