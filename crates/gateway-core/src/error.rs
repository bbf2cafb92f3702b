//! Error types for the edge gateway.
//!
//! Every component reports failures through [`GatewayError`]. The HTTP and
//! WebSocket boundaries translate variants into status codes and close codes
//! via [`GatewayError::status_code`] and [`GatewayError::close_code`].

use thiserror::Error;

/// Convenience result alias used throughout the gateway
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Central error type for the edge gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No API keys were configured at startup
    #[error("no API keys configured")]
    NoKeysConfigured,

    /// Every configured key is inside its cool-down window
    #[error("all {total} API keys are temporarily blocked")]
    KeysExhausted {
        /// Size of the pool, all of it blocked
        total: usize,
    },

    /// The upstream provider rejected or never accepted the call
    #[error("upstream connect failed: {message}")]
    UpstreamConnect {
        /// What the provider rejected
        message: String,
        /// HTTP status returned by the provider, when there was one
        status: Option<u16>,
    },

    /// The upstream provider failed after accepting the call
    #[error("upstream runtime failure: {message}")]
    UpstreamRuntime {
        /// How the accepted call failed
        message: String,
    },

    /// The inbound request or frame could not be understood
    #[error("protocol error: {message}")]
    Protocol {
        /// What was malformed
        message: String,
    },

    /// Invalid or missing configuration
    #[error("configuration error: {message}")]
    Configuration {
        /// What is misconfigured
        message: String,
    },

    /// Unexpected internal failure
    #[error("internal error: {message}")]
    Internal {
        /// What went wrong
        message: String,
    },
}

impl GatewayError {
    /// Create an upstream connect error
    pub fn upstream_connect(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::UpstreamConnect {
            message: message.into(),
            status,
        }
    }

    /// Create an upstream runtime error
    pub fn upstream_runtime(message: impl Into<String>) -> Self {
        Self::UpstreamRuntime {
            message: message.into(),
        }
    }

    /// Create a protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the caller may reasonably retry the request.
    ///
    /// Exhaustion clears once a cool-down expires, and a retry after an
    /// upstream failure lands on a different key through rotation.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::KeysExhausted { .. } | Self::UpstreamConnect { .. } | Self::UpstreamRuntime { .. }
        )
    }

    /// HTTP status code for this error at the REST boundary
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NoKeysConfigured | Self::Configuration { .. } | Self::Internal { .. } => 500,
            Self::KeysExhausted { .. } => 503,
            Self::UpstreamConnect { .. } | Self::UpstreamRuntime { .. } => 502,
            Self::Protocol { .. } => 400,
        }
    }

    /// WebSocket close code for this error at the realtime boundary.
    ///
    /// Key starvation is a policy violation (1008); everything else that
    /// forces a close is an internal error (1011).
    #[must_use]
    pub fn close_code(&self) -> u16 {
        match self {
            Self::NoKeysConfigured | Self::KeysExhausted { .. } => 1008,
            _ => 1011,
        }
    }

    /// Machine-readable error class for response bodies
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::NoKeysConfigured | Self::Configuration { .. } => "configuration_error",
            Self::KeysExhausted { .. } => "exhaustion_error",
            Self::UpstreamConnect { .. } => "upstream_connect_error",
            Self::UpstreamRuntime { .. } => "upstream_runtime_error",
            Self::Protocol { .. } => "protocol_error",
            Self::Internal { .. } => "internal_error",
        }
    }
}
