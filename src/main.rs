//! # LLM Edge Gateway
//!
//! Edge gateway in front of the Gemini generative APIs.
//!
//! ## Features
//!
//! - Unary and streaming relay of generation requests
//! - Realtime WebSocket bridge to the live API
//! - Rotating API key pool with failure cooldowns
//!
//! ## Usage
//!
//! ```bash
//! # Start with keys from the environment
//! GEMINI_API_KEYS=key-a,key-b llm-edge-gateway
//!
//! # Start with environment overrides
//! GATEWAY_PORT=9000 GEMINI_API_KEY=key-a llm-edge-gateway
//! ```

use gateway_config::GatewayConfig;
use gateway_server::{AppState, Server, ServerConfig};
use gateway_telemetry::{init_logging, LoggingConfig};
use tracing::{error, info};

/// Application entry point
#[tokio::main]
async fn main() {
    // Initialize logging first
    let json_logs = std::env::var("GATEWAY_LOG_JSON")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    if let Err(e) = init_logging(&LoggingConfig::new().with_level("info").with_json(json_logs)) {
        eprintln!("Failed to initialize logging: {e}");
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting LLM Edge Gateway"
    );

    // Run the application
    if let Err(e) = run().await {
        error!(error = %e, "Application failed");
        std::process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = GatewayConfig::from_env()?;

    info!(
        host = %config.host,
        port = config.port,
        keys = config.api_keys.len(),
        model = %config.default_model,
        "Configuration loaded"
    );

    // Build application state
    let state = AppState::builder().config(config.clone()).build()?;

    // Create server
    let server_config = ServerConfig::new()
        .with_host(&config.host)
        .with_port(config.port);

    let server = Server::new(server_config, state);

    // Run server
    server.run().await?;

    Ok(())
}
