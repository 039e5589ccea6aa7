//! docaudit API server
//!
//! HTTP glue around the compliance-engine pipeline. Provides REST API
//! endpoints for:
//!
//! - Document upload (base64 PDF)
//! - Comprehensive compliance analysis (GDPR/SOC2/HIPAA)
//! - Annotation listing and triage
//!
//! ## Architecture
//!
//! The server wires the engine to in-memory stores and an optional HTTP
//! model provider, providing:
//!
//! - Rate limiting via tower-governor
//! - CORS for browser clients
//! - Structured logging via tracing

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use clap::Parser;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use compliance_engine::{
    ComplianceEngine, EngineConfig, EngineStores, ModelClient, NoopClient,
};

mod api;
mod error;

use api::{
    handle_analyze, handle_health, handle_list_annotations, handle_list_frameworks,
    handle_resolve_annotation, handle_upload_document,
};

/// Command-line arguments for the docaudit server
#[derive(Parser, Debug)]
#[command(name = "docaudit-server")]
#[command(about = "docaudit API server for document compliance analysis")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Rate limit: requests per second per IP
    #[arg(long, default_value = "10")]
    rate_limit: u32,

    /// Concurrent in-flight model calls per analysis
    #[arg(long, default_value = "3")]
    max_concurrent_batches: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ComplianceEngine>,
    pub stores: EngineStores,
}

/// Pick a model client from the environment. Without a configured provider
/// the server still runs; analyses simply produce zero findings.
fn build_model_client() -> Arc<dyn ModelClient> {
    #[cfg(feature = "anthropic")]
    if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
        let model = std::env::var("ANTHROPIC_MODEL")
            .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string());
        match compliance_engine::providers::AnthropicClient::new(key, model) {
            Ok(client) => {
                info!("using Anthropic model provider");
                return Arc::new(compliance_engine::RetryingClient::new(client));
            }
            Err(e) => warn!("failed to build Anthropic client: {}", e),
        }
    }

    #[cfg(feature = "openai")]
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        let model =
            std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        match compliance_engine::providers::OpenAiClient::new(key, model) {
            Ok(client) => {
                info!("using OpenAI model provider");
                return Arc::new(compliance_engine::RetryingClient::new(client));
            }
            Err(e) => warn!("failed to build OpenAI client: {}", e),
        }
    }

    warn!("no model provider configured; analyses will return zero findings");
    Arc::new(NoopClient)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting docaudit server on {}:{}", args.host, args.port);

    // Create rate limiter configuration
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(args.rate_limit.into())
            .burst_size(args.rate_limit * 2)
            .finish()
            .expect("Failed to create rate limiter config"),
    );

    // Wire the engine
    let stores = EngineStores::in_memory();
    let engine = ComplianceEngine::new(stores.clone(), build_model_client()).with_config(
        EngineConfig {
            max_concurrent_batches: args.max_concurrent_batches.max(1),
            ..EngineConfig::default()
        },
    );
    let state = AppState {
        engine: Arc::new(engine),
        stores,
    };

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        // Health check
        .route("/health", get(handle_health))
        // API endpoints
        .route("/api/frameworks", get(handle_list_frameworks))
        .route("/api/documents", post(handle_upload_document))
        .route("/api/analyze", post(handle_analyze))
        .route(
            "/api/documents/:document_id/annotations",
            get(handle_list_annotations),
        )
        .route(
            "/api/annotations/:annotation_id/resolve",
            post(handle_resolve_annotation),
        )
        // Apply middleware
        .layer(GovernorLayer {
            config: governor_conf,
        })
        .layer(cors)
        .with_state(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Rate limit: {} requests/second per IP", args.rate_limit);

    axum::serve(listener, app).await?;

    Ok(())
}
