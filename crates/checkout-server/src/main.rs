//! Checkout HTTP Server
//!
//! Axum-based server hosting STK push checkout sessions. Each session runs
//! its own flow controller; clients poll the session for notifications and
//! the post-payment redirect.

mod handlers;
mod session;
mod state;

use std::sync::Arc;

use axum::{routing::{get, post}, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use checkout_core::{FlowConfig, MockGateway, PaymentGateway};
use checkout_runtime::HttpGateway;

use crate::handlers::{cancel_checkout, create_checkout, get_checkout, health_check, quick_amounts};
use crate::session::SessionRegistry;
use crate::state::AppState;

/// Polls the mock gateway takes to confirm a payment
const MOCK_APPROVAL_POLLS: u32 = 3;

fn build_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & info
        .route("/health", get(health_check))
        .route("/api/quick-amounts", get(quick_amounts))

        // Checkout
        .route("/api/checkout", post(create_checkout))
        .route("/api/checkout/{id}", get(get_checkout).delete(cancel_checkout))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn gateway_from_env() -> anyhow::Result<Arc<dyn PaymentGateway>> {
    let kind = std::env::var("CHECKOUT_GATEWAY").unwrap_or_else(|_| "http".into());

    match kind.as_str() {
        "mock" => {
            tracing::warn!("⚠ Using mock gateway - no real payments");
            Ok(Arc::new(MockGateway::approving_after(MOCK_APPROVAL_POLLS)))
        }
        "http" => {
            let gateway = HttpGateway::from_env()?;
            tracing::info!("✓ Checkout API at {}", gateway.config().base_url);
            Ok(Arc::new(gateway))
        }
        other => anyhow::bail!("unknown CHECKOUT_GATEWAY '{other}' (expected 'http' or 'mock')"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let gateway = gateway_from_env()?;
    let config = FlowConfig::from_env();

    tracing::info!(
        max_init_retries = config.max_init_retries,
        max_poll_retries = config.max_poll_retries,
        poll_interval_secs = config.poll_interval.as_secs(),
        success_route = %config.success_route,
        "Flow configuration"
    );

    let state = AppState {
        gateway,
        config,
        sessions: Arc::new(SessionRegistry::default()),
    };

    let app = build_router(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 checkout server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET    /health             - Health check");
    tracing::info!("  GET    /api/quick-amounts  - Preset amounts");
    tracing::info!("  POST   /api/checkout       - Start STK push checkout");
    tracing::info!("  GET    /api/checkout/{{id}}  - Checkout status");
    tracing::info!("  DELETE /api/checkout/{{id}}  - Discard checkout");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
