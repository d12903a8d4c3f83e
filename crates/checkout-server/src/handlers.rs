//! HTTP Handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use checkout_core::{
    CheckoutError, CheckoutInput, FlowSnapshot, Notification, Submission, QUICK_AMOUNTS,
};

use crate::session::CheckoutSession;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub gateway: String,
    pub active_sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    pub phone_number: String,
    /// Accepts `"500"` or `500`, as typed in the form
    pub amount: serde_json::Value,
}

impl CheckoutBody {
    fn into_input(self) -> CheckoutInput {
        let amount = match self.amount {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        };
        CheckoutInput::new(self.phone_number, amount)
    }
}

#[derive(Debug, Serialize)]
pub struct CheckoutView {
    pub id: Uuid,
    #[serde(flatten)]
    pub snapshot: FlowSnapshot,
    pub notifications: Vec<Notification>,
    pub redirect: Option<String>,
}

impl From<&CheckoutSession> for CheckoutView {
    fn from(session: &CheckoutSession) -> Self {
        Self {
            id: session.id,
            snapshot: session.flow.snapshot(),
            notifications: session.feed.notifications(),
            redirect: session.redirect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QuickAmountsResponse {
    pub amounts: Vec<u32>,
    pub minimum: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        gateway: state.gateway.name().to_string(),
        active_sessions: state.sessions.len(),
    })
}

/// Preset amounts for the quick-add buttons
pub async fn quick_amounts(State(state): State<AppState>) -> Json<QuickAmountsResponse> {
    Json(QuickAmountsResponse {
        amounts: QUICK_AMOUNTS.to_vec(),
        minimum: state.config.min_amount.to_string(),
    })
}

/// Start a checkout: validate, push, and begin polling
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutBody>,
) -> Result<(StatusCode, Json<CheckoutView>), ApiError> {
    state.sessions.prune();

    let session = Arc::new(CheckoutSession::new(state.gateway.clone(), state.config.clone()));
    session.flow.set_input(payload.into_input());

    match session.flow.submit().await {
        Ok(Submission::Polling(reference)) => {
            tracing::info!(session = %session.id, reference = %reference, "Checkout polling");
            state.sessions.insert(session.clone());
            Ok((StatusCode::CREATED, Json(CheckoutView::from(session.as_ref()))))
        }
        Ok(Submission::Ignored | Submission::Cancelled) => Err(api_error(
            StatusCode::CONFLICT,
            "Checkout was not started",
            "CHECKOUT_NOT_STARTED",
        )),
        Err(err @ CheckoutError::Validation(_)) => Err(api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            err.user_message(),
            "VALIDATION_ERROR",
        )),
        Err(err) => {
            tracing::error!(session = %session.id, "Checkout initiation error: {}", err);
            Err(api_error(StatusCode::BAD_GATEWAY, err.user_message(), "INITIATION_FAILED"))
        }
    }
}

/// Current state, notifications and redirect of a checkout
pub async fn get_checkout(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CheckoutView>, ApiError> {
    state
        .sessions
        .get(&id)
        .map(|session| Json(CheckoutView::from(session.as_ref())))
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Checkout not found", "NOT_FOUND"))
}

/// Abandon a checkout; stops polling
pub async fn cancel_checkout(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .sessions
        .remove(&id)
        .map(|_| {
            tracing::info!(session = %id, "Checkout discarded");
            StatusCode::NO_CONTENT
        })
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Checkout not found", "NOT_FOUND"))
}
