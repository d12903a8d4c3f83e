//! Application State

use std::sync::Arc;

use checkout_core::{FlowConfig, PaymentGateway};

use crate::session::SessionRegistry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Payment gateway (HTTP or mock)
    pub gateway: Arc<dyn PaymentGateway>,

    /// Tunables handed to every new checkout flow
    pub config: FlowConfig,

    /// Live checkout sessions
    pub sessions: Arc<SessionRegistry>,
}
