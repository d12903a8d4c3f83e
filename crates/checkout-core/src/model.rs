//! Checkout Domain Types

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::input::{format_phone_number, CheckoutInput, MIN_AMOUNT};

/// A validated checkout submission. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// International format, sent with the STK push
    phone_number: String,

    /// As typed, re-sent with every status query
    entered_phone_number: String,

    amount: Decimal,
}

impl CheckoutRequest {
    pub fn new(entered_phone_number: &str, amount: Decimal) -> Self {
        Self {
            phone_number: format_phone_number(entered_phone_number),
            entered_phone_number: entered_phone_number.to_string(),
            amount,
        }
    }

    pub fn phone_number(&self) -> &str {
        &self.phone_number
    }

    pub fn entered_phone_number(&self) -> &str {
        &self.entered_phone_number
    }

    pub const fn amount(&self) -> Decimal {
        self.amount
    }
}

/// Opaque transaction identifier returned by the STK push
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckoutReference(String);

impl CheckoutReference {
    /// Returns `None` for empty or blank identifiers
    pub fn new(s: impl Into<String>) -> Option<Self> {
        let s = s.into();
        if s.trim().is_empty() { None } else { Some(Self(s)) }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CheckoutReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of one checkout controller
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowState {
    #[default]
    Idle,
    Initiating,
    Polling,
    Succeeded,
    Failed,
}

impl FlowState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Initiating => "initiating",
            Self::Polling => "polling",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    /// A submission is in flight; new submissions are ignored
    pub const fn is_busy(&self) -> bool {
        matches!(self, Self::Initiating | Self::Polling)
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for FlowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of a controller
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FlowSnapshot {
    pub state: FlowState,
    pub reference: Option<CheckoutReference>,
    pub poll_attempts: u32,
    pub input: CheckoutInput,
}

/// Flow tunables
#[derive(Clone, Debug)]
pub struct FlowConfig {
    /// STK push attempts before giving up on a reference
    pub max_init_retries: u32,

    /// Wait between STK push attempts that returned no reference
    pub init_backoff: Duration,

    /// Status queries before reporting the transaction unverified
    pub max_poll_retries: u32,

    /// Status query period
    pub poll_interval: Duration,

    pub min_amount: Decimal,

    /// Where to navigate after a confirmed payment
    pub success_route: String,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            max_init_retries: 5,
            init_backoff: Duration::from_secs(1),
            max_poll_retries: 10,
            poll_interval: Duration::from_secs(5),
            min_amount: MIN_AMOUNT,
            success_route: "/about".into(),
        }
    }
}

impl FlowConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_init_retries = std::env::var("CHECKOUT_MAX_INIT_RETRIES")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.max_init_retries);
        let max_poll_retries = std::env::var("CHECKOUT_MAX_POLL_RETRIES")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.max_poll_retries);
        let poll_interval = std::env::var("CHECKOUT_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|n| *n > 0)
            .map_or(defaults.poll_interval, Duration::from_secs);
        let success_route = std::env::var("CHECKOUT_SUCCESS_ROUTE")
            .unwrap_or(defaults.success_route);

        Self {
            max_init_retries,
            max_poll_retries,
            poll_interval,
            success_route,
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reference_rejects_blank() {
        assert!(CheckoutReference::new("").is_none());
        assert!(CheckoutReference::new("   ").is_none());
        assert_eq!(
            CheckoutReference::new("ws_CO_123").unwrap().as_str(),
            "ws_CO_123"
        );
    }

    #[test]
    fn test_state_predicates() {
        assert!(FlowState::Initiating.is_busy());
        assert!(FlowState::Polling.is_busy());
        assert!(!FlowState::Failed.is_busy());
        assert!(FlowState::Succeeded.is_terminal());
        assert!(!FlowState::Idle.is_terminal());
        assert_eq!(serde_json::to_string(&FlowState::Polling).unwrap(), "\"polling\"");
    }

    #[test]
    fn test_config_defaults() {
        let config = FlowConfig::default();
        assert_eq!(config.max_init_retries, 5);
        assert_eq!(config.max_poll_retries, 10);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.init_backoff, Duration::from_secs(1));
        assert_eq!(config.min_amount, dec!(10));
    }
}
