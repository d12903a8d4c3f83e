//! # checkout-runtime
//!
//! Gateway implementations for the checkout flow.
//!
//! ## Gateways
//!
//! - **HTTP** (default): the checkout API's `/stkpush/` and `/query/` endpoints
//! - **Mock**: scripted replies, re-exported from `checkout-core`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use checkout_runtime::HttpGateway;
//!
//! let gateway = Arc::new(HttpGateway::from_env()?);
//! let flow = CheckoutFlow::new(gateway, notifier, navigator, FlowConfig::from_env());
//! ```

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{HttpGateway, HttpGatewayConfig};

// Re-export core types for convenience
pub use checkout_core::{
    CheckoutError, CheckoutFlow, FlowConfig, FlowState, MockGateway, PaymentGateway, Result,
};
