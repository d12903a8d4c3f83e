//! # checkout-core
//!
//! Mobile-money (STK push) checkout flow with a gateway-agnostic abstraction.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      CheckoutFlow                            │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │ Initiation  │  │   Polling   │  │   PaymentGateway    │  │
//! │  │  (backoff)  │──│  (ticker)   │──│   (Strategy)        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! │         │                │                                   │
//! │         └──── Notifier / Navigator (user-facing seams) ─────│
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use checkout_core::{CheckoutFlow, FlowConfig, MockGateway, NotificationFeed};
//!
//! let feed = Arc::new(NotificationFeed::new());
//! let flow = CheckoutFlow::new(Arc::new(MockGateway::new()), feed.clone(), feed, FlowConfig::default());
//!
//! flow.set_phone_number("0712345678");
//! flow.set_amount("500");
//! flow.submit().await?;
//! let outcome = flow.settled().await;
//! ```

pub mod error;
pub mod flow;
pub mod gateway;
pub mod input;
pub mod model;
pub mod notify;
pub mod retry;

pub use error::{CheckoutError, Result};
pub use flow::{CheckoutFlow, Submission};
pub use gateway::{InitiationReply, MockGateway, PaymentGateway, StatusReply};
pub use input::{format_phone_number, is_valid_phone_number, CheckoutInput, QUICK_AMOUNTS};
pub use model::{CheckoutReference, CheckoutRequest, FlowConfig, FlowSnapshot, FlowState};
pub use notify::{Navigator, Notification, NotificationFeed, NotificationLevel, Notifier};
pub use retry::{Attempt, RetryOutcome, RetryPolicy};
