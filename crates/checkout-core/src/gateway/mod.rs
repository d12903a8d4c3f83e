//! Payment Gateway Abstraction
//!
//! The mobile-money API the flow talks to: an STK push that yields a checkout
//! reference, and a status query keyed by that reference.
//!
//! Implement [`PaymentGateway`] for each backend. The HTTP implementation
//! lives in `checkout-runtime`; [`MockGateway`] is a scripted stand-in for
//! tests and demos.

mod mock;

pub use mock::MockGateway;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;
use crate::model::{CheckoutReference, CheckoutRequest};

/// The one result code that means the payment went through
pub const SUCCESS_RESULT_CODE: &str = "0";

/// Body of `POST /stkpush/`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StkPushRequest {
    pub phone_number: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

impl From<&CheckoutRequest> for StkPushRequest {
    fn from(request: &CheckoutRequest) -> Self {
        Self {
            phone_number: request.phone_number().to_string(),
            amount: request.amount(),
        }
    }
}

/// Body returned by `POST /stkpush/`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StkPushResponse {
    #[serde(rename = "CheckoutRequestID", default, skip_serializing_if = "Option::is_none")]
    pub checkout_request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StkPushResponse {
    /// Classify a response given whether the HTTP status was a success.
    pub fn into_reply(self, status_ok: bool) -> InitiationReply {
        if !status_ok {
            return InitiationReply::Rejected(
                self.error
                    .unwrap_or_else(|| "Failed to initiate STK Push.".into()),
            );
        }

        self.checkout_request_id
            .and_then(CheckoutReference::new)
            .map_or(InitiationReply::Pending, InitiationReply::Accepted)
    }
}

/// Outcome of one STK push call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InitiationReply {
    /// Reference issued
    Accepted(CheckoutReference),
    /// Accepted but no reference yet
    Pending,
    /// Explicit refusal with the gateway's message
    Rejected(String),
}

/// Body of `POST /query/`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusQuery {
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "PhoneNumber")]
    pub phone_number: String,
    #[serde(rename = "Amount", with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

impl StatusQuery {
    pub fn new(reference: &CheckoutReference, request: &CheckoutRequest) -> Self {
        Self {
            checkout_request_id: reference.as_str().to_string(),
            phone_number: request.entered_phone_number().to_string(),
            amount: request.amount(),
        }
    }
}

/// Body returned by `POST /query/`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(
        rename = "ResultCode",
        default,
        deserialize_with = "result_code",
        skip_serializing_if = "Option::is_none"
    )]
    pub result_code: Option<String>,
    #[serde(rename = "ResultDesc", default, skip_serializing_if = "Option::is_none")]
    pub result_desc: Option<String>,
}

impl StatusResponse {
    /// Classify a response given whether the HTTP status was a success.
    ///
    /// Non-success statuses and bodies without a result code are not
    /// terminal: the transaction is usually still being processed.
    pub fn into_reply(self, status_ok: bool) -> StatusReply {
        match self.result_code {
            Some(code) if status_ok && code == SUCCESS_RESULT_CODE => StatusReply::Succeeded,
            Some(code) if status_ok => StatusReply::Failed {
                code,
                description: self
                    .result_desc
                    .unwrap_or_else(|| "Unknown reason".into()),
            },
            _ => StatusReply::Pending,
        }
    }
}

/// Outcome of one status query
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusReply {
    Succeeded,
    Failed { code: String, description: String },
    Pending,
}

/// Result codes arrive as strings, but some deployments send bare numbers
fn result_code<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Gateway trait (Strategy pattern)
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Ask the payer's phone for a PIN prompt
    async fn stk_push(&self, request: &StkPushRequest) -> Result<InitiationReply>;

    /// Check where a pushed transaction stands
    async fn query_status(&self, query: &StatusQuery) -> Result<StatusReply>;

    /// Gateway name
    fn name(&self) -> &str;
}
