//! HTTP Payment Gateway
//!
//! Implementation of `PaymentGateway` against the checkout API's
//! `/stkpush/` and `/query/` endpoints.

use std::time::Duration;

use async_trait::async_trait;
use checkout_core::{
    error::{CheckoutError, Result},
    gateway::{
        InitiationReply, PaymentGateway, StatusQuery, StatusReply, StatusResponse, StkPushRequest,
        StkPushResponse,
    },
};
use reqwest::Client;

/// HTTP gateway configuration
#[derive(Clone, Debug)]
pub struct HttpGatewayConfig {
    /// API root, e.g. `https://api.kibeezy.com/api`
    pub base_url: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for HttpGatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.kibeezy.com/api".into(),
            timeout_secs: 30,
        }
    }
}

impl HttpGatewayConfig {
    pub fn from_env() -> Self {
        let base_url = std::env::var("CHECKOUT_API_URL")
            .unwrap_or_else(|_| Self::default().base_url);
        let timeout_secs = std::env::var("CHECKOUT_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(30);

        Self {
            base_url,
            timeout_secs,
        }
    }
}

/// reqwest-backed gateway
pub struct HttpGateway {
    client: Client,
    config: HttpGatewayConfig,
}

impl HttpGateway {
    /// Create a gateway for an API root with default settings
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::from_config(HttpGatewayConfig {
            base_url: base_url.into(),
            ..Default::default()
        })
    }

    /// Create from configuration
    pub fn from_config(config: HttpGatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CheckoutError::Config(format!("HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(HttpGatewayConfig::from_env())
    }

    pub fn config(&self) -> &HttpGatewayConfig {
        &self.config
    }

    /// The API expects trailing slashes
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}/", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post<B: serde::Serialize + Sync>(&self, path: &str, body: &B) -> Result<(bool, Vec<u8>)> {
        let response = self
            .client
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await
            .map_err(|e| CheckoutError::Transport(e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| CheckoutError::Transport(e.to_string()))?;

        tracing::debug!(path, status = %status, len = bytes.len(), "Gateway response");
        Ok((status.is_success(), bytes.to_vec()))
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn stk_push(&self, request: &StkPushRequest) -> Result<InitiationReply> {
        let (ok, body) = self.post("stkpush", request).await?;

        let parsed = serde_json::from_slice::<StkPushResponse>(&body)
            .map_err(|e| CheckoutError::Transport(format!("invalid STK push response: {e}")))?;
        tracing::debug!(?parsed, "STK push response");
        Ok(parsed.into_reply(ok))
    }

    async fn query_status(&self, query: &StatusQuery) -> Result<StatusReply> {
        let (ok, body) = self.post("query", query).await?;

        serde_json::from_slice::<StatusResponse>(&body)
            .map(|parsed| parsed.into_reply(ok))
            .map_err(|e| CheckoutError::Transport(format!("invalid status response: {e}")))
    }

    fn name(&self) -> &str {
        "HttpGateway"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use checkout_core::CheckoutReference;
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/api")
    }

    fn push_request() -> StkPushRequest {
        StkPushRequest {
            phone_number: "254712345678".into(),
            amount: dec!(100),
        }
    }

    fn status_query() -> StatusQuery {
        StatusQuery {
            checkout_request_id: "ws_CO_1".into(),
            phone_number: "0712345678".into(),
            amount: dec!(100),
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = HttpGatewayConfig::default();
        assert_eq!(config.base_url, "https://api.kibeezy.com/api");
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_endpoint_trailing_slash() {
        let gateway = HttpGateway::new("http://localhost:8000/api/").unwrap();
        assert_eq!(gateway.endpoint("stkpush"), "http://localhost:8000/api/stkpush/");
    }

    #[tokio::test]
    async fn test_stk_push_accepted() {
        let app = Router::new().route(
            "/api/stkpush/",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body, json!({"phone_number": "254712345678", "amount": 100.0}));
                Json(json!({"CheckoutRequestID": "ws_CO_1", "ResponseCode": "0"}))
            }),
        );
        let gateway = HttpGateway::new(serve(app).await).unwrap();

        let reply = gateway.stk_push(&push_request()).await.unwrap();
        assert_eq!(
            reply,
            InitiationReply::Accepted(CheckoutReference::new("ws_CO_1").unwrap())
        );
    }

    #[tokio::test]
    async fn test_stk_push_refused() {
        let app = Router::new().route(
            "/api/stkpush/",
            post(|| async { (StatusCode::BAD_REQUEST, Json(json!({"error": "Invalid amount"}))) }),
        );
        let gateway = HttpGateway::new(serve(app).await).unwrap();

        let reply = gateway.stk_push(&push_request()).await.unwrap();
        assert_eq!(reply, InitiationReply::Rejected("Invalid amount".into()));
    }

    #[tokio::test]
    async fn test_stk_push_error_page() {
        let app = Router::new().route(
            "/api/stkpush/",
            post(|| async { (StatusCode::BAD_GATEWAY, "<html>upstream down</html>") }),
        );
        let gateway = HttpGateway::new(serve(app).await).unwrap();

        let err = gateway.stk_push(&push_request()).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(
            err.user_message(),
            "An unexpected error occurred. Please try again later."
        );
    }

    #[tokio::test]
    async fn test_stk_push_refused_without_message() {
        let app = Router::new().route(
            "/api/stkpush/",
            post(|| async { (StatusCode::BAD_REQUEST, Json(json!({}))) }),
        );
        let gateway = HttpGateway::new(serve(app).await).unwrap();

        let reply = gateway.stk_push(&push_request()).await.unwrap();
        assert_eq!(reply, InitiationReply::Rejected("Failed to initiate STK Push.".into()));
    }

    #[tokio::test]
    async fn test_query_outcomes() {
        let app = Router::new().route(
            "/api/query/",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["CheckoutRequestID"], "ws_CO_1");
                assert_eq!(body["PhoneNumber"], "0712345678");
                Json(json!({"ResultCode": "0", "ResultDesc": "The service request is processed successfully."}))
            }),
        );
        let gateway = HttpGateway::new(serve(app).await).unwrap();
        assert_eq!(
            gateway.query_status(&status_query()).await.unwrap(),
            StatusReply::Succeeded
        );

        let processing = Router::new().route(
            "/api/query/",
            post(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"errorCode": "500.001.1001", "errorMessage": "The transaction is being processed"})),
                )
            }),
        );
        let gateway = HttpGateway::new(serve(processing).await).unwrap();
        assert_eq!(
            gateway.query_status(&status_query()).await.unwrap(),
            StatusReply::Pending
        );
    }

    #[tokio::test]
    async fn test_unreachable_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let gateway = HttpGateway::new(format!("http://{addr}/api")).unwrap();
        let err = gateway.query_status(&status_query()).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
