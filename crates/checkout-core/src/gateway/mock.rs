//! Mock Payment Gateway
//!
//! Scripted replies for tests and demo runs. Each endpoint pops from its
//! script and falls back to a fixed reply once the script runs dry.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::Instant;

use super::{InitiationReply, PaymentGateway, StatusQuery, StatusReply, StkPushRequest};
use crate::error::Result;
use crate::model::CheckoutReference;

/// Mock gateway with scripted replies
pub struct MockGateway {
    push_script: Mutex<VecDeque<Result<InitiationReply>>>,
    /// `None` issues a fresh reference per call
    push_fallback: Option<Result<InitiationReply>>,
    status_script: Mutex<VecDeque<Result<StatusReply>>>,
    status_fallback: Result<StatusReply>,
    push_calls: Mutex<Vec<StkPushRequest>>,
    status_calls: Mutex<Vec<(Instant, StatusQuery)>>,
    latency: Duration,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockGateway {
    /// Accepts every push and never settles a status query
    pub fn new() -> Self {
        Self {
            push_script: Mutex::new(VecDeque::new()),
            push_fallback: None,
            status_script: Mutex::new(VecDeque::new()),
            status_fallback: Ok(StatusReply::Pending),
            push_calls: Mutex::new(Vec::new()),
            status_calls: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
        }
    }

    /// Demo gateway: confirms the payment on the `polls`-th status query
    pub fn approving_after(polls: u32) -> Self {
        let pending = (1..polls).map(|_| Ok(StatusReply::Pending));
        Self::new().with_status_replies(pending.chain([Ok(StatusReply::Succeeded)]))
    }

    #[must_use]
    pub fn with_push_replies(self, replies: impl IntoIterator<Item = Result<InitiationReply>>) -> Self {
        lock(&self.push_script).extend(replies);
        self
    }

    #[must_use]
    pub fn with_push_fallback(mut self, reply: Result<InitiationReply>) -> Self {
        self.push_fallback = Some(reply);
        self
    }

    #[must_use]
    pub fn with_status_replies(self, replies: impl IntoIterator<Item = Result<StatusReply>>) -> Self {
        lock(&self.status_script).extend(replies);
        self
    }

    #[must_use]
    pub fn with_status_fallback(mut self, reply: Result<StatusReply>) -> Self {
        self.status_fallback = reply;
        self
    }

    /// Simulated round-trip time for every call
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn push_calls(&self) -> Vec<StkPushRequest> {
        lock(&self.push_calls).clone()
    }

    pub fn status_calls(&self) -> Vec<StatusQuery> {
        lock(&self.status_calls).iter().map(|(_, q)| q.clone()).collect()
    }

    /// When each status query arrived
    pub fn status_call_times(&self) -> Vec<Instant> {
        lock(&self.status_calls).iter().map(|(at, _)| *at).collect()
    }

    fn fresh_reference() -> InitiationReply {
        let stamp = Utc::now().format("%d%m%Y%H%M%S%f");
        CheckoutReference::new(format!("ws_CO_{stamp}"))
            .map_or(InitiationReply::Pending, InitiationReply::Accepted)
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn stk_push(&self, request: &StkPushRequest) -> Result<InitiationReply> {
        lock(&self.push_calls).push(request.clone());
        self.simulate_latency().await;

        let scripted = lock(&self.push_script).pop_front();
        scripted.unwrap_or_else(|| {
            self.push_fallback
                .clone()
                .unwrap_or_else(|| Ok(Self::fresh_reference()))
        })
    }

    async fn query_status(&self, query: &StatusQuery) -> Result<StatusReply> {
        lock(&self.status_calls).push((Instant::now(), query.clone()));
        self.simulate_latency().await;

        let scripted = lock(&self.status_script).pop_front();
        scripted.unwrap_or_else(|| self.status_fallback.clone())
    }

    fn name(&self) -> &str {
        "MockGateway"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn push_request() -> StkPushRequest {
        StkPushRequest {
            phone_number: "254712345678".into(),
            amount: dec!(100),
        }
    }

    #[tokio::test]
    async fn test_default_accepts_push() {
        let gateway = MockGateway::new();
        let reply = gateway.stk_push(&push_request()).await.unwrap();
        assert!(matches!(reply, InitiationReply::Accepted(r) if r.as_str().starts_with("ws_CO_")));
        assert_eq!(gateway.push_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_script_then_fallback() {
        let gateway = MockGateway::new()
            .with_push_replies([Ok(InitiationReply::Pending)])
            .with_push_fallback(Ok(InitiationReply::Rejected("down".into())));

        assert_eq!(gateway.stk_push(&push_request()).await.unwrap(), InitiationReply::Pending);
        assert_eq!(
            gateway.stk_push(&push_request()).await.unwrap(),
            InitiationReply::Rejected("down".into())
        );
    }

    #[tokio::test]
    async fn test_approving_after() {
        let gateway = MockGateway::approving_after(2);
        let query = StatusQuery {
            checkout_request_id: "abc".into(),
            phone_number: "0712345678".into(),
            amount: dec!(10),
        };
        assert_eq!(gateway.query_status(&query).await.unwrap(), StatusReply::Pending);
        assert_eq!(gateway.query_status(&query).await.unwrap(), StatusReply::Succeeded);
        assert_eq!(gateway.query_status(&query).await.unwrap(), StatusReply::Pending);
        assert_eq!(gateway.status_calls().len(), 3);
    }
}
