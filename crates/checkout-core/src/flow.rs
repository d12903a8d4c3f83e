//! Checkout Flow Controller
//!
//! Drives one checkout at a time through two sub-protocols:
//!
//! ```text
//!  submit ──▶ Initiating ──(reference)──▶ Polling ──(ResultCode "0")──▶ Succeeded
//!               │                           │
//!               └──(refused / exhausted)──▶ Failed ◀──(declined / unverified)
//! ```
//!
//! Initiation retries the STK push until it yields a checkout reference.
//! Polling queries the transaction status on a fixed period until a terminal
//! result or the poll budget runs out. The poll timer is a spawned task owned
//! by the controller; cancelling, disposing or dropping the controller aborts
//! it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{CheckoutError, Result};
use crate::gateway::{InitiationReply, PaymentGateway, StatusQuery, StatusReply, StkPushRequest};
use crate::input::CheckoutInput;
use crate::model::{CheckoutReference, CheckoutRequest, FlowConfig, FlowSnapshot, FlowState};
use crate::notify::{Navigator, Notifier};
use crate::retry::{Attempt, RetryOutcome, RetryPolicy};

pub const INITIATED_MESSAGE: &str = "STK Push initiated successfully! Check your phone.";
pub const PAYMENT_SUCCEEDED_MESSAGE: &str = "Payment successful!";

/// What a call to [`CheckoutFlow::submit`] did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Submission {
    /// A checkout was already running, or the flow is disposed
    Ignored,
    /// The flow was cancelled while the STK push was in flight
    Cancelled,
    /// Reference obtained, status polling started
    Polling(CheckoutReference),
}

/// Checkout state machine
///
/// Must be used from within a Tokio runtime: polling runs as a spawned task.
pub struct CheckoutFlow {
    inner: Arc<Inner>,
}

struct Inner {
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    config: FlowConfig,
    shared: Mutex<Shared>,
    state_tx: watch::Sender<FlowState>,
}

#[derive(Default)]
struct Shared {
    state: FlowState,
    input: CheckoutInput,
    reference: Option<CheckoutReference>,
    poll_attempts: u32,
    /// Bumped by every polling session and every cancel
    session: u64,
    timer: Option<JoinHandle<()>>,
    disposed: bool,
}

enum PollStop {
    /// A newer session or a cancel took over
    Superseded,
    Declined(CheckoutError),
}

impl CheckoutFlow {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
        config: FlowConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(FlowState::Idle);
        Self {
            inner: Arc::new(Inner {
                gateway,
                notifier,
                navigator,
                config,
                shared: Mutex::new(Shared::default()),
                state_tx,
            }),
        }
    }

    pub fn config(&self) -> &FlowConfig {
        &self.inner.config
    }

    pub fn state(&self) -> FlowState {
        self.inner.lock().state
    }

    pub fn snapshot(&self) -> FlowSnapshot {
        let shared = self.inner.lock();
        FlowSnapshot {
            state: shared.state,
            reference: shared.reference.clone(),
            poll_attempts: shared.poll_attempts,
            input: shared.input.clone(),
        }
    }

    /// Whether a poll timer is live
    pub fn has_active_timer(&self) -> bool {
        self.inner
            .lock()
            .timer
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<FlowState> {
        self.inner.state_tx.subscribe()
    }

    /// Wait until no checkout is in flight and return the settled state
    pub async fn settled(&self) -> FlowState {
        let mut rx = self.subscribe();
        match rx.wait_for(|state| !state.is_busy()).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        }
    }

    pub fn input(&self) -> CheckoutInput {
        self.inner.lock().input.clone()
    }

    pub fn set_phone_number(&self, phone_number: impl Into<String>) {
        self.inner.lock().input.phone_number = phone_number.into();
    }

    pub fn set_amount(&self, amount: impl Into<String>) {
        self.inner.lock().input.amount = amount.into();
    }

    /// Add one of the preset amounts to the current amount
    pub fn add_amount(&self, value: u32) {
        self.inner.lock().input.add_amount(value);
    }

    pub fn set_input(&self, input: CheckoutInput) {
        self.inner.lock().input = input;
    }

    /// Validate the current input, obtain a checkout reference and start
    /// polling.
    ///
    /// Returns once polling has started; the outcome of the payment itself
    /// arrives through the notifier (see [`Self::settled`]). Ignored while a
    /// checkout is already initiating or polling.
    pub async fn submit(&self) -> Result<Submission> {
        let (request, session) = {
            let mut shared = self.inner.lock();
            if shared.disposed || shared.state.is_busy() {
                tracing::debug!(state = %shared.state, "Checkout already in progress, ignoring submit");
                return Ok(Submission::Ignored);
            }

            let validated = shared.input.validate(self.inner.config.min_amount);
            match validated {
                Ok(request) => {
                    self.inner.set_state(&mut shared, FlowState::Initiating);
                    (request, shared.session)
                }
                Err(err) => {
                    drop(shared);
                    self.inner.notifier.alert(&err.user_message());
                    return Err(err);
                }
            }
        };

        let mut guard = InitiationGuard {
            inner: &self.inner,
            session,
            armed: true,
        };

        tracing::info!(
            phone = %request.phone_number(),
            amount = %request.amount(),
            "Initiating STK push"
        );

        let outcome = self.inner.initiate(&request).await;
        guard.armed = false;

        match outcome {
            Ok(reference) => {
                if !self.start_polling_for(Some(session), reference.clone(), request)? {
                    tracing::info!("Checkout cancelled during initiation, discarding result");
                    return Ok(Submission::Cancelled);
                }
                tracing::info!(reference = %reference, "STK push accepted");
                self.inner.notifier.notify_success(INITIATED_MESSAGE);
                Ok(Submission::Polling(reference))
            }
            Err(err) => {
                {
                    let mut shared = self.inner.lock();
                    if !Inner::is_current(&shared, session) {
                        tracing::info!("Checkout cancelled during initiation, discarding result");
                        return Ok(Submission::Cancelled);
                    }
                    self.inner.set_state(&mut shared, FlowState::Failed);
                }
                tracing::warn!(error = %err, "STK push failed");
                self.inner.notifier.notify_failure(&err.user_message());
                Err(err)
            }
        }
    }

    /// Begin a polling session for `reference`, replacing any running one.
    pub fn start_polling(&self, reference: CheckoutReference, request: CheckoutRequest) -> Result<()> {
        self.start_polling_for(None, reference, request).map(|_| ())
    }

    /// Start polling unless `expected` names a session that has since been
    /// cancelled. Returns whether polling started.
    fn start_polling_for(
        &self,
        expected: Option<u64>,
        reference: CheckoutReference,
        request: CheckoutRequest,
    ) -> Result<bool> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| CheckoutError::Config(format!("polling needs a Tokio runtime: {e}")))?;

        let mut shared = self.inner.lock();
        if shared.disposed || expected.is_some_and(|session| !Inner::is_current(&shared, session)) {
            return Ok(false);
        }

        if let Some(timer) = shared.timer.take() {
            timer.abort();
        }

        shared.session += 1;
        shared.poll_attempts = 0;
        shared.reference = Some(reference.clone());
        self.inner.set_state(&mut shared, FlowState::Polling);

        let session = shared.session;
        let inner = Arc::clone(&self.inner);
        shared.timer = Some(runtime.spawn(inner.poll(session, reference, request)));

        Ok(true)
    }

    /// Stop any checkout in flight and return to idle
    pub fn cancel(&self) {
        let mut shared = self.inner.lock();
        shared.session += 1;
        if let Some(timer) = shared.timer.take() {
            timer.abort();
            tracing::debug!("Poll timer cancelled");
        }
        shared.reference = None;
        if shared.state.is_busy() {
            self.inner.set_state(&mut shared, FlowState::Idle);
        }
    }

    /// Cancel and refuse further submissions
    pub fn dispose(&self) {
        self.cancel();
        self.inner.lock().disposed = true;
    }
}

impl Drop for CheckoutFlow {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Puts an abandoned initiation back to idle
struct InitiationGuard<'a> {
    inner: &'a Inner,
    session: u64,
    armed: bool,
}

impl Drop for InitiationGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut shared = self.inner.lock();
        if shared.session == self.session && shared.state == FlowState::Initiating {
            self.inner.set_state(&mut shared, FlowState::Idle);
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, shared: &mut Shared, state: FlowState) {
        shared.state = state;
        self.state_tx.send_replace(state);
    }

    fn is_current(shared: &Shared, session: u64) -> bool {
        shared.session == session && !shared.disposed
    }

    async fn initiate(&self, request: &CheckoutRequest) -> Result<CheckoutReference> {
        let body = StkPushRequest::from(request);
        let gateway = &self.gateway;
        let policy = RetryPolicy::backoff(self.config.max_init_retries, self.config.init_backoff);

        let outcome = policy
            .run(|attempt| {
                let body = &body;
                async move {
                    match gateway.stk_push(body).await {
                        Ok(InitiationReply::Accepted(reference)) => Attempt::Done(reference),
                        Ok(InitiationReply::Pending) => {
                            tracing::debug!(attempt, "No CheckoutRequestID yet, retrying");
                            Attempt::Retry
                        }
                        Ok(InitiationReply::Rejected(message)) => {
                            Attempt::Abort(CheckoutError::Initiation(message))
                        }
                        Err(err) => Attempt::Abort(err),
                    }
                }
            })
            .await;

        match outcome {
            RetryOutcome::Completed { value, .. } => Ok(value),
            RetryOutcome::Aborted { error, .. } => Err(error),
            RetryOutcome::Exhausted { attempts } => Err(CheckoutError::InitiationTimeout { attempts }),
        }
    }

    /// Record a finished tick. False when the session is no longer current.
    fn record_tick(&self, session: u64, attempt: u32) -> bool {
        let mut shared = self.lock();
        if shared.session != session || shared.state != FlowState::Polling {
            return false;
        }
        shared.poll_attempts = attempt;
        true
    }

    async fn poll(self: Arc<Self>, session: u64, reference: CheckoutReference, request: CheckoutRequest) {
        let query = StatusQuery::new(&reference, &request);
        let policy = RetryPolicy::ticker(self.config.max_poll_retries, self.config.poll_interval);
        let this = &self;

        let outcome = policy
            .run(|attempt| {
                let query = &query;
                async move {
                    tracing::debug!(reference = %query.checkout_request_id, attempt, "Querying transaction status");
                    let reply = this.gateway.query_status(query).await;

                    if !this.record_tick(session, attempt) {
                        return Attempt::Abort(PollStop::Superseded);
                    }

                    match reply {
                        Ok(StatusReply::Succeeded) => Attempt::Done(()),
                        Ok(StatusReply::Failed { code, description }) => {
                            Attempt::Abort(PollStop::Declined(CheckoutError::PollResultFailure {
                                code,
                                description,
                            }))
                        }
                        Ok(StatusReply::Pending) => Attempt::Retry,
                        Err(err) => {
                            tracing::warn!(error = %err, attempt, "Error checking transaction status");
                            Attempt::Retry
                        }
                    }
                }
            })
            .await;

        let result = match outcome {
            RetryOutcome::Completed { .. } => Ok(()),
            RetryOutcome::Aborted { error: PollStop::Superseded, .. } => return,
            RetryOutcome::Aborted { error: PollStop::Declined(err), .. } => Err(err),
            RetryOutcome::Exhausted { attempts } => Err(CheckoutError::PollTimeout { attempts }),
        };

        self.finish(session, &reference, request.amount(), result);
    }

    fn finish(&self, session: u64, reference: &CheckoutReference, amount: Decimal, result: Result<()>) {
        {
            let mut shared = self.lock();
            if shared.session != session || shared.state != FlowState::Polling {
                tracing::debug!(reference = %reference, "Discarding stale poll result");
                return;
            }

            // this task is the timer; dropping its handle just detaches it
            shared.timer = None;
            shared.reference = None;
            if result.is_ok() {
                shared.input.clear();
                self.set_state(&mut shared, FlowState::Succeeded);
            } else {
                self.set_state(&mut shared, FlowState::Failed);
            }
        }

        match result {
            Ok(()) => {
                tracing::info!(reference = %reference, amount = %amount, "Payment confirmed");
                self.notifier.notify_success(PAYMENT_SUCCEEDED_MESSAGE);
                self.navigator.go_to(&self.config.success_route);
            }
            Err(err) => {
                tracing::warn!(reference = %reference, error = %err, "Payment not completed");
                self.notifier.notify_failure(&err.user_message());
            }
        }
    }
}
