//! Payment authorization state machine.
//!
//! ```text
//! Selecting ──select(UPI)──▶ Scanning ──mark_paid──▶ Processing ──▶ AwaitingOutcome ──commit──▶ Resolved
//!     │                        │                        │
//!     └──select(Card|Wallet)───┼───────────────────────▶│
//!                              └──back_to_selection──▶ Selecting
//! any non-resolved state ──abort──▶ Aborted
//! ```
//!
//! The gateway is simulated. Latency is an awaitable, cancelable timer and
//! the outcome is supplied by the caller through [`PaymentAttempt::commit`].
//! Cash on delivery never enters this machine; see [`PaymentResult::cash_on_delivery`].

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::aggregates::{PaymentInfo, PaymentMethod, PaymentStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PaymentState {
    Selecting,
    Scanning,
    Processing,
    AwaitingOutcome,
    Resolved { status: PaymentStatus },
    Aborted,
}

impl PaymentState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Selecting => "selecting",
            Self::Scanning => "scanning",
            Self::Processing => "processing",
            Self::AwaitingOutcome => "awaiting_outcome",
            Self::Resolved { .. } => "resolved",
            Self::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool { matches!(self, Self::Resolved { .. } | Self::Aborted) }
}

impl fmt::Display for PaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

/// Gateway decision, supplied by the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentOutcome {
    Success,
    Failure { reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PaymentResult {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub failure_reason: Option<String>,
}

impl PaymentResult {
    /// Pay-on-delivery: no authorization, payment stays pending until delivery.
    pub fn cash_on_delivery() -> Self {
        Self { method: PaymentMethod::CashOnDelivery, status: PaymentStatus::Pending, transaction_id: None, failure_reason: None }
    }

    pub fn is_captured(&self) -> bool { self.status == PaymentStatus::Captured }

    pub fn info(&self) -> PaymentInfo {
        PaymentInfo { method: self.method, status: self.status, transaction_id: self.transaction_id.clone() }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    #[error("Cannot {action} while payment is {state}")]
    InvalidTransition { action: &'static str, state: PaymentState },

    #[error("{0} does not go through payment authorization")]
    OfflineMethod(PaymentMethod),

    #[error("Payment was cancelled")]
    Cancelled,

    #[error("Processing ticket belongs to a superseded payment attempt")]
    StaleTicket,

    #[error("Payment failed: {0}")]
    Declined(String),
}

type ResolvedCallback = Box<dyn FnOnce(&PaymentResult) + Send + Sync>;

/// One checkout's payment attempt. Lives only as long as the checkout.
pub struct PaymentAttempt {
    id: Uuid,
    method: Option<PaymentMethod>,
    state: PaymentState,
    result: Option<PaymentResult>,
    on_resolved: Option<ResolvedCallback>,
    cancel: watch::Sender<bool>,
}

impl fmt::Debug for PaymentAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentAttempt")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("state", &self.state)
            .field("result", &self.result)
            .finish_non_exhaustive()
    }
}

impl Default for PaymentAttempt {
    fn default() -> Self { Self::new() }
}

impl PaymentAttempt {
    pub fn new() -> Self {
        let (cancel, _) = watch::channel(false);
        Self { id: Uuid::new_v4(), method: None, state: PaymentState::Selecting, result: None, on_resolved: None, cancel }
    }

    /// Registers the terminal callback. It runs once, on the first successful commit.
    pub fn on_resolved(mut self, callback: impl FnOnce(&PaymentResult) + Send + Sync + 'static) -> Self {
        self.on_resolved = Some(Box::new(callback));
        self
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn method(&self) -> Option<PaymentMethod> { self.method }
    pub fn state(&self) -> PaymentState { self.state }
    pub fn result(&self) -> Option<&PaymentResult> { self.result.as_ref() }

    fn expect_state(&self, expected: PaymentState, action: &'static str) -> Result<(), PaymentError> {
        if self.state == expected { Ok(()) } else { Err(PaymentError::InvalidTransition { action, state: self.state }) }
    }

    fn enter(&mut self, next: PaymentState) {
        debug!(attempt_id = %self.id, from = %self.state, to = %next, "payment transition");
        self.state = next;
    }

    pub fn select(&mut self, method: PaymentMethod) -> Result<PaymentState, PaymentError> {
        self.expect_state(PaymentState::Selecting, "select a method")?;
        if !method.is_online() { return Err(PaymentError::OfflineMethod(method)); }
        self.method = Some(method);
        self.enter(if method == PaymentMethod::Upi { PaymentState::Scanning } else { PaymentState::Processing });
        Ok(self.state)
    }

    /// UPI: the customer reports the payment code as paid.
    pub fn mark_paid(&mut self) -> Result<PaymentState, PaymentError> {
        self.expect_state(PaymentState::Scanning, "mark paid")?;
        self.enter(PaymentState::Processing);
        Ok(self.state)
    }

    /// UPI: leave the payment code screen and pick another method.
    pub fn back_to_selection(&mut self) -> Result<PaymentState, PaymentError> {
        self.expect_state(PaymentState::Scanning, "return to method selection")?;
        self.method = None;
        self.enter(PaymentState::Selecting);
        Ok(self.state)
    }

    /// Hands out what the gateway needs to wait without borrowing the attempt.
    pub fn processing_ticket(&self) -> Result<ProcessingTicket, PaymentError> {
        self.expect_state(PaymentState::Processing, "start processing")?;
        Ok(ProcessingTicket { attempt_id: self.id, cancelled: self.cancel.subscribe() })
    }

    /// Only the attempt that issued `ticket` can be advanced with it.
    pub fn finish_processing(&mut self, ticket: &ProcessingTicket) -> Result<PaymentState, PaymentError> {
        if ticket.attempt_id != self.id { return Err(PaymentError::StaleTicket); }
        self.expect_state(PaymentState::Processing, "finish processing")?;
        self.enter(PaymentState::AwaitingOutcome);
        Ok(self.state)
    }

    /// Runs the simulated gateway latency, then waits for an outcome.
    pub async fn process(&mut self, gateway: &SimulatedGateway) -> Result<PaymentState, PaymentError> {
        let ticket = self.processing_ticket()?;
        gateway.settle(&ticket).await?;
        self.finish_processing(&ticket)
    }

    /// Commits the gateway outcome.
    ///
    /// Returns `Ok(Some(result))` the first time, `Ok(None)` on any repeat
    /// after the attempt is resolved. The callback fires only on the first.
    pub fn commit(&mut self, outcome: PaymentOutcome) -> Result<Option<PaymentResult>, PaymentError> {
        if let PaymentState::Resolved { .. } = self.state {
            debug!(attempt_id = %self.id, "ignoring repeated payment commit");
            return Ok(None);
        }
        self.expect_state(PaymentState::AwaitingOutcome, "commit an outcome")?;
        let method = self.method.ok_or(PaymentError::InvalidTransition { action: "commit an outcome", state: self.state })?;
        let result = match outcome {
            PaymentOutcome::Success => PaymentResult {
                method, status: PaymentStatus::Captured,
                transaction_id: Some(format!("txn_{}", Uuid::new_v4().simple())), failure_reason: None,
            },
            PaymentOutcome::Failure { reason } => PaymentResult { method, status: PaymentStatus::Failed, transaction_id: None, failure_reason: Some(reason) },
        };
        self.enter(PaymentState::Resolved { status: result.status });
        info!(attempt_id = %self.id, %method, status = result.status.as_str(), "payment resolved");
        if let Some(callback) = self.on_resolved.take() { callback(&result); }
        self.result = Some(result.clone());
        Ok(Some(result))
    }

    /// Closes the flow. Any in-flight processing wait is cancelled and the callback never fires.
    pub fn abort(&mut self) -> Result<(), PaymentError> {
        match self.state {
            PaymentState::Aborted => Ok(()),
            PaymentState::Resolved { .. } => Err(PaymentError::InvalidTransition { action: "abort", state: self.state }),
            _ => {
                self.on_resolved = None;
                self.cancel.send_replace(true);
                self.enter(PaymentState::Aborted);
                Ok(())
            }
        }
    }
}

/// Cancellation handle for one processing wait.
#[derive(Debug)]
pub struct ProcessingTicket {
    attempt_id: Uuid,
    cancelled: watch::Receiver<bool>,
}

impl ProcessingTicket {
    pub fn attempt_id(&self) -> Uuid { self.attempt_id }
}

async fn wait_cancelled(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() { return; }
        // sender gone: the attempt was dropped
        if rx.changed().await.is_err() { return; }
    }
}

/// Stand-in for a payment network: only simulates latency.
#[derive(Clone, Debug)]
pub struct SimulatedGateway {
    latency: Duration,
}

impl SimulatedGateway {
    pub const DEFAULT_LATENCY: Duration = Duration::from_millis(1500);

    pub fn new(latency: Duration) -> Self { Self { latency } }

    /// No delay at all.
    pub fn instant() -> Self { Self::new(Duration::ZERO) }

    pub fn latency(&self) -> Duration { self.latency }

    pub async fn settle(&self, ticket: &ProcessingTicket) -> Result<(), PaymentError> {
        let attempt_id = ticket.attempt_id;
        tokio::select! {
            biased;
            _ = wait_cancelled(ticket.cancelled.clone()) => {
                debug!(%attempt_id, "payment processing cancelled");
                Err(PaymentError::Cancelled)
            }
            _ = tokio::time::sleep(self.latency) => Ok(()),
        }
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self { Self::new(Self::DEFAULT_LATENCY) }
}
