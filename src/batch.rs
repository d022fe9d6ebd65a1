//! Sequential batch execution under a single bearer token.
//!
//! A batch authenticates once, then dispatches each [`Invocation`] in input
//! order. What happens when an invocation fails is decided by an explicit
//! [`FailurePolicy`].

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    auth::{AuthClient, AuthToken},
    client::OperationsClient,
    errors::{Error, Result},
    fields::FieldValues,
    registry::OperationKey,
};

/// One requested call: which operation, with which field values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    #[serde(flatten)]
    pub key: OperationKey,
    #[serde(default)]
    pub fields: FieldValues,
}

impl Invocation {
    pub fn new(key: OperationKey, fields: FieldValues) -> Self {
        Self { key, fields }
    }
}

/// What to do when a single invocation fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the first failure and return its error.
    #[default]
    Abort,
    /// Record the failure as an error-shaped result and keep going.
    Continue,
}

impl FailurePolicy {
    /// Map the host's "continue on fail" flag.
    pub fn from_continue_on_fail(continue_on_fail: bool) -> Self {
        if continue_on_fail {
            FailurePolicy::Continue
        } else {
            FailurePolicy::Abort
        }
    }
}

/// Failed invocation captured under [`FailurePolicy::Continue`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallFailure {
    /// Index of the originating invocation.
    pub index: usize,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl CallFailure {
    fn from_error(index: usize, err: &Error) -> Self {
        Self {
            index,
            message: err.to_string(),
            status: err.status(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallResult {
    Success(Value),
    Failure(CallFailure),
}

impl CallResult {
    pub fn is_success(&self) -> bool {
        matches!(self, CallResult::Success(_))
    }

    pub fn payload(&self) -> Option<&Value> {
        match self {
            CallResult::Success(value) => Some(value),
            CallResult::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&CallFailure> {
        match self {
            CallResult::Success(_) => None,
            CallResult::Failure(failure) => Some(failure),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub index: usize,
    pub result: CallResult,
}

impl BatchItem {
    /// Host output item: `{"json": payload}` on success,
    /// `{"json": {"error": message}, "pairedItem": index}` on failure.
    pub fn to_output(&self) -> Value {
        match &self.result {
            CallResult::Success(payload) => json!({ "json": payload }),
            CallResult::Failure(failure) => json!({
                "json": { "error": failure.message },
                "pairedItem": failure.index,
            }),
        }
    }
}

/// Ordered results of a batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub items: Vec<BatchItem>,
    /// The cancellation flag stopped the batch before every invocation ran.
    pub cancelled: bool,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn failures(&self) -> impl Iterator<Item = &CallFailure> {
        self.items.iter().filter_map(|item| item.result.failure())
    }

    pub fn to_output(&self) -> Vec<Value> {
        self.items.iter().map(BatchItem::to_output).collect()
    }
}

/// Shared flag telling a running batch to stop starting new invocations.
///
/// Calls already in flight are left to complete.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Applies a [`FailurePolicy`] to invocation outcomes. Shared by the async and
/// blocking runners.
pub(crate) struct BatchCollector {
    policy: FailurePolicy,
    items: Vec<BatchItem>,
}

impl BatchCollector {
    pub fn new(policy: FailurePolicy, capacity: usize) -> Self {
        Self {
            policy,
            items: Vec::with_capacity(capacity),
        }
    }

    /// Record an outcome; returns the error when the policy says to abort.
    pub fn record(&mut self, index: usize, outcome: Result<Value>) -> Result<()> {
        let result = match outcome {
            Ok(payload) => CallResult::Success(payload),
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(index, error = %err, policy = ?self.policy, "invocation failed");
                match self.policy {
                    FailurePolicy::Abort => return Err(err),
                    FailurePolicy::Continue => {
                        CallResult::Failure(CallFailure::from_error(index, &err))
                    }
                }
            }
        };
        self.items.push(BatchItem { index, result });
        Ok(())
    }

    pub fn finish(self, cancelled: bool) -> BatchReport {
        BatchReport {
            items: self.items,
            cancelled,
        }
    }
}

/// Async batch runner. Created with [`Client::batch`](crate::Client::batch).
#[derive(Clone)]
pub struct BatchRunner {
    auth: AuthClient,
    operations: OperationsClient,
    policy: FailurePolicy,
    cancellation: Option<CancellationFlag>,
}

impl BatchRunner {
    pub(crate) fn new(auth: AuthClient, operations: OperationsClient, policy: FailurePolicy) -> Self {
        Self {
            auth,
            operations,
            policy,
            cancellation: None,
        }
    }

    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = Some(flag);
        self
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Authenticate once, then dispatch every invocation in order.
    ///
    /// A login failure fails the whole batch regardless of policy.
    pub async fn run(&self, invocations: &[Invocation]) -> Result<BatchReport> {
        let token = self.auth.authenticate().await?;
        self.run_with_token(&token, invocations).await
    }

    pub async fn run_with_token(
        &self,
        token: &AuthToken,
        invocations: &[Invocation],
    ) -> Result<BatchReport> {
        let mut collector = BatchCollector::new(self.policy, invocations.len());
        for (index, invocation) in invocations.iter().enumerate() {
            if self.is_cancelled() {
                #[cfg(feature = "tracing")]
                tracing::debug!(index, "batch cancelled");
                return Ok(collector.finish(true));
            }
            let outcome = self.operations.execute(token, invocation).await;
            collector.record(index, outcome)?;
        }
        Ok(collector.finish(false))
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationFlag::is_cancelled)
    }
}
