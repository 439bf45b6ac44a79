//! Asynchronous payment confirmation watching.
//!
//! A [`PaymentWatcher`] spawns one owned task per [`PaymentRequest`]. The
//! task polls the ledger for transactions referencing the request's key on a
//! fixed cadence, validates the first match, and reports exactly one terminal
//! [`WatchOutcome`] over a single-use channel. All mutable watch state lives
//! inside the task; the caller holds only a [`WatchHandle`].
//!
//! # Lifecycle
//!
//! ```text
//! Pending ──match──▶ Found ──validated──▶ Confirmed
//!    │                 │
//!    │                 └──rejected / unfetchable──▶ Failed
//!    ├──attempt budget exhausted─────────────────▶ Failed
//!    └──cancel (also from Found)─────────────────▶ Cancelled
//! ```
//!
//! Transient lookup failures and lookup timeouts are absorbed as empty
//! results; they only ever surface indirectly, as an exhausted attempt
//! budget. Once a match is recorded the watcher never polls again: the
//! reference is single-use, so the first transaction mentioning it either is
//! the payment or the payment has failed.
//!
//! # Example
//!
//! ```ignore
//! use solpay::request::PaymentRequest;
//! use solpay::watcher::{PaymentWatcher, WatchOptions};
//! use std::sync::Arc;
//!
//! let request = PaymentRequest::new(&recipient, "0.2")?.with_label("Cookie Store");
//! println!("{}", request.url());
//!
//! let watcher = PaymentWatcher::new(Arc::new(ledger), WatchOptions::new());
//! let handle = watcher.start(request)?;
//! let outcome = handle.outcome().await;
//! ```

use serde::{Deserialize, Serialize, Serializer};
use solana_signature::Signature;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::ledger::{LedgerError, LedgerLike, SignatureRecord};
use crate::request::PaymentRequest;
use crate::validate::{TransferMismatch, validate_transfer};

/// Cadence of reference lookups.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Bound on each individual ledger call.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(4);

/// Result window requested from each reference lookup.
pub const DEFAULT_SIGNATURE_LIMIT: usize = 10;

/// Lifecycle states of one payment watch.
///
/// `Pending` and `Found` are in-flight; the other three are terminal and
/// absorb. Terminal states appear as the `outcome` field of the serialized
/// [`WatchOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchStatus {
    /// Polling; no transaction references the key yet.
    Pending,
    /// A transaction referencing the key was found and is being validated.
    Found,
    /// The payment was found and validated.
    Confirmed,
    /// The watch ended without a confirmed payment.
    Failed,
    /// The caller cancelled the watch.
    Cancelled,
}

/// Machine-readable cause codes for failed watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum FailureReason {
    /// The matched transaction failed execution on the ledger.
    ExecutionFailed,
    /// The matched transaction does not pay the request.
    MismatchedTransfer,
    /// Transaction detail could not be fetched for the match.
    DetailUnavailable,
    /// The attempt budget ran out before any match appeared.
    Timeout,
}

/// Terminal causes carried inside [`WatchOutcome::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum WatchError {
    /// The matched transaction failed execution on the ledger.
    #[error("transaction {signature} failed execution: {error}")]
    ExecutionFailed {
        /// The matched transaction.
        signature: Signature,
        /// Execution error as reported by the ledger.
        error: String,
    },

    /// The matched transaction executed but does not pay the request.
    #[error("transaction {signature} does not pay the request: {mismatch}")]
    MismatchedTransfer {
        /// The matched transaction.
        signature: Signature,
        /// What did not line up.
        #[source]
        mismatch: TransferMismatch,
    },

    /// The matched transaction's detail could not be fetched.
    #[error("could not fetch transaction {signature}: {source}")]
    DetailUnavailable {
        /// The matched transaction.
        signature: Signature,
        /// The ledger failure behind it.
        #[source]
        source: LedgerError,
    },

    /// Every polling cycle came back empty and the budget ran out.
    #[error("no matching transaction after {attempts} attempts")]
    Timeout {
        /// Completed polling cycles.
        attempts: u32,
    },
}

impl WatchError {
    /// Machine-readable reason code for this cause.
    #[must_use]
    pub const fn reason(&self) -> FailureReason {
        match self {
            Self::ExecutionFailed { .. } => FailureReason::ExecutionFailed,
            Self::MismatchedTransfer { .. } => FailureReason::MismatchedTransfer,
            Self::DetailUnavailable { .. } => FailureReason::DetailUnavailable,
            Self::Timeout { .. } => FailureReason::Timeout,
        }
    }

    /// The matched transaction, for causes that involve one.
    #[must_use]
    pub const fn signature(&self) -> Option<Signature> {
        match self {
            Self::ExecutionFailed { signature, .. }
            | Self::MismatchedTransfer { signature, .. }
            | Self::DetailUnavailable { signature, .. } => Some(*signature),
            Self::Timeout { .. } => None,
        }
    }
}

/// The terminal event of one watch, delivered exactly once.
///
/// # Serialization
///
/// Serializes as a flat object keyed by `outcome`:
///
/// ```json
/// {"outcome": "confirmed", "signature": "5VERv8NM..."}
/// {"outcome": "failed", "cause": "timeout", "detail": "no matching transaction after 3 attempts"}
/// {"outcome": "cancelled"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum WatchOutcome {
    /// A transaction paying the request was found and validated.
    Confirmed {
        /// Signature of the confirming transaction.
        signature: Signature,
    },
    /// The watch ended without a confirmed payment.
    Failed {
        /// Why the watch failed.
        cause: WatchError,
    },
    /// The watch was cancelled before reaching confirmation.
    Cancelled,
}

impl WatchOutcome {
    /// The terminal status this outcome corresponds to.
    #[must_use]
    pub const fn status(&self) -> WatchStatus {
        match self {
            Self::Confirmed { .. } => WatchStatus::Confirmed,
            Self::Failed { .. } => WatchStatus::Failed,
            Self::Cancelled => WatchStatus::Cancelled,
        }
    }

    /// Returns `true` for a confirmed payment.
    #[must_use]
    pub const fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WatchOutcomeWire {
    outcome: WatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cause: Option<FailureReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl Serialize for WatchOutcome {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let wire = match self {
            Self::Confirmed { signature } => WatchOutcomeWire {
                outcome: WatchStatus::Confirmed,
                signature: Some(signature.to_string()),
                cause: None,
                detail: None,
            },
            Self::Failed { cause } => WatchOutcomeWire {
                outcome: WatchStatus::Failed,
                signature: cause.signature().map(|signature| signature.to_string()),
                cause: Some(cause.reason()),
                detail: Some(cause.to_string()),
            },
            Self::Cancelled => WatchOutcomeWire {
                outcome: WatchStatus::Cancelled,
                signature: None,
                cause: None,
                detail: None,
            },
        };
        wire.serialize(serializer)
    }
}

/// Errors from starting a watch with unusable options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WatchOptionsError {
    /// The poll interval must be non-zero.
    #[error("poll interval must be non-zero")]
    ZeroPollInterval,

    /// The signature lookup window must be non-zero.
    #[error("signature limit must be non-zero")]
    ZeroSignatureLimit,
}

/// Tuning for payment watches.
///
/// The defaults poll every five seconds with a four second bound on each
/// ledger call and no attempt budget. Keep the lookup timeout below the poll
/// interval so a slow call cannot spill into the next cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    poll_interval: Duration,
    lookup_timeout: Duration,
    max_attempts: Option<NonZeroU32>,
    signature_limit: usize,
}

impl WatchOptions {
    /// Creates options with the default cadence.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            max_attempts: None,
            signature_limit: DEFAULT_SIGNATURE_LIMIT,
        }
    }

    /// Sets the time between polling cycles.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Sets the bound applied to each individual ledger call.
    #[must_use]
    pub const fn with_lookup_timeout(mut self, lookup_timeout: Duration) -> Self {
        self.lookup_timeout = lookup_timeout;
        self
    }

    /// Caps the number of polling cycles. Zero means unbounded.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = NonZeroU32::new(max_attempts);
        self
    }

    /// Sets the result window requested from each reference lookup.
    #[must_use]
    pub const fn with_signature_limit(mut self, signature_limit: usize) -> Self {
        self.signature_limit = signature_limit;
        self
    }

    /// The time between polling cycles.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// The bound applied to each individual ledger call.
    #[must_use]
    pub const fn lookup_timeout(&self) -> Duration {
        self.lookup_timeout
    }

    /// The polling cycle budget, if any.
    #[must_use]
    pub const fn max_attempts(&self) -> Option<NonZeroU32> {
        self.max_attempts
    }

    /// The result window requested from each reference lookup.
    #[must_use]
    pub const fn signature_limit(&self) -> usize {
        self.signature_limit
    }

    const fn validate(&self) -> Result<(), WatchOptionsError> {
        if self.poll_interval.is_zero() {
            return Err(WatchOptionsError::ZeroPollInterval);
        }
        if self.signature_limit == 0 {
            return Err(WatchOptionsError::ZeroSignatureLimit);
        }
        Ok(())
    }
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns confirmation watchers over a shared ledger client.
///
/// The ledger is read-only and shared; each call to [`PaymentWatcher::start`]
/// spawns an independent task, so many watches can run side by side without
/// coordinating.
pub struct PaymentWatcher<L> {
    ledger: Arc<L>,
    options: WatchOptions,
}

impl<L> fmt::Debug for PaymentWatcher<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentWatcher")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<L> Clone for PaymentWatcher<L> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            options: self.options,
        }
    }
}

impl<L: LedgerLike + 'static> PaymentWatcher<L> {
    /// Creates a watcher factory over the given ledger client.
    #[must_use]
    pub const fn new(ledger: Arc<L>, options: WatchOptions) -> Self {
        Self { ledger, options }
    }

    /// Starts watching for the payment of `request` in an owned task.
    ///
    /// The returned handle is the only way to observe or cancel the watch;
    /// dropping it leaves the task running detached until it reaches a
    /// terminal state on its own.
    ///
    /// # Errors
    ///
    /// Returns [`WatchOptionsError`] if the configured options are unusable.
    pub fn start(&self, request: PaymentRequest) -> Result<WatchHandle, WatchOptionsError> {
        self.options.validate()?;
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let cancel = CancellationToken::new();
        let task = WatchTask {
            ledger: Arc::clone(&self.ledger),
            options: self.options,
            request,
            cancel: cancel.clone(),
        };
        tokio::spawn(task.run(outcome_tx));
        Ok(WatchHandle {
            outcome: outcome_rx,
            cancel,
        })
    }
}

/// Caller-side handle to one running watch.
#[derive(Debug)]
pub struct WatchHandle {
    outcome: oneshot::Receiver<WatchOutcome>,
    cancel: CancellationToken,
}

impl WatchHandle {
    /// Requests cancellation of the watch.
    ///
    /// Takes effect promptly, aborting any in-flight ledger call. Idempotent,
    /// and a no-op once the watch has reached a terminal state on its own.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns a token that cancels this watch, for wiring into shutdown
    /// paths that outlive the handle.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits for the terminal outcome.
    ///
    /// Resolves exactly once. If the runtime tears the watch task down
    /// before it can report, the watch counts as cancelled.
    pub async fn outcome(self) -> WatchOutcome {
        self.outcome.await.unwrap_or(WatchOutcome::Cancelled)
    }
}

struct WatchTask<L> {
    ledger: Arc<L>,
    options: WatchOptions,
    request: PaymentRequest,
    cancel: CancellationToken,
}

impl<L: LedgerLike> WatchTask<L> {
    async fn run(self, outcome_tx: oneshot::Sender<WatchOutcome>) {
        #[cfg(feature = "telemetry")]
        tracing::debug!(
            reference = %self.request.reference(),
            recipient = %self.request.recipient(),
            status = ?WatchStatus::Pending,
            "Watch started"
        );

        let outcome = tokio::select! {
            () = self.cancel.cancelled() => WatchOutcome::Cancelled,
            outcome = self.watch() => outcome,
        };

        #[cfg(feature = "telemetry")]
        tracing::info!(
            reference = %self.request.reference(),
            status = ?outcome.status(),
            "Watch finished"
        );

        // The receiver may be gone; the watch still completed.
        let _ = outcome_tx.send(outcome);
    }

    /// Polls until a match appears or the attempt budget runs out, then
    /// validates the match. Cancellation is raced outside this future.
    async fn watch(&self) -> WatchOutcome {
        let mut ticker = time::interval_at(
            time::Instant::now() + self.options.poll_interval,
            self.options.poll_interval,
        );
        // A slow cycle pushes later cycles back instead of bursting.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut attempts: u32 = 0;
        let matched = loop {
            ticker.tick().await;
            attempts += 1;

            let lookup = time::timeout(
                self.options.lookup_timeout,
                self.ledger.signatures_for_reference(
                    self.request.reference().as_pubkey(),
                    self.options.signature_limit,
                ),
            )
            .await;

            #[cfg(feature = "telemetry")]
            if let Ok(Err(error)) = &lookup {
                tracing::debug!(attempt = attempts, error = %error, "Reference lookup failed, treating as empty result");
            } else if lookup.is_err() {
                tracing::debug!(attempt = attempts, "Reference lookup timed out, treating as empty result");
            }

            let records = match lookup {
                Ok(Ok(records)) => records,
                Ok(Err(_)) | Err(_) => Vec::new(),
            };

            if let Some(record) = records.first().copied() {
                #[cfg(feature = "telemetry")]
                {
                    if records.len() > 1 {
                        tracing::warn!(
                            reference = %self.request.reference(),
                            matches = records.len(),
                            "Reference matched more than one transaction, taking the most recent"
                        );
                    }
                    tracing::debug!(
                        signature = %record.signature,
                        slot = record.slot,
                        attempt = attempts,
                        status = ?WatchStatus::Found,
                        "Found transaction referencing the payment key"
                    );
                }
                break record;
            }

            let exhausted = self
                .options
                .max_attempts
                .is_some_and(|max_attempts| attempts >= max_attempts.get());
            if exhausted {
                return WatchOutcome::Failed {
                    cause: WatchError::Timeout { attempts },
                };
            }

            #[cfg(feature = "telemetry")]
            tracing::trace!(attempt = attempts, "No matching transaction yet");
        };

        self.confirm(matched).await
    }

    /// Fetches and validates the matched transaction. Polling never resumes
    /// past this point: the reference is burned whether or not the
    /// transaction turns out to pay the request.
    async fn confirm(&self, matched: SignatureRecord) -> WatchOutcome {
        let signature = matched.signature;
        let fetched = time::timeout(
            self.options.lookup_timeout,
            self.ledger.transaction_detail(&signature),
        )
        .await
        .unwrap_or_else(|_| {
            Err(LedgerError::Transport(
                "transaction fetch timed out".to_owned(),
            ))
        });

        let detail = match fetched {
            Ok(detail) => detail,
            Err(source) => {
                return WatchOutcome::Failed {
                    cause: WatchError::DetailUnavailable { signature, source },
                };
            }
        };

        if let Some(error) = detail.execution_error {
            return WatchOutcome::Failed {
                cause: WatchError::ExecutionFailed { signature, error },
            };
        }

        match validate_transfer(&self.request, &detail) {
            Ok(()) => WatchOutcome::Confirmed { signature },
            Err(mismatch) => WatchOutcome::Failed {
                cause: WatchError::MismatchedTransfer { signature, mismatch },
            },
        }
    }
}
