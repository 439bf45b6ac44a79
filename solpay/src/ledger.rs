//! Ledger access used by the confirmation watcher.
//!
//! The watcher never talks to a node directly; it goes through [`LedgerLike`]
//! so the transport can be swapped out, and so tests can script responses
//! without a network. A JSON-RPC implementation lives in the `solpay-rpc`
//! crate.

use async_trait::async_trait;
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use std::sync::Arc;

use crate::amount::Amount;

/// Errors returned by ledger queries.
///
/// During reference lookups the watcher treats every variant as transient and
/// equivalent to an empty result. During the post-match detail fetch they are
/// terminal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The node could not be reached or the call failed in transit.
    #[error("ledger transport error: {0}")]
    Transport(String),

    /// The node does not know the requested transaction.
    #[error("transaction {0} not found")]
    TransactionNotFound(Signature),

    /// The node answered with data the client could not interpret.
    #[error("malformed ledger response: {0}")]
    MalformedResponse(String),
}

/// One entry from a reference signature lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureRecord {
    /// Signature of the transaction that references the key.
    pub signature: Signature,
    /// Slot the transaction landed in.
    pub slot: u64,
}

/// Net lamport credit observed for one account in a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountCredit {
    /// The credited account.
    pub account: Pubkey,
    /// How much the account's balance grew, in SOL.
    pub amount: Amount,
}

/// The slice of transaction detail needed to validate a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDetail {
    /// Execution error reported by the ledger, if the transaction failed.
    pub execution_error: Option<String>,
    /// Every account key the transaction touches, including read-only ones.
    pub account_keys: Vec<Pubkey>,
    /// Accounts whose balance grew, with the observed credit. Accounts with
    /// no net gain are omitted.
    pub credits: Vec<AccountCredit>,
}

/// Read-only ledger queries the watcher depends on.
///
/// Both methods are idempotent reads and must be safe to call concurrently
/// from many watchers sharing one client. Call timeouts are applied by the
/// caller, not by implementations.
#[async_trait]
pub trait LedgerLike: Send + Sync {
    /// Returns signatures of transactions that reference the given account
    /// key, most recent first, at most `limit` entries.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the lookup cannot be completed.
    async fn signatures_for_reference(
        &self,
        reference: &Pubkey,
        limit: usize,
    ) -> Result<Vec<SignatureRecord>, LedgerError>;

    /// Returns the detail of one transaction by signature.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the transaction cannot be fetched or its
    /// response cannot be interpreted.
    async fn transaction_detail(
        &self,
        signature: &Signature,
    ) -> Result<TransactionDetail, LedgerError>;
}

#[async_trait]
impl<T: LedgerLike + ?Sized> LedgerLike for Arc<T> {
    async fn signatures_for_reference(
        &self,
        reference: &Pubkey,
        limit: usize,
    ) -> Result<Vec<SignatureRecord>, LedgerError> {
        (**self).signatures_for_reference(reference, limit).await
    }

    async fn transaction_detail(
        &self,
        signature: &Signature,
    ) -> Result<TransactionDetail, LedgerError> {
        (**self).transaction_detail(signature).await
    }
}
