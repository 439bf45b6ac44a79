#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! JSON-RPC ledger access for solpay confirmation watching.
//!
//! [`RpcLedger`] implements [`solpay::ledger::LedgerLike`] over the
//! nonblocking Solana [`RpcClient`], translating signature listings and
//! transaction detail responses into the records the watcher consumes. All
//! queries run at a single commitment level, `confirmed` unless overridden,
//! so a match and its detail fetch see the same view of the chain.
//!
//! Balance deltas are read from the transaction's status metadata. The
//! metadata orders balances by the full account list of the transaction,
//! static keys first and then any addresses loaded from lookup tables, and
//! the projection here preserves that order.

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_client::GetConfirmedSignaturesForAddress2Config;
use solana_client::rpc_config::RpcTransactionConfig;
use solana_client::rpc_response::RpcConfirmedTransactionStatusWithSignature;
use solana_commitment_config::CommitmentConfig;
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_transaction_status_client_types::option_serializer::OptionSerializer;
use solana_transaction_status_client_types::{
    EncodedConfirmedTransactionWithStatusMeta, EncodedTransaction, UiMessage,
    UiTransactionEncoding, UiTransactionStatusMeta,
};
use std::fmt;
use std::str::FromStr;

use solpay::amount::Amount;
use solpay::ledger::{AccountCredit, LedgerError, LedgerLike, SignatureRecord, TransactionDetail};

/// Ledger access over Solana JSON-RPC.
pub struct RpcLedger {
    client: RpcClient,
}

impl fmt::Debug for RpcLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcLedger")
            .field("url", &self.client.url())
            .finish_non_exhaustive()
    }
}

impl RpcLedger {
    /// Creates a ledger client for the given RPC endpoint at `confirmed`
    /// commitment.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self::new_with_commitment(url, CommitmentConfig::confirmed())
    }

    /// Creates a ledger client for the given RPC endpoint and commitment.
    #[must_use]
    pub fn new_with_commitment(url: impl Into<String>, commitment: CommitmentConfig) -> Self {
        Self {
            client: RpcClient::new_with_commitment(url.into(), commitment),
        }
    }

    /// Wraps an already-configured RPC client.
    #[must_use]
    pub const fn from_client(client: RpcClient) -> Self {
        Self { client }
    }

    /// The RPC endpoint queried by this client.
    #[must_use]
    pub fn url(&self) -> String {
        self.client.url()
    }

    /// The commitment level applied to every query.
    #[must_use]
    pub fn commitment(&self) -> CommitmentConfig {
        self.client.commitment()
    }
}

#[async_trait]
impl LedgerLike for RpcLedger {
    async fn signatures_for_reference(
        &self,
        reference: &Pubkey,
        limit: usize,
    ) -> Result<Vec<SignatureRecord>, LedgerError> {
        let config = GetConfirmedSignaturesForAddress2Config {
            before: None,
            until: None,
            limit: Some(limit),
            commitment: Some(self.client.commitment()),
        };
        let statuses = self
            .client
            .get_signatures_for_address_with_config(reference, config)
            .await
            .map_err(|error| LedgerError::Transport(error.to_string()))?;

        #[cfg(feature = "telemetry")]
        tracing::trace!(reference = %reference, matches = statuses.len(), "Reference lookup completed");

        statuses.iter().map(record_from_status).collect()
    }

    async fn transaction_detail(
        &self,
        signature: &Signature,
    ) -> Result<TransactionDetail, LedgerError> {
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Json),
            commitment: Some(self.client.commitment()),
            max_supported_transaction_version: Some(0),
        };
        let response = self
            .client
            .get_transaction_with_config(signature, config)
            .await
            .map_err(|error| LedgerError::Transport(error.to_string()))?;
        detail_from_response(&response)
    }
}

fn record_from_status(
    status: &RpcConfirmedTransactionStatusWithSignature,
) -> Result<SignatureRecord, LedgerError> {
    let signature = Signature::from_str(&status.signature).map_err(|error| {
        LedgerError::MalformedResponse(format!("bad signature '{}': {error}", status.signature))
    })?;
    Ok(SignatureRecord {
        signature,
        slot: status.slot,
    })
}

fn detail_from_response(
    response: &EncodedConfirmedTransactionWithStatusMeta,
) -> Result<TransactionDetail, LedgerError> {
    let meta = response.transaction.meta.as_ref().ok_or_else(|| {
        LedgerError::MalformedResponse("transaction has no status metadata".to_owned())
    })?;
    let account_keys = account_keys(&response.transaction.transaction, meta)?;
    if account_keys.len() != meta.pre_balances.len()
        || account_keys.len() != meta.post_balances.len()
    {
        return Err(LedgerError::MalformedResponse(format!(
            "{} account keys against {} pre and {} post balances",
            account_keys.len(),
            meta.pre_balances.len(),
            meta.post_balances.len()
        )));
    }

    let credits = account_keys
        .iter()
        .zip(
            meta.pre_balances
                .iter()
                .copied()
                .zip(meta.post_balances.iter().copied()),
        )
        .filter(|&(_, (pre, post))| post > pre)
        .map(|(account, (pre, post))| AccountCredit {
            account: *account,
            amount: Amount::from_lamports(post - pre),
        })
        .collect();

    Ok(TransactionDetail {
        execution_error: meta.err.as_ref().map(ToString::to_string),
        account_keys,
        credits,
    })
}

/// Reconstructs the full, balance-ordered account list: static message keys
/// followed by addresses loaded from lookup tables, writable before readonly.
fn account_keys(
    transaction: &EncodedTransaction,
    meta: &UiTransactionStatusMeta,
) -> Result<Vec<Pubkey>, LedgerError> {
    let EncodedTransaction::Json(transaction) = transaction else {
        return Err(LedgerError::MalformedResponse(
            "expected a JSON-encoded transaction".to_owned(),
        ));
    };
    let mut keys: Vec<&String> = match &transaction.message {
        UiMessage::Raw(message) => message.account_keys.iter().collect(),
        UiMessage::Parsed(message) => message
            .account_keys
            .iter()
            .map(|account| &account.pubkey)
            .collect(),
    };
    if let OptionSerializer::Some(loaded) = &meta.loaded_addresses {
        keys.extend(loaded.writable.iter());
        keys.extend(loaded.readonly.iter());
    }
    keys.into_iter().map(|key| parse_key(key)).collect()
}

fn parse_key(key: &str) -> Result<Pubkey, LedgerError> {
    Pubkey::from_str(key)
        .map_err(|error| LedgerError::MalformedResponse(format!("bad account key '{key}': {error}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(n: u8) -> Pubkey {
        Pubkey::new_from_array([n; 32])
    }

    fn transfer_response(
        err: serde_json::Value,
        account_keys: Vec<String>,
        pre_balances: Vec<u64>,
        post_balances: Vec<u64>,
    ) -> serde_json::Value {
        let status = if err.is_null() {
            json!({"Ok": null})
        } else {
            json!({"Err": err.clone()})
        };
        json!({
            "slot": 2414,
            "blockTime": 1_755_700_000,
            "transaction": {
                "signatures": [Signature::from([1; 64]).to_string()],
                "message": {
                    "header": {
                        "numRequiredSignatures": 1,
                        "numReadonlySignedAccounts": 0,
                        "numReadonlyUnsignedAccounts": 2,
                    },
                    "accountKeys": account_keys,
                    "recentBlockhash": key(9).to_string(),
                    "instructions": [],
                },
            },
            "meta": {
                "err": err,
                "status": status,
                "fee": 5000,
                "preBalances": pre_balances,
                "postBalances": post_balances,
            },
            "version": "legacy",
        })
    }

    fn decode(value: serde_json::Value) -> EncodedConfirmedTransactionWithStatusMeta {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_detail_from_successful_transfer() {
        let response = decode(transfer_response(
            json!(null),
            vec![
                key(1).to_string(),
                key(2).to_string(),
                key(3).to_string(),
                Pubkey::default().to_string(),
            ],
            vec![10_000_000_000, 0, 0, 1],
            vec![9_799_995_000, 200_000_000, 0, 1],
        ));

        let detail = detail_from_response(&response).unwrap();

        assert_eq!(detail.execution_error, None);
        assert_eq!(
            detail.account_keys,
            vec![key(1), key(2), key(3), Pubkey::default()]
        );
        assert_eq!(
            detail.credits,
            vec![AccountCredit {
                account: key(2),
                amount: Amount::parse("0.2").unwrap(),
            }]
        );
    }

    #[test]
    fn test_detail_surfaces_execution_error() {
        let response = decode(transfer_response(
            json!({"InstructionError": [0, {"Custom": 1}]}),
            vec![key(1).to_string(), key(2).to_string()],
            vec![10_000_000_000, 0],
            vec![9_999_995_000, 0],
        ));

        let detail = detail_from_response(&response).unwrap();

        assert!(detail.execution_error.is_some());
        assert!(detail.credits.is_empty());
    }

    #[test]
    fn test_detail_appends_loaded_addresses() {
        let mut value = transfer_response(
            json!(null),
            vec![key(1).to_string(), key(2).to_string()],
            vec![1_000_000_000, 1, 0, 5],
            vec![999_000_000, 1, 1_000, 5],
        );
        value["meta"]["loadedAddresses"] = json!({
            "writable": [key(3).to_string()],
            "readonly": [key(4).to_string()],
        });
        let response = decode(value);

        let detail = detail_from_response(&response).unwrap();

        assert_eq!(detail.account_keys, vec![key(1), key(2), key(3), key(4)]);
        assert_eq!(
            detail.credits,
            vec![AccountCredit {
                account: key(3),
                amount: Amount::from_lamports(1_000),
            }]
        );
    }

    #[test]
    fn test_detail_rejects_missing_meta() {
        let mut value = transfer_response(json!(null), vec![key(1).to_string()], vec![1], vec![1]);
        value["meta"] = json!(null);
        let response = decode(value);

        assert!(matches!(
            detail_from_response(&response),
            Err(LedgerError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_detail_rejects_balance_count_mismatch() {
        let response = decode(transfer_response(
            json!(null),
            vec![key(1).to_string(), key(2).to_string()],
            vec![1_000_000_000],
            vec![999_000_000],
        ));

        assert!(matches!(
            detail_from_response(&response),
            Err(LedgerError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_detail_rejects_unparsable_account_key() {
        let response = decode(transfer_response(
            json!(null),
            vec!["not-a-key".to_owned()],
            vec![1],
            vec![1],
        ));

        assert!(matches!(
            detail_from_response(&response),
            Err(LedgerError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_detail_reads_parsed_account_keys() {
        let mut value = transfer_response(json!(null), Vec::new(), vec![10, 20], vec![15, 20]);
        value["transaction"]["message"] = json!({
            "accountKeys": [
                {"pubkey": key(5).to_string(), "writable": true, "signer": true, "source": "transaction"},
                {"pubkey": key(6).to_string(), "writable": false, "signer": false, "source": "transaction"},
            ],
            "recentBlockhash": key(9).to_string(),
            "instructions": [],
            "addressTableLookups": [],
        });
        let response = decode(value);

        let detail = detail_from_response(&response).unwrap();

        assert_eq!(detail.account_keys, vec![key(5), key(6)]);
        assert_eq!(detail.credits.len(), 1);
        assert_eq!(detail.credits[0].account, key(5));
    }

    #[test]
    fn test_record_from_status_parses_signature() {
        let signature = Signature::from([7; 64]);
        let status: RpcConfirmedTransactionStatusWithSignature = serde_json::from_value(json!({
            "signature": signature.to_string(),
            "slot": 2414,
            "err": null,
            "memo": null,
            "blockTime": null,
            "confirmationStatus": "confirmed",
        }))
        .unwrap();

        assert_eq!(
            record_from_status(&status).unwrap(),
            SignatureRecord {
                signature,
                slot: 2414,
            }
        );
    }

    #[test]
    fn test_record_from_status_rejects_bad_signature() {
        let status: RpcConfirmedTransactionStatusWithSignature = serde_json::from_value(json!({
            "signature": "garbage",
            "slot": 1,
            "err": null,
            "memo": null,
            "blockTime": null,
            "confirmationStatus": null,
        }))
        .unwrap();

        assert!(matches!(
            record_from_status(&status),
            Err(LedgerError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_ledger_debug_shows_url() {
        let ledger = RpcLedger::new("http://localhost:8899");
        assert!(format!("{ledger:?}").contains("http://localhost:8899"));
    }
}
