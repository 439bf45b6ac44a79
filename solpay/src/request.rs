//! Payment request construction and URL encoding.
//!
//! A [`PaymentRequest`] is built from untrusted recipient and amount text,
//! validated up front, and never mutated afterwards. Its canonical form for
//! wallets is the Solana Pay transfer-request URL produced by
//! [`PaymentRequest::url`]:
//!
//! ```text
//! solana:<recipient>?amount=<amount>&reference=<reference>&label=...&message=...&memo=...
//! ```

use solana_pubkey::{ParsePubkeyError, Pubkey};
use std::str::FromStr;
use url::Url;

use crate::amount::{Amount, AmountError};
use crate::reference::Reference;

/// Errors from building a payment request out of untrusted input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// The recipient is not a base58 string decoding to a 32-byte key.
    #[error("invalid recipient address: {0}")]
    InvalidAddress(#[from] ParsePubkeyError),

    /// The amount is not a strictly positive decimal number.
    #[error("invalid payment amount: {0}")]
    InvalidAmount(#[from] AmountError),
}

/// An immutable request for one payment.
///
/// Carries the validated recipient and amount, a fresh single-use
/// [`Reference`] for on-ledger discovery, and optional display fields that
/// wallets show to the payer but nothing verifies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    recipient: Pubkey,
    amount: Amount,
    reference: Reference,
    label: Option<String>,
    message: Option<String>,
    memo: Option<String>,
}

impl PaymentRequest {
    /// Builds a request from untrusted recipient and amount text.
    ///
    /// The reference is drawn only after both inputs validate, so a rejected
    /// input never consumes a reference.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::InvalidAddress`] if the recipient does not
    /// decode as a base58 32-byte key, or [`RequestError::InvalidAmount`] if
    /// the amount is not a strictly positive decimal.
    pub fn new(recipient: &str, amount: &str) -> Result<Self, RequestError> {
        let recipient = Pubkey::from_str(recipient.trim())?;
        let amount = Amount::parse(amount)?;
        Ok(Self {
            recipient,
            amount,
            reference: Reference::generate(),
            label: None,
            message: None,
            memo: None,
        })
    }

    /// Sets the label wallets display as the payee name.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets the message wallets display as the payment description.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets the memo to be recorded with the transaction.
    #[must_use]
    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    /// The validated recipient account.
    #[must_use]
    pub const fn recipient(&self) -> Pubkey {
        self.recipient
    }

    /// The exact amount the recipient must receive.
    #[must_use]
    pub const fn amount(&self) -> Amount {
        self.amount
    }

    /// The single-use reference key for on-ledger discovery.
    #[must_use]
    pub const fn reference(&self) -> Reference {
        self.reference
    }

    /// The display label, if set.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The display message, if set.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// The transaction memo, if set.
    #[must_use]
    pub fn memo(&self) -> Option<&str> {
        self.memo.as_deref()
    }

    /// Encodes the request as a Solana Pay transfer-request URL.
    ///
    /// Optional fields are omitted from the query when unset. Values are
    /// form-encoded, which wallets decode back verbatim.
    ///
    /// # Panics
    ///
    /// Never panics in practice: the path is a base58 key, which is always a
    /// valid opaque URL body.
    #[must_use]
    pub fn url(&self) -> Url {
        let mut url = Url::parse(&format!("solana:{}", self.recipient))
            .expect("base58 key is a valid opaque URL body");
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("amount", &self.amount.to_string());
            pairs.append_pair("reference", &self.reference.to_string());
            if let Some(label) = &self.label {
                pairs.append_pair("label", label);
            }
            if let Some(message) = &self.message {
                pairs.append_pair("message", message);
            }
            if let Some(memo) = &self.memo {
                pairs.append_pair("memo", memo);
            }
        }
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn recipient_text() -> String {
        Pubkey::new_from_array([7; 32]).to_string()
    }

    #[test]
    fn test_new_accepts_valid_input() {
        let request = PaymentRequest::new(&recipient_text(), "0.2").unwrap();
        assert_eq!(request.recipient().to_string(), recipient_text());
        assert_eq!(request.amount().to_string(), "0.2");
        assert!(request.label().is_none());
    }

    #[test]
    fn test_new_rejects_malformed_address() {
        for address in ["", "abc", "not-a-valid-address", "O0Il", "solana:xyz"] {
            assert!(
                matches!(
                    PaymentRequest::new(address, "1"),
                    Err(RequestError::InvalidAddress(_))
                ),
                "expected '{address}' to be rejected"
            );
        }
    }

    #[test]
    fn test_new_rejects_wrong_length_key() {
        // Valid base58, but decodes to fewer than 32 bytes.
        let result = PaymentRequest::new("abcde12345", "1");
        assert!(matches!(result, Err(RequestError::InvalidAddress(_))));
    }

    #[test]
    fn test_new_rejects_bad_amounts() {
        for amount in ["0", "-3", "cookies", "1e9", ""] {
            assert!(
                matches!(
                    PaymentRequest::new(&recipient_text(), amount),
                    Err(RequestError::InvalidAmount(_))
                ),
                "expected amount '{amount}' to be rejected"
            );
        }
    }

    #[test]
    fn test_references_are_unique_per_request() {
        let first = PaymentRequest::new(&recipient_text(), "1").unwrap();
        let second = PaymentRequest::new(&recipient_text(), "1").unwrap();
        assert_ne!(first.reference(), second.reference());
    }

    #[test]
    fn test_url_contains_all_fields() {
        let request = PaymentRequest::new(&recipient_text(), "0.2")
            .unwrap()
            .with_label("Cookie Store")
            .with_message("2 chocolate cookies")
            .with_memo("order-42");
        let url = request.url();

        assert_eq!(url.scheme(), "solana");
        assert_eq!(url.path(), recipient_text());

        let pairs: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["amount"], "0.2");
        assert_eq!(pairs["reference"], request.reference().to_string());
        assert_eq!(pairs["label"], "Cookie Store");
        assert_eq!(pairs["message"], "2 chocolate cookies");
        assert_eq!(pairs["memo"], "order-42");
    }

    #[test]
    fn test_url_omits_unset_fields() {
        let request = PaymentRequest::new(&recipient_text(), "1").unwrap();
        let url = request.url();
        let keys: Vec<String> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();
        assert_eq!(keys, vec!["amount", "reference"]);
    }

    #[test]
    fn test_url_normalizes_amount() {
        let request = PaymentRequest::new(&recipient_text(), "1.50").unwrap();
        let pairs: HashMap<String, String> = request.url().query_pairs().into_owned().collect();
        assert_eq!(pairs["amount"], "1.5");
    }

    #[test]
    fn test_url_parses_back() {
        let request = PaymentRequest::new(&recipient_text(), "0.5")
            .unwrap()
            .with_label("A & B");
        let reparsed = Url::parse(request.url().as_str()).unwrap();
        let pairs: HashMap<String, String> = reparsed.query_pairs().into_owned().collect();
        assert_eq!(pairs["label"], "A & B");
    }
}
