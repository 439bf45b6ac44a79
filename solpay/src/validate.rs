//! Structural validation of a candidate payment transaction.
//!
//! Once the watcher finds a transaction mentioning a request's reference, the
//! transaction must still prove it pays the request: referencing the key is
//! necessary but not sufficient. Execution success is checked by the watcher
//! before this runs.

use solana_pubkey::Pubkey;

use crate::amount::Amount;
use crate::ledger::TransactionDetail;
use crate::request::PaymentRequest;

/// Ways a looked-up transaction can fail to pay its request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferMismatch {
    /// The transaction does not include the reference among its account keys.
    #[error("transaction does not reference the payment key")]
    ReferenceNotFound,

    /// The recipient account received nothing.
    #[error("recipient {0} was not credited")]
    RecipientNotCredited(Pubkey),

    /// The recipient was credited, but not the requested amount.
    #[error("expected a transfer of {expected}, found {actual}")]
    WrongAmount {
        /// Amount the request asked for.
        expected: Amount,
        /// Amount the recipient actually received.
        actual: Amount,
    },
}

/// Checks that a fetched transaction actually pays the request.
///
/// The transaction must reference the request's key and credit the recipient
/// exactly the requested amount. Overpayment and underpayment both fail; the
/// comparison is numeric, so lamport-scale representations of the same value
/// match.
///
/// # Errors
///
/// Returns the first [`TransferMismatch`] encountered.
pub fn validate_transfer(
    request: &PaymentRequest,
    detail: &TransactionDetail,
) -> Result<(), TransferMismatch> {
    if !detail
        .account_keys
        .contains(request.reference().as_pubkey())
    {
        return Err(TransferMismatch::ReferenceNotFound);
    }

    let recipient = request.recipient();
    let credit = detail
        .credits
        .iter()
        .find(|credit| credit.account == recipient)
        .ok_or(TransferMismatch::RecipientNotCredited(recipient))?;

    if credit.amount != request.amount() {
        return Err(TransferMismatch::WrongAmount {
            expected: request.amount(),
            actual: credit.amount,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::AccountCredit;

    fn request() -> PaymentRequest {
        let recipient = Pubkey::new_from_array([7; 32]).to_string();
        PaymentRequest::new(&recipient, "0.2").unwrap()
    }

    fn paying_detail(request: &PaymentRequest) -> TransactionDetail {
        TransactionDetail {
            execution_error: None,
            account_keys: vec![
                Pubkey::new_from_array([1; 32]),
                request.recipient(),
                *request.reference().as_pubkey(),
            ],
            credits: vec![AccountCredit {
                account: request.recipient(),
                amount: Amount::from_lamports(200_000_000),
            }],
        }
    }

    #[test]
    fn test_valid_transfer_passes() {
        let request = request();
        let detail = paying_detail(&request);
        assert_eq!(validate_transfer(&request, &detail), Ok(()));
    }

    #[test]
    fn test_missing_reference_fails() {
        let request = request();
        let mut detail = paying_detail(&request);
        detail.account_keys.retain(|key| key != request.reference().as_pubkey());
        assert_eq!(
            validate_transfer(&request, &detail),
            Err(TransferMismatch::ReferenceNotFound)
        );
    }

    #[test]
    fn test_uncredited_recipient_fails() {
        let request = request();
        let mut detail = paying_detail(&request);
        detail.credits.clear();
        assert_eq!(
            validate_transfer(&request, &detail),
            Err(TransferMismatch::RecipientNotCredited(request.recipient()))
        );
    }

    #[test]
    fn test_credit_to_other_account_fails() {
        let request = request();
        let mut detail = paying_detail(&request);
        detail.credits[0].account = Pubkey::new_from_array([9; 32]);
        assert_eq!(
            validate_transfer(&request, &detail),
            Err(TransferMismatch::RecipientNotCredited(request.recipient()))
        );
    }

    #[test]
    fn test_underpayment_fails() {
        let request = request();
        let mut detail = paying_detail(&request);
        detail.credits[0].amount = Amount::from_lamports(199_999_999);
        assert!(matches!(
            validate_transfer(&request, &detail),
            Err(TransferMismatch::WrongAmount { .. })
        ));
    }

    #[test]
    fn test_overpayment_fails() {
        let request = request();
        let mut detail = paying_detail(&request);
        detail.credits[0].amount = Amount::from_lamports(300_000_000);
        assert!(matches!(
            validate_transfer(&request, &detail),
            Err(TransferMismatch::WrongAmount { .. })
        ));
    }

    #[test]
    fn test_equivalent_scales_match() {
        let request = request();
        let mut detail = paying_detail(&request);
        // 0.2 SOL observed as a full-scale lamport decimal.
        detail.credits[0].amount = Amount::parse("0.200000000").unwrap();
        assert_eq!(validate_transfer(&request, &detail), Ok(()));
    }
}
