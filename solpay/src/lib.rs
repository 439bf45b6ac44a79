#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Solana Pay transfer requests and asynchronous payment confirmation.
//!
//! This crate builds payment requests a wallet can fulfil and watches the
//! ledger until the payment lands. It never signs or submits transactions
//! itself; all ledger access goes through the [`ledger::LedgerLike`] trait,
//! with a JSON-RPC implementation provided by a separate crate.
//!
//! # Overview
//!
//! A merchant creates a [`request::PaymentRequest`] from an untrusted
//! recipient address and amount. Each request carries a fresh single-use
//! reference key that the payer embeds in the transfer, which is what lets a
//! [`watcher::PaymentWatcher`] find the payment on chain without knowing its
//! signature in advance. The watcher polls on a fixed cadence, validates the
//! first transaction that mentions the reference, and reports exactly one
//! terminal outcome.
//!
//! # Modules
//!
//! - [`amount`] - Exact decimal SOL amount parsing
//! - [`ledger`] - Read-only ledger access trait and record types
//! - [`reference`] - Single-use payment reference keys
//! - [`request`] - Payment request construction and URI encoding
//! - [`validate`] - Transfer validation against a payment request
//! - [`watcher`] - Confirmation polling, cancellation, and outcomes
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation for debugging and monitoring

pub mod amount;
pub mod ledger;
pub mod reference;
pub mod request;
pub mod validate;
pub mod watcher;
