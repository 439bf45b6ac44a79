#![allow(clippy::print_stdout)]

//! Command-line Solana Pay checkout: create a transfer request and watch for
//! its payment.
//!
//! # Usage
//!
//! ```bash
//! # Request 0.2 SOL on devnet and wait for the payment
//! solpay-cli <RECIPIENT> 0.2 --label "Cookie Store"
//!
//! # Point at another RPC node and give up after 60 polling cycles
//! SOLPAY_RPC_URL=https://api.mainnet-beta.solana.com solpay-cli <RECIPIENT> 1 --max-attempts 60
//! ```
//!
//! The payment URI is printed to stdout as soon as the request is created;
//! render it as a QR code for the payer. When the watch ends, its outcome is
//! printed as one line of JSON and the exit code reflects it: `0` when the
//! payment confirmed, `130` when cancelled, `1` otherwise.
//!
//! # Environment Variables
//!
//! - `SOLPAY_RPC_URL` — RPC endpoint to watch (default: devnet)
//! - `RUST_LOG` — Log level filter (default: `info`)

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use solpay::request::PaymentRequest;
use solpay::watcher::{
    DEFAULT_LOOKUP_TIMEOUT, DEFAULT_POLL_INTERVAL, DEFAULT_SIGNATURE_LIMIT, PaymentWatcher,
    WatchOptions, WatchOutcome,
};
use solpay_rpc::RpcLedger;

/// Create a Solana Pay transfer request and watch for its payment.
#[derive(Parser, Debug)]
#[command(name = "solpay-cli", version, about, long_about = None)]
struct Cli {
    /// Recipient account address (base58).
    recipient: String,

    /// Transfer amount in SOL.
    amount: String,

    /// Label shown by the payer's wallet.
    #[arg(long)]
    label: Option<String>,

    /// Message shown by the payer's wallet.
    #[arg(long)]
    message: Option<String>,

    /// Memo to attach to the payment transaction.
    #[arg(long)]
    memo: Option<String>,

    /// RPC endpoint to watch.
    #[arg(long, env = "SOLPAY_RPC_URL", default_value = "https://api.devnet.solana.com")]
    rpc_url: String,

    /// Seconds between polling cycles.
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL.as_secs())]
    poll_interval: u64,

    /// Seconds allowed for each ledger call.
    #[arg(long, default_value_t = DEFAULT_LOOKUP_TIMEOUT.as_secs())]
    lookup_timeout: u64,

    /// Polling cycles before giving up; 0 keeps polling until interrupted.
    #[arg(long, default_value_t = 0)]
    max_attempts: u32,

    /// Transactions fetched per reference lookup.
    #[arg(long, default_value_t = DEFAULT_SIGNATURE_LIMIT)]
    limit: usize,
}

#[tokio::main]
async fn main() {
    // Initialize tracing with RUST_LOG env filter
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("Payment watch failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let Cli {
        recipient,
        amount,
        label,
        message,
        memo,
        rpc_url,
        poll_interval,
        lookup_timeout,
        max_attempts,
        limit,
    } = Cli::parse();

    let mut request = PaymentRequest::new(&recipient, &amount)?;
    if let Some(label) = label {
        request = request.with_label(label);
    }
    if let Some(message) = message {
        request = request.with_message(message);
    }
    if let Some(memo) = memo {
        request = request.with_memo(memo);
    }

    tracing::info!(
        recipient = %request.recipient(),
        amount = %request.amount(),
        reference = %request.reference(),
        "Created payment request"
    );
    println!("{}", request.url());

    let options = WatchOptions::new()
        .with_poll_interval(Duration::from_secs(poll_interval))
        .with_lookup_timeout(Duration::from_secs(lookup_timeout))
        .with_max_attempts(max_attempts)
        .with_signature_limit(limit);

    let ledger = Arc::new(RpcLedger::new(rpc_url));
    tracing::info!(rpc_url = %ledger.url(), "Watching for the payment");

    let watcher = PaymentWatcher::new(ledger, options);
    let handle = watcher.start(request)?;

    let cancel = handle.cancellation_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        cancel.cancel();
    });

    let outcome = handle.outcome().await;
    println!("{}", serde_json::to_string(&outcome)?);

    match outcome {
        WatchOutcome::Confirmed { .. } => Ok(()),
        WatchOutcome::Cancelled => std::process::exit(130),
        _ => std::process::exit(1),
    }
}

/// Waits for Ctrl-C or SIGTERM (Unix) to cancel the watch.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => tracing::info!("Received Ctrl-C, cancelling the watch..."),
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, cancelling the watch..."),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for Ctrl-C");
        tracing::info!("Received Ctrl-C, cancelling the watch...");
    }
}
