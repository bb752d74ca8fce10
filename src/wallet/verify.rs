//! The "Verify" affordance: open a response on the gateway, paying first
//! when the contract says the user has not paid for it yet.
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, instrument, warn};

use super::provider::WalletProvider;
use super::{WalletClient, WalletError};
use crate::config::GatewayParams;
use crate::transcript::{ChatSurface, Notice, NoticeLevel};

pub const ERROR_NOTICE_TTL: Duration = Duration::from_secs(5);
pub const SUCCESS_NOTICE_TTL: Duration = Duration::from_secs(3);

pub const ALREADY_PAID_TEXT: &str = "Opening verified response on IPFS...";
pub const PAYMENT_CONFIRMED_TEXT: &str = "Payment confirmed! Opening verified response...";

/// What the confirmation prompt shows before paying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub handle: String,
    /// Display price, `None` when the contract could not be read.
    pub price: Option<String>,
    pub chain_name: String,
}

#[async_trait]
pub trait Confirmation: Send + Sync {
    /// Resolves to true only when the user accepts the payment.
    async fn request_confirmation(&self, request: &PaymentRequest) -> bool;
}

pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<(), String>;
}

/// Opens URLs in the system browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl UrlOpener for SystemOpener {
    fn open(&self, url: &str) -> Result<(), String> {
        opener::open_browser(url).map_err(|e| format!("Failed to open {url}: {e}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Opened without paying again.
    OpenedPaid(String),
    /// Paid in this flow, then opened.
    OpenedAfterPayment { url: String, tx_hash: String },
    Declined,
    Failed(WalletError),
}

/// Message shown for a wallet failure.
pub fn failure_text(error: &WalletError) -> &'static str {
    match error {
        WalletError::Connection(_) | WalletError::NoAccount => {
            "Failed to connect to the wallet. Please check your wallet connection."
        }
        WalletError::ContractUnavailable => {
            "Smart contract not available. Please check your connection."
        }
        WalletError::NotConnected => "Please connect your wallet first",
        WalletError::InvalidHandle => "Invalid IPFS hash",
        WalletError::InsufficientFunds => {
            "Insufficient tFIL balance. Please add more tFIL to your wallet."
        }
        WalletError::Rejected => "Transaction cancelled by user.",
        WalletError::Provider(_) | WalletError::Decode(_) => "Payment failed. Please try again.",
    }
}

fn notify(surface: &mut dyn ChatSurface, level: NoticeLevel, text: &str) {
    let ttl = match level {
        NoticeLevel::Error => ERROR_NOTICE_TTL,
        _ => SUCCESS_NOTICE_TTL,
    };
    surface.notice(&Notice::new(level, text, ttl));
}

fn fail(surface: &mut dyn ChatSurface, error: WalletError) -> VerifyOutcome {
    warn!(error = %error, "Verification failed");
    notify(surface, NoticeLevel::Error, failure_text(&error));
    VerifyOutcome::Failed(error)
}

/// Connects on first use, then opens the gateway URL for `handle` if the
/// user has paid or pays now after confirming. Nothing is retried.
#[instrument(skip(wallet, gateway, confirmation, opener, surface))]
pub async fn verify<P: WalletProvider>(
    wallet: &mut WalletClient<P>,
    handle: &str,
    gateway: &GatewayParams,
    confirmation: &dyn Confirmation,
    opener: &dyn UrlOpener,
    surface: &mut dyn ChatSurface,
) -> VerifyOutcome {
    if handle.is_empty() {
        return fail(surface, WalletError::InvalidHandle);
    }
    if !wallet.is_connected() {
        info!("Wallet not connected, connecting");
        if let Err(e) = wallet.connect().await {
            return fail(surface, e);
        }
    }

    let url = gateway.url_for(handle);
    if wallet.has_paid(handle).await {
        info!("Already paid, opening gateway");
        notify(surface, NoticeLevel::Success, ALREADY_PAID_TEXT);
        open(opener, &url, surface);
        return VerifyOutcome::OpenedPaid(url);
    }

    let price = match wallet.price().await {
        Ok(amount) => Some(wallet.params().chain.native_currency.format_amount(amount)),
        Err(e) => {
            warn!(error = %e, "Could not read verification price");
            None
        }
    };
    let request = PaymentRequest {
        handle: handle.to_string(),
        price,
        chain_name: wallet.params().chain.chain_name.clone(),
    };
    if !confirmation.request_confirmation(&request).await {
        info!("Payment declined");
        return VerifyOutcome::Declined;
    }

    match wallet.pay(handle).await {
        Ok(tx_hash) => {
            notify(surface, NoticeLevel::Success, PAYMENT_CONFIRMED_TEXT);
            open(opener, &url, surface);
            VerifyOutcome::OpenedAfterPayment { url, tx_hash }
        }
        Err(e) => fail(surface, e),
    }
}

fn open(opener: &dyn UrlOpener, url: &str, surface: &mut dyn ChatSurface) {
    if let Err(e) = opener.open(url) {
        warn!(error = %e, "Could not open gateway URL");
        notify(surface, NoticeLevel::Error, &e);
    }
}
