//! Pay-to-verify wallet session for IPFS-backed responses.
//!
//! A [`WalletClient`] is created disconnected. [`WalletClient::connect`]
//! asks the provider for an account, moves the wallet to the configured
//! chain and binds the verification contract; [`WalletClient::disconnect`]
//! drops all of it again.
pub mod abi;
pub mod chain;
pub mod provider;
pub mod verify;

use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::WalletParams;
use abi::{AbiError, Token};
use provider::{ProviderError, WalletProvider, UNRECOGNIZED_CHAIN, USER_REJECTED};

pub use provider::HttpWalletProvider;
pub use verify::{verify, Confirmation, PaymentRequest, SystemOpener, UrlOpener, VerifyOutcome};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("wallet connection failed: {0}")]
    Connection(ProviderError),
    #[error("wallet returned no accounts")]
    NoAccount,
    #[error("verification contract address is not configured")]
    ContractUnavailable,
    #[error("wallet is not connected")]
    NotConnected,
    #[error("invalid content handle")]
    InvalidHandle,
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("request rejected in the wallet")]
    Rejected,
    #[error("{0}")]
    Provider(ProviderError),
    #[error("unexpected wallet response: {0}")]
    Decode(String),
}

impl From<AbiError> for WalletError {
    fn from(error: AbiError) -> Self {
        WalletError::Decode(error.to_string())
    }
}

/// Maps provider failures onto the cases the user is told about.
pub fn classify(error: ProviderError) -> WalletError {
    let message = error.message.to_lowercase();
    if message.contains("insufficient funds") {
        WalletError::InsufficientFunds
    } else if error.code == USER_REJECTED || message.contains("user rejected") {
        WalletError::Rejected
    } else {
        WalletError::Provider(error)
    }
}

/// State held while connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletSession {
    pub account: String,
    pub contract: String,
    /// False when the wallet stayed on its previous network.
    pub on_target_chain: bool,
}

pub struct WalletClient<P> {
    provider: P,
    params: WalletParams,
    session: Option<WalletSession>,
}

impl<P: WalletProvider> WalletClient<P> {
    pub fn new(provider: P, params: WalletParams) -> Self {
        Self {
            provider,
            params,
            session: None,
        }
    }

    pub fn params(&self) -> &WalletParams {
        &self.params
    }

    pub fn session(&self) -> Option<&WalletSession> {
        self.session.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    #[instrument(skip(self))]
    pub async fn connect(&mut self) -> Result<&WalletSession, WalletError> {
        self.provider
            .request("eth_requestAccounts", json!([]))
            .await
            .map_err(|e| match classify(e) {
                WalletError::Provider(e) => WalletError::Connection(e),
                other => other,
            })?;

        let on_target_chain = self.switch_chain().await;
        if !on_target_chain {
            warn!(
                chain = %self.params.chain.chain_name,
                "Failed to switch network, continuing with current network"
            );
        }

        let accounts = self
            .provider
            .request("eth_accounts", json!([]))
            .await
            .map_err(WalletError::Connection)?;
        let account = accounts
            .as_array()
            .and_then(|list| list.first())
            .and_then(Value::as_str)
            .filter(|a| !a.is_empty())
            .ok_or(WalletError::NoAccount)?
            .to_string();

        let contract = self.params.contract_address.trim().to_string();
        if contract.is_empty() {
            return Err(WalletError::ContractUnavailable);
        }

        info!(%account, %contract, "Wallet connected");
        Ok(&*self.session.insert(WalletSession {
            account,
            contract,
            on_target_chain,
        }))
    }

    pub fn disconnect(&mut self) {
        if self.session.take().is_some() {
            info!("Wallet disconnected");
        }
    }

    /// Switches to the configured chain, adding it first when the wallet
    /// does not know it.
    async fn switch_chain(&self) -> bool {
        let chain = &self.params.chain;
        let switched = self
            .provider
            .request(
                "wallet_switchEthereumChain",
                json!([{ "chainId": chain.chain_id }]),
            )
            .await;
        match switched {
            Ok(_) => true,
            Err(e) if e.code == UNRECOGNIZED_CHAIN => {
                let params = match serde_json::to_value(chain) {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(error = %e, "Could not encode chain parameters");
                        return false;
                    }
                };
                match self
                    .provider
                    .request("wallet_addEthereumChain", Value::Array(vec![params]))
                    .await
                {
                    Ok(_) => {
                        info!(chain = %chain.chain_name, "Added network to wallet");
                        true
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to add network");
                        false
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to switch network");
                false
            }
        }
    }

    fn connected(&self) -> Result<&WalletSession, WalletError> {
        self.session.as_ref().ok_or(WalletError::NotConnected)
    }

    async fn call(&self, data: String) -> Result<String, WalletError> {
        let session = self.connected()?;
        let result = self
            .provider
            .request(
                "eth_call",
                json!([{ "to": session.contract, "data": data }, "latest"]),
            )
            .await
            .map_err(classify)?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| WalletError::Decode(format!("eth_call returned {result}")))
    }

    /// Whether the connected account already paid for `handle`. Failed
    /// queries read as unpaid.
    #[instrument(skip(self))]
    pub async fn has_paid(&self, handle: &str) -> bool {
        let Ok(session) = self.connected() else {
            warn!("Missing wallet session when checking payment");
            return false;
        };
        if handle.is_empty() {
            return false;
        }
        let data = match abi::encode_call(
            abi::HAS_USER_PAID_FOR_VERIFICATION,
            &[
                Token::Address(session.account.clone()),
                Token::String(handle.to_string()),
            ],
        ) {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "Could not encode payment query");
                return false;
            }
        };
        match self.call(data).await.and_then(|raw| abi::decode_bool(&raw).map_err(WalletError::from)) {
            Ok(paid) => {
                info!(paid, "Payment status");
                paid
            }
            Err(e) => {
                warn!(error = %e, "Error checking payment status");
                false
            }
        }
    }

    /// Current price in the chain's base unit.
    pub async fn price(&self) -> Result<u128, WalletError> {
        let data = abi::encode_call(abi::VERIFICATION_PRICE, &[])?;
        let raw = self.call(data).await?;
        Ok(abi::decode_uint(&raw)?)
    }

    /// Pays for `handle` and returns the transaction hash.
    #[instrument(skip(self))]
    pub async fn pay(&self, handle: &str) -> Result<String, WalletError> {
        let session = self.connected()?;
        if handle.is_empty() {
            return Err(WalletError::InvalidHandle);
        }

        let price = self.price().await?;
        let data = abi::encode_call(
            abi::PAY_FOR_VERIFICATION,
            &[Token::String(handle.to_string())],
        )?;
        let value = abi::to_quantity(price);

        let estimate = self
            .provider
            .request(
                "eth_estimateGas",
                json!([{
                    "from": session.account,
                    "to": session.contract,
                    "value": value,
                    "data": data,
                }]),
            )
            .await
            .map_err(classify)?;
        let estimate = estimate
            .as_str()
            .ok_or_else(|| WalletError::Decode(format!("eth_estimateGas returned {estimate}")))?;
        let gas = gas_with_buffer(abi::parse_quantity(estimate)?);

        let tx = self
            .provider
            .request(
                "eth_sendTransaction",
                json!([{
                    "from": session.account,
                    "to": session.contract,
                    "value": value,
                    "data": data,
                    "gas": abi::to_quantity(gas),
                }]),
            )
            .await
            .map_err(classify)?;
        let tx_hash = tx
            .as_str()
            .ok_or_else(|| WalletError::Decode(format!("eth_sendTransaction returned {tx}")))?
            .to_string();
        info!(%tx_hash, "Payment successful");
        Ok(tx_hash)
    }
}

/// Gas estimate plus a 20% margin, rounded down.
pub fn gas_with_buffer(estimate: u128) -> u128 {
    estimate.saturating_mul(12) / 10
}
