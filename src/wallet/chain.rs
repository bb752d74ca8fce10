use serde::{Deserialize, Serialize};

/// Network parameters in the shape `wallet_addEthereumChain` expects.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    pub chain_id: String,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl Default for ChainConfig {
    /// Filecoin Calibration testnet.
    fn default() -> Self {
        Self {
            chain_id: "0x4cb2f".to_string(),
            chain_name: "Filecoin Calibration".to_string(),
            native_currency: NativeCurrency {
                name: "testnet FIL".to_string(),
                symbol: "tFIL".to_string(),
                decimals: 18,
            },
            rpc_urls: vec!["https://api.calibration.node.glif.io/rpc/v1".to_string()],
            block_explorer_urls: vec!["https://calibration.filfox.info/en".to_string()],
        }
    }
}

impl NativeCurrency {
    /// Renders a base-unit amount, e.g. `10^16` wei as `0.01 tFIL`.
    pub fn format_amount(&self, amount: u128) -> String {
        let scale = 10u128.checked_pow(u32::from(self.decimals));
        let Some(scale) = scale.filter(|_| self.decimals > 0) else {
            return format!("{amount} {}", self.symbol);
        };
        let whole = amount / scale;
        let fraction = amount % scale;
        if fraction == 0 {
            return format!("{whole} {}", self.symbol);
        }
        let digits = format!("{:0width$}", fraction, width = usize::from(self.decimals));
        format!("{whole}.{} {}", digits.trim_end_matches('0'), self.symbol)
    }
}
