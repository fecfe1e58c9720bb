//! Chain identifiers and chain negotiation parameters.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub use alloy_primitives::ChainId;

/// Native currency of a chain, as `wallet_addEthereumChain` expects it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Full parameter set for registering a chain with the wallet (EIP-3085).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddEthereumChainParameter {
    pub chain_id: ChainId,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_explorer_urls: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_urls: Option<Vec<String>>,
}

impl AddEthereumChainParameter {
    /// Request params for `wallet_addEthereumChain`, with `chainId` hex-encoded.
    pub fn to_request_params(&self) -> Value {
        let mut params = json!({
            "chainId": to_hex(self.chain_id),
            "chainName": self.chain_name,
            "nativeCurrency": {
                "name": self.native_currency.name,
                "symbol": self.native_currency.symbol,
                "decimals": self.native_currency.decimals,
            },
            "rpcUrls": self.rpc_urls,
        });
        if let Some(urls) = &self.block_explorer_urls {
            params["blockExplorerUrls"] = json!(urls);
        }
        if let Some(urls) = &self.icon_urls {
            params["iconUrls"] = json!(urls);
        }
        json!([params])
    }
}

/// The chain a caller wants the wallet on after activation.
///
/// A bare id can only be switched to; full parameters also allow adding the
/// chain when the wallet does not know it yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DesiredChain {
    Id(ChainId),
    Parameters(AddEthereumChainParameter),
}

impl DesiredChain {
    pub fn chain_id(&self) -> ChainId {
        match self {
            Self::Id(id) => *id,
            Self::Parameters(params) => params.chain_id,
        }
    }

    pub fn parameters(&self) -> Option<&AddEthereumChainParameter> {
        match self {
            Self::Id(_) => None,
            Self::Parameters(params) => Some(params),
        }
    }
}

impl From<ChainId> for DesiredChain {
    fn from(id: ChainId) -> Self {
        Self::Id(id)
    }
}

impl From<AddEthereumChainParameter> for DesiredChain {
    fn from(params: AddEthereumChainParameter) -> Self {
        Self::Parameters(params)
    }
}

/// Encode a chain id the way wallet RPC methods expect it (`0x1`).
pub fn to_hex(chain_id: ChainId) -> String {
    format!("{:#x}", chain_id)
}

/// Normalize a chain id reported by any provider generation.
///
/// Numbers pass through. Strings starting with `0x` (or the `Ox` typo some
/// wallets emit) are hex, anything else is a decimal network version.
pub fn parse_chain_id(value: &Value) -> Option<ChainId> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => {
            let s = s.trim();
            match s.get(..2) {
                Some(prefix) if prefix.eq_ignore_ascii_case("0x") || prefix == "Ox" => {
                    ChainId::from_str_radix(&s[2..], 16).ok()
                }
                _ => s.parse().ok(),
            }
        }
        _ => None,
    }
}

/// Parse a `chainChanged` payload, which is always base-16.
pub fn parse_hex_chain_id(value: &Value) -> Option<ChainId> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => {
            let s = s.trim();
            let digits = s
                .strip_prefix("0x")
                .or_else(|| s.strip_prefix("0X"))
                .unwrap_or(s);
            ChainId::from_str_radix(digits, 16).ok()
        }
        _ => None,
    }
}

/// Networks the connector can name in logs and host state.
const KNOWN_CHAINS: &[(ChainId, &str)] = &[
    (1, "Ethereum"),
    (10, "OP Mainnet"),
    (56, "BNB Smart Chain"),
    (137, "Polygon"),
    (8453, "Base"),
    (17000, "Holesky"),
    (42161, "Arbitrum One"),
    (43114, "Avalanche C-Chain"),
    (59144, "Linea"),
    (11155111, "Sepolia"),
];

pub fn chain_name(chain_id: ChainId) -> Option<&'static str> {
    KNOWN_CHAINS
        .iter()
        .find(|(id, _)| *id == chain_id)
        .map(|(_, name)| *name)
}

/// `"Polygon (137)"`, or `"chain 999"` for unknown networks.
pub fn describe_chain(chain_id: ChainId) -> String {
    match chain_name(chain_id) {
        Some(name) => format!("{} ({})", name, chain_id),
        None => format!("chain {}", chain_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn polygon() -> AddEthereumChainParameter {
        AddEthereumChainParameter {
            chain_id: 137,
            chain_name: "Polygon".to_string(),
            native_currency: NativeCurrency {
                name: "MATIC".to_string(),
                symbol: "MATIC".to_string(),
                decimals: 18,
            },
            rpc_urls: vec!["https://polygon-rpc.com".to_string()],
            block_explorer_urls: Some(vec!["https://polygonscan.com".to_string()]),
            icon_urls: None,
        }
    }

    #[test]
    fn test_to_hex() {
        assert_eq!(to_hex(1), "0x1");
        assert_eq!(to_hex(137), "0x89");
        assert_eq!(to_hex(11155111), "0xaa36a7");
    }

    #[test]
    fn test_parse_chain_id_normalizes_encodings() {
        assert_eq!(parse_chain_id(&json!("0x3")), Some(3));
        assert_eq!(parse_chain_id(&json!("0X89")), Some(137));
        assert_eq!(parse_chain_id(&json!("Ox10")), Some(16));
        assert_eq!(parse_chain_id(&json!("10")), Some(10));
        assert_eq!(parse_chain_id(&json!(" 42 ")), Some(42));
        assert_eq!(parse_chain_id(&json!(5)), Some(5));
    }

    #[test]
    fn test_parse_chain_id_rejects_unusable_values() {
        assert_eq!(parse_chain_id(&json!("")), None);
        assert_eq!(parse_chain_id(&json!("0x")), None);
        assert_eq!(parse_chain_id(&json!("mainnet")), None);
        assert_eq!(parse_chain_id(&Value::Null), None);
        assert_eq!(parse_chain_id(&json!(-1)), None);
    }

    #[test]
    fn test_parse_hex_chain_id() {
        assert_eq!(parse_hex_chain_id(&json!("0x1")), Some(1));
        assert_eq!(parse_hex_chain_id(&json!("10")), Some(16));
        assert_eq!(parse_hex_chain_id(&json!(137)), Some(137));
        assert_eq!(parse_hex_chain_id(&json!(null)), None);
    }

    #[test]
    fn test_desired_chain() {
        let bare = DesiredChain::from(5);
        assert_eq!(bare.chain_id(), 5);
        assert!(bare.parameters().is_none());

        let full = DesiredChain::from(polygon());
        assert_eq!(full.chain_id(), 137);
        assert_eq!(full.parameters().map(|p| p.chain_name.as_str()), Some("Polygon"));
    }

    #[test]
    fn test_add_chain_params_use_hex_chain_id() {
        let params = polygon().to_request_params();
        assert_eq!(params[0]["chainId"], "0x89");
        assert_eq!(params[0]["chainName"], "Polygon");
        assert_eq!(params[0]["nativeCurrency"]["decimals"], 18);
        assert_eq!(params[0]["blockExplorerUrls"][0], "https://polygonscan.com");
        assert!(params[0].get("iconUrls").is_none());
    }

    #[test]
    fn test_deserialize_from_host_config() {
        let params: AddEthereumChainParameter = serde_json::from_value(json!({
            "chainId": 10,
            "chainName": "Optimism",
            "nativeCurrency": { "name": "Ether", "symbol": "ETH", "decimals": 18 },
            "rpcUrls": ["https://mainnet.optimism.io"]
        }))
        .unwrap();
        assert_eq!(params.chain_id, 10);
        assert_eq!(params.block_explorer_urls, None);
    }

    #[test]
    fn test_chain_name() {
        assert_eq!(chain_name(1), Some("Ethereum"));
        assert_eq!(chain_name(8453), Some("Base"));
        assert_eq!(chain_name(999_999), None);
        assert_eq!(describe_chain(137), "Polygon (137)");
        assert_eq!(describe_chain(999_999), "chain 999999");
    }
}
