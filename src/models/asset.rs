//! Token registration requests (EIP-747 `wallet_watchAsset`).

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::chain::ChainId;

/// An ERC-20 token to add to the wallet's asset list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchAssetParameters {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Chain the token lives on; the wallet is switched there first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<ChainId>,
}

impl WatchAssetParameters {
    /// Request params for `wallet_watchAsset`.
    pub fn to_request_params(&self) -> Value {
        let mut options = json!({
            "address": self.address.to_checksum(None),
            "symbol": self.symbol,
            "decimals": self.decimals,
        });
        if let Some(image) = &self.image {
            options["image"] = json!(image);
        }
        json!({ "type": "ERC20", "options": options })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn test_request_params() {
        let asset = WatchAssetParameters {
            address: address!("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"),
            symbol: "USDC".to_string(),
            decimals: 6,
            image: None,
            chain_id: Some(1),
        };
        let params = asset.to_request_params();
        assert_eq!(params["type"], "ERC20");
        assert_eq!(
            params["options"]["address"],
            "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"
        );
        assert_eq!(params["options"]["decimals"], 6);
        assert!(params["options"].get("image").is_none());
        assert!(params["options"].get("chainId").is_none());
    }
}
