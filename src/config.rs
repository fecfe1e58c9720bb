//! Connector configuration.
//!
//! Centralizes the protocol constants used throughout the crate along with
//! [`ConnectorOptions`], the tunable subset a host may override.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// =============================================================================
// Provider Discovery
// =============================================================================

/// Global property the wallet extension injects its provider under.
pub const PROVIDER_GLOBAL: &str = "ethereum";

/// Identity flag set by the wallet this connector targets.
pub const DEFAULT_IDENTITY_FLAG: &str = "isMetaMask";

/// How long to wait for a lazily injected provider, in milliseconds.
pub const DETECT_TIMEOUT_MS: u32 = 3000;

/// Delay between detection polls, in milliseconds.
pub const DETECT_POLL_INTERVAL_MS: u32 = 100;

// =============================================================================
// Chain Negotiation
// =============================================================================

/// Upper bound on `wallet_switchEthereumChain` requests per activation.
///
/// Two covers the "switch, add, switch again" path.
pub const MAX_CHAIN_SWITCHES: usize = 2;

/// Reserved EIP-1193 / EIP-3326 error codes.
pub mod error_codes {
    /// The user rejected the request.
    pub const USER_REJECTED: i64 = 4001;
    /// The requested chain has not been added to the wallet.
    pub const UNRECOGNIZED_CHAIN: i64 = 4902;
}

/// JSON-RPC method names issued against the provider.
pub mod methods {
    pub const CHAIN_ID: &str = "eth_chainId";
    pub const ACCOUNTS: &str = "eth_accounts";
    pub const REQUEST_ACCOUNTS: &str = "eth_requestAccounts";
    pub const NET_VERSION: &str = "net_version";
    pub const SWITCH_CHAIN: &str = "wallet_switchEthereumChain";
    pub const ADD_CHAIN: &str = "wallet_addEthereumChain";
    pub const WATCH_ASSET: &str = "wallet_watchAsset";
}

// =============================================================================
// Cached Property Fallbacks
// =============================================================================

/// Vendor flag for providers that keep a cache of earlier RPC results.
pub const CACHED_RESULTS_FLAG: &str = "isDapper";

/// Path to the cached `net_version` result on such providers.
pub const CACHED_NET_VERSION_PATH: &[&str] = &["cachedResults", "net_version", "result"];

/// Static properties that may hold the chain id, in lookup order.
pub const CHAIN_ID_PROPERTIES: &[&str] = &["chainId", "netVersion", "networkVersion", "_chainId"];

// =============================================================================
// Display
// =============================================================================

/// Shortened address display (`0x1234...5678`).
pub mod eth_address {
    pub const PREFIX_LEN: usize = 6;
    pub const SUFFIX_START: usize = 38;
    pub const FULL_LEN: usize = 42;
}

// =============================================================================
// Options
// =============================================================================

/// Tunable connector behavior.
///
/// Every field has a default, so a host can deserialize a partial JSON object:
///
/// ```
/// use injected_connector::ConnectorOptions;
///
/// let options = ConnectorOptions::from_json(r#"{ "detectTimeoutMs": 500 }"#).unwrap();
/// assert_eq!(options.detect_timeout_ms, 500);
/// assert_eq!(options.identity_flag, "isMetaMask");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConnectorOptions {
    /// Flag marking the targeted wallet among several injected providers.
    pub identity_flag: String,
    /// Treat a provider without the identity flag as not installed.
    pub must_be_identified: bool,
    /// Do not log when an unidentified provider is rejected.
    pub silent: bool,
    pub detect_timeout_ms: u32,
    pub poll_interval_ms: u32,
    pub max_chain_switches: usize,
}

impl Default for ConnectorOptions {
    fn default() -> Self {
        Self {
            identity_flag: DEFAULT_IDENTITY_FLAG.to_string(),
            must_be_identified: false,
            silent: false,
            detect_timeout_ms: DETECT_TIMEOUT_MS,
            poll_interval_ms: DETECT_POLL_INTERVAL_MS,
            max_chain_switches: MAX_CHAIN_SWITCHES,
        }
    }
}

impl ConnectorOptions {
    /// Parse options from JSON, filling missing fields with defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Delay between detection polls.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.poll_interval_ms.max(1)))
    }

    /// Number of polls that fit in the detection window after the first lookup.
    pub fn detect_polls(&self) -> u32 {
        self.detect_timeout_ms / self.poll_interval_ms.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ConnectorOptions::default();
        assert_eq!(options.identity_flag, "isMetaMask");
        assert!(!options.must_be_identified);
        assert_eq!(options.detect_polls(), 30);
        assert_eq!(options.poll_interval(), Duration::from_millis(100));
        assert_eq!(options.max_chain_switches, 2);
    }

    #[test]
    fn test_partial_json() {
        let options =
            ConnectorOptions::from_json(r#"{"identityFlag":"isBraveWallet","mustBeIdentified":true}"#)
                .unwrap();
        assert_eq!(options.identity_flag, "isBraveWallet");
        assert!(options.must_be_identified);
        assert_eq!(options.detect_timeout_ms, DETECT_TIMEOUT_MS);
    }

    #[test]
    fn test_zero_interval_does_not_divide_by_zero() {
        let options = ConnectorOptions {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(options.detect_polls(), DETECT_TIMEOUT_MS);
        assert_eq!(options.poll_interval(), Duration::from_millis(1));
    }
}
