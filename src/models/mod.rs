//! Data models shared by the connector and its host.
//!
//! Contains domain types for:
//! - [`ChainId`], [`DesiredChain`], [`AddEthereumChainParameter`] - Chain selection and negotiation
//! - [`Actions`], [`ConnectionUpdate`], [`ConnectionStore`] - Host connection state
//! - [`WatchAssetParameters`] - Token registration requests

mod asset;
pub mod chain;
mod state;

pub use asset::WatchAssetParameters;
pub use chain::{AddEthereumChainParameter, ChainId, DesiredChain, NativeCurrency, chain_name, describe_chain};
pub use state::{
    Actions, CancelActivation, ConnectionState, ConnectionStore, ConnectionUpdate,
};
