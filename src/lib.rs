//! Connector between a browser-injected EIP-1193 wallet and a
//! connection-state host.
//!
//! The host implements [`Actions`]; the connector detects the injected
//! provider, mirrors its events into the host and negotiates accounts and
//! chain on [`InjectedConnector::activate`].
//!
//! ```no_run
//! use std::rc::Rc;
//!
//! use injected_connector::{
//!     ConnectionStore, ConnectorOptions, DesiredChain, InjectedConnector, WindowSource,
//! };
//!
//! # async fn run() -> Result<(), injected_connector::ConnectorError> {
//! let store = ConnectionStore::new();
//! let connector = InjectedConnector::new(
//!     Rc::new(store.clone()),
//!     WindowSource,
//!     ConnectorOptions::default(),
//! );
//!
//! connector.connect_eagerly().await;
//! if !store.snapshot().is_connected() {
//!     connector.activate(Some(DesiredChain::Id(1))).await?;
//! }
//! # Ok(()) }
//! ```

pub mod config;
pub mod core;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod models;
mod utils;

pub use config::ConnectorOptions;
pub use crate::core::{
    ActivationResult, ConnectorError, InjectedConnector, InjectedProvider, ProviderError,
    ProviderSource, WindowProvider, WindowSource,
};
pub use models::{
    Actions, AddEthereumChainParameter, ChainId, ConnectionState, ConnectionStore,
    ConnectionUpdate, DesiredChain, NativeCurrency, WatchAssetParameters,
};
