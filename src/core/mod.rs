//! Core connector logic.
//!
//! This module provides:
//! - [`InjectedConnector`] - activation, eager connection and deactivation
//! - [`InjectedProvider`] and [`ProviderSource`] - the provider surface the connector consumes
//! - [`probe`] - fallback chains for chain id and account queries
//! - [`WindowProvider`] - the `window.ethereum` binding

pub mod activation;
mod connector;
pub mod error;
pub mod events;
pub mod probe;
pub mod provider;
pub mod wallet;

pub use connector::{ActivationResult, InjectedConnector};
pub use error::{ConnectorError, ProviderError};
pub use events::{ErrorCallback, ProviderEvent};
pub use provider::{EventHandler, InjectedProvider, ProviderSource};
pub use wallet::{WindowProvider, WindowSource};
