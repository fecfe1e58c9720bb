//! Injected provider surface and provider acquisition.
//!
//! [`InjectedProvider`] is the defensive view of an EIP-1193 object: every
//! entry point may be missing, in which case it reports
//! [`ProviderError::Unsupported`]. [`ProviderSource`] is where providers come
//! from, so the browser global can be swapped for a mock.

use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::ConnectorOptions;
use crate::core::error::ProviderError;
use crate::utils::console;

/// Callback invoked with an event payload.
pub type EventHandler = Rc<dyn Fn(Value)>;

/// An injected wallet provider.
///
/// Implementations are cheap handles onto a shared object; cloning never
/// duplicates the underlying wallet.
#[async_trait(?Send)]
pub trait InjectedProvider: Clone + 'static {
    /// Handle returned by [`on`](Self::on) and needed to remove that exact
    /// listener again.
    type Listener;

    /// Modern `request({ method, params })`.
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, ProviderError>;

    /// Legacy promise-returning `send(method, params)`.
    async fn send(&self, method: &str, params: Option<Value>) -> Result<Value, ProviderError>;

    /// Legacy `send({ method, params }, callback)`, which may also answer
    /// synchronously.
    async fn send_payload(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, ProviderError>;

    /// Legacy `enable()`.
    async fn enable(&self) -> Result<Value, ProviderError>;

    /// Read a (possibly nested) property, e.g. `["cachedResults", "net_version"]`.
    fn property(&self, path: &[&str]) -> Option<Value>;

    /// Providers chained under this one when several wallets share the global.
    fn providers(&self) -> Vec<Self>;

    /// `isConnected()`, `false` when the provider does not implement it.
    fn is_connected(&self) -> bool;

    fn on(&self, event: &str, handler: EventHandler) -> Result<Self::Listener, ProviderError>;

    fn remove_listener(&self, event: &str, listener: &Self::Listener);

    /// Whether a boolean flag property is set to `true`.
    fn has_flag(&self, flag: &str) -> bool {
        matches!(self.property(&[flag]), Some(Value::Bool(true)))
    }
}

/// Where injected providers are looked up.
#[async_trait(?Send)]
pub trait ProviderSource: 'static {
    type Provider: InjectedProvider;

    /// Look the provider up right now.
    fn lookup(&self) -> Option<Self::Provider>;

    /// Wait before the next lookup.
    async fn wait(&self, duration: Duration);
}

/// Wait for the provider to be injected, polling up to the detection window.
pub async fn detect_provider<S: ProviderSource>(
    source: &S,
    options: &ConnectorOptions,
) -> Option<S::Provider> {
    let polls = options.detect_polls();
    let mut attempt = 0;

    let provider = loop {
        if let Some(provider) = source.lookup() {
            break provider;
        }
        if attempt >= polls {
            return None;
        }
        attempt += 1;
        source.wait(options.poll_interval()).await;
    };

    if options.must_be_identified && !provider.has_flag(&options.identity_flag) {
        if !options.silent {
            console::error(&format!(
                "Non-{} provider detected while `mustBeIdentified` is set",
                options.identity_flag
            ));
        }
        return None;
    }

    Some(provider)
}

/// Pick the provider to talk to among wallets sharing one global.
///
/// The first chained provider carrying `identity_flag` wins, then the first
/// chained provider, then the raw provider itself.
pub fn select_provider<P: InjectedProvider>(raw: P, identity_flag: &str) -> P {
    let providers = raw.providers();
    providers
        .iter()
        .find(|provider| provider.has_flag(identity_flag))
        .or_else(|| providers.first())
        .cloned()
        .unwrap_or(raw)
}
