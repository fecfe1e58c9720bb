//! The injected-wallet connector.
//!
//! [`InjectedConnector`] owns the lifecycle: it detects and selects the
//! provider once, bridges its events to the host, and runs the activation
//! protocol on demand.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};

use crate::config::{ConnectorOptions, methods};
use crate::core::activation::{self, Authorization};
use crate::core::error::ConnectorError;
use crate::core::events::{ErrorCallback, Subscriptions};
use crate::core::probe;
use crate::core::provider::{InjectedProvider, ProviderSource, detect_provider, select_provider};
use crate::models::{Actions, ChainId, ConnectionUpdate, DesiredChain, WatchAssetParameters};
use crate::utils::console;

type Initialization<P> = Shared<LocalBoxFuture<'static, Option<P>>>;

/// Result of an explicit activation.
#[derive(Clone, Debug)]
pub struct ActivationResult<P> {
    pub provider: P,
    /// First authorized account; `None` while authorization is pending.
    pub account: Option<String>,
}

/// Provider selected during initialization and the listeners bound to it.
///
/// Dropping a session removes its listeners from the provider, which
/// outlives the connector.
struct Session<P: InjectedProvider> {
    provider: P,
    subscriptions: Option<Subscriptions<P>>,
}

impl<P: InjectedProvider> Drop for Session<P> {
    fn drop(&mut self) {
        if let Some(subscriptions) = self.subscriptions.take() {
            subscriptions.detach(&self.provider);
        }
    }
}

struct Inner<S: ProviderSource> {
    source: S,
    actions: Rc<dyn Actions>,
    options: ConnectorOptions,
    on_error: Option<ErrorCallback>,
    init: RefCell<Option<Initialization<S::Provider>>>,
    session: RefCell<Option<Session<S::Provider>>>,
    /// Bumped by `deactivate`; an initialization started under an older
    /// generation must not subscribe.
    generation: Cell<u64>,
}

/// Connector for a browser-injected EIP-1193 wallet.
///
/// Cloning yields another handle onto the same connector.
pub struct InjectedConnector<S: ProviderSource> {
    inner: Rc<Inner<S>>,
}

impl<S: ProviderSource> Clone for InjectedConnector<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: ProviderSource> InjectedConnector<S> {
    pub fn new(actions: Rc<dyn Actions>, source: S, options: ConnectorOptions) -> Self {
        Self::build(actions, source, options, None)
    }

    /// Like [`new`](Self::new), with a callback for errors raised by provider
    /// events rather than by a call.
    pub fn with_error_callback(
        actions: Rc<dyn Actions>,
        source: S,
        options: ConnectorOptions,
        on_error: impl Fn(&ConnectorError) + 'static,
    ) -> Self {
        Self::build(actions, source, options, Some(Rc::new(on_error)))
    }

    fn build(
        actions: Rc<dyn Actions>,
        source: S,
        options: ConnectorOptions,
        on_error: Option<ErrorCallback>,
    ) -> Self {
        Self {
            inner: Rc::new(Inner {
                source,
                actions,
                options,
                on_error,
                init: RefCell::new(None),
                session: RefCell::new(None),
                generation: Cell::new(0),
            }),
        }
    }

    pub fn options(&self) -> &ConnectorOptions {
        &self.inner.options
    }

    /// The selected provider, if initialization already found one.
    pub fn provider(&self) -> Option<S::Provider> {
        self.inner
            .session
            .borrow()
            .as_ref()
            .map(|session| session.provider.clone())
    }

    /// Detect, select and subscribe, at most once.
    ///
    /// Concurrent callers await the same future. A detection that finds
    /// nothing is forgotten so a later call can look again.
    async fn initialize(&self) -> Option<S::Provider> {
        let pending = self
            .inner
            .init
            .borrow_mut()
            .get_or_insert_with(|| {
                let weak = Rc::downgrade(&self.inner);
                let generation = self.inner.generation.get();
                initialization(weak, generation).boxed_local().shared()
            })
            .clone();
        pending.await
    }

    /// Wait for the provider and return it.
    pub async fn get_provider(&self) -> Result<S::Provider, ConnectorError> {
        self.initialize().await.ok_or(ConnectorError::NotInstalled)
    }

    /// Ask the wallet for authorization and optionally bring it onto
    /// `desired`.
    ///
    /// Errors propagate to the caller; the host is only updated on success.
    pub async fn activate(
        &self,
        desired: Option<DesiredChain>,
    ) -> Result<ActivationResult<S::Provider>, ConnectorError> {
        let already_connected = self.provider().is_some_and(|p| p.is_connected());
        let cancel = (!already_connected).then(|| self.inner.actions.start_activation());

        match self.try_activate(desired.as_ref()).await {
            Ok(result) => Ok(result),
            Err(err) => {
                if let Some(cancel) = cancel {
                    cancel();
                }
                Err(err)
            }
        }
    }

    async fn try_activate(
        &self,
        desired: Option<&DesiredChain>,
    ) -> Result<ActivationResult<S::Provider>, ConnectorError> {
        let provider = self.get_provider().await?;
        let activation = activation::activate(
            &provider,
            Authorization::Prompt,
            desired,
            self.inner.options.max_chain_switches,
        )
        .await?;

        let account = activation.accounts.first().cloned();
        if account.is_some() {
            self.inner.actions.update(ConnectionUpdate::connected(
                activation.chain_id,
                activation.accounts,
            ));
        } else {
            // authorization still pending, never leave stale accounts behind
            self.inner.actions.reset_state();
        }
        Ok(ActivationResult { provider, account })
    }

    /// Silently restore a previous session on page load.
    ///
    /// Never fails outward: a missing provider cancels the activation, any
    /// other failure resets host state.
    pub async fn connect_eagerly(&self) {
        let cancel = self.inner.actions.start_activation();

        let Some(provider) = self.initialize().await else {
            console::debug("No injected provider, skipping eager connection");
            cancel();
            return;
        };

        // TODO: keep the authorized accounts when only the chain check fails
        // instead of resetting the whole session.
        match activation::activate(
            &provider,
            Authorization::Silent,
            None,
            self.inner.options.max_chain_switches,
        )
        .await
        {
            Ok(activation) => self.inner.actions.update(ConnectionUpdate::connected(
                activation.chain_id,
                activation.accounts,
            )),
            Err(err) => {
                console::debug(&format!("Could not connect eagerly: {}", err));
                self.inner.actions.reset_state();
            }
        }
    }

    /// Remove the event listeners and reset host state.
    ///
    /// The next activation detects and subscribes again.
    pub fn deactivate(&self) {
        self.inner.generation.set(self.inner.generation.get() + 1);
        let session = self.inner.session.borrow_mut().take();
        drop(session);
        self.inner.init.borrow_mut().take();
        self.inner.actions.reset_state();
    }

    /// Current chain id through the fallback chain.
    pub async fn get_chain_id(&self) -> Result<Option<ChainId>, ConnectorError> {
        let provider = self.get_provider().await?;
        Ok(probe::first_available(&provider, &probe::chain_id_probes()).await)
    }

    /// First account through the fallback chain.
    pub async fn get_account(&self) -> Result<Option<String>, ConnectorError> {
        let provider = self.get_provider().await?;
        Ok(probe::first_available(&provider, &probe::account_probes()).await)
    }

    /// Whether the site is already authorized, without prompting.
    pub async fn is_authorized(&self) -> bool {
        match self.initialize().await {
            Some(provider) => probe::is_authorized(&provider).await,
            None => false,
        }
    }

    /// Add an ERC-20 token to the wallet, switching to its chain first when
    /// one is given.
    pub async fn watch_asset(&self, asset: &WatchAssetParameters) -> Result<(), ConnectorError> {
        let provider = self.get_provider().await?;

        if let Some(chain_id) = asset.chain_id {
            let current = probe::first_available(&provider, &probe::chain_id_probes()).await;
            if current != Some(chain_id) {
                self.activate(Some(DesiredChain::Id(chain_id))).await?;
            }
        }

        let accepted = provider
            .request(methods::WATCH_ASSET, Some(asset.to_request_params()))
            .await?;
        if accepted.as_bool() == Some(true) {
            Ok(())
        } else {
            Err(ConnectorError::AssetRejected)
        }
    }
}

async fn initialization<S: ProviderSource>(
    weak: Weak<Inner<S>>,
    generation: u64,
) -> Option<S::Provider> {
    let inner = weak.upgrade()?;
    let provider = inner.attach(generation).await;
    // a stale failure must not clear the memo of a newer initialization
    if provider.is_none() && inner.generation.get() == generation {
        inner.init.borrow_mut().take();
    }
    provider
}

impl<S: ProviderSource> Inner<S> {
    async fn attach(&self, generation: u64) -> Option<S::Provider> {
        let raw = detect_provider(&self.source, &self.options).await?;
        let provider = select_provider(raw, &self.options.identity_flag);

        if self.generation.get() != generation {
            console::debug("Connector deactivated during initialization, not subscribing");
            return Some(provider);
        }

        let subscriptions =
            Subscriptions::attach(&provider, Rc::clone(&self.actions), self.on_error.clone());
        let previous = self.session.borrow_mut().replace(Session {
            provider: provider.clone(),
            subscriptions: Some(subscriptions),
        });
        drop(previous);

        Some(provider)
    }
}
