//! In-memory provider, source and host for tests.
//!
//! [`MockProvider`] implements only what a test configures: unconfigured
//! RPC methods fail with `-32601`, and the legacy entry points report
//! [`ProviderError::Unsupported`]. Every call is recorded.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;
use std::task::Poll;
use std::time::Duration;

use async_trait::async_trait;
use futures::future;
use serde_json::{Map, Value};

use crate::core::error::ProviderError;
use crate::core::provider::{EventHandler, InjectedProvider, ProviderSource};
use crate::models::{
    Actions, AddEthereumChainParameter, CancelActivation, ConnectionUpdate, NativeCurrency,
};

type Response = Result<Value, ProviderError>;

/// Entry point a call went through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallKind {
    Request,
    Send,
    SendPayload,
    Enable,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecordedCall {
    pub kind: CallKind,
    pub method: String,
    pub params: Option<Value>,
}

#[derive(Default)]
struct MockState {
    label: String,
    properties: Map<String, Value>,
    providers: Vec<MockProvider>,
    responses: HashMap<(CallKind, String), VecDeque<Response>>,
    calls: Vec<RecordedCall>,
    listeners: Vec<(String, u64, EventHandler)>,
    next_listener: u64,
    no_request: bool,
    no_events: bool,
    connected: bool,
}

/// Scriptable injected provider.
///
/// Responses queue per method; the last queued response repeats.
#[derive(Clone, Default)]
pub struct MockProvider {
    state: Rc<RefCell<MockState>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(self, label: &str) -> Self {
        self.state.borrow_mut().label = label.to_string();
        self
    }

    pub fn with_flag(self, flag: &str) -> Self {
        self.with_property(flag, Value::Bool(true))
    }

    pub fn with_property(self, name: &str, value: Value) -> Self {
        self.state
            .borrow_mut()
            .properties
            .insert(name.to_string(), value);
        self
    }

    pub fn with_providers(self, providers: Vec<MockProvider>) -> Self {
        self.state.borrow_mut().providers = providers;
        self
    }

    /// Report `isConnected() == true`.
    pub fn connected(self) -> Self {
        self.state.borrow_mut().connected = true;
        self
    }

    /// Drop `request`, leaving only the legacy entry points.
    pub fn without_request(self) -> Self {
        self.state.borrow_mut().no_request = true;
        self
    }

    /// Drop `on`/`removeListener`.
    pub fn without_events(self) -> Self {
        self.state.borrow_mut().no_events = true;
        self
    }

    pub fn respond(self, method: &str, response: Response) -> Self {
        self.queue(CallKind::Request, method, response)
    }

    pub fn respond_send(self, method: &str, response: Response) -> Self {
        self.queue(CallKind::Send, method, response)
    }

    pub fn respond_payload(self, method: &str, response: Response) -> Self {
        self.queue(CallKind::SendPayload, method, response)
    }

    pub fn respond_enable(self, response: Response) -> Self {
        self.queue(CallKind::Enable, "enable", response)
    }

    /// Queue a response on an already shared provider.
    pub fn push_response(&self, method: &str, response: Response) {
        self.state
            .borrow_mut()
            .responses
            .entry((CallKind::Request, method.to_string()))
            .or_default()
            .push_back(response);
    }

    fn queue(self, kind: CallKind, method: &str, response: Response) -> Self {
        self.state
            .borrow_mut()
            .responses
            .entry((kind, method.to_string()))
            .or_default()
            .push_back(response);
        self
    }

    pub fn label(&self) -> String {
        self.state.borrow().label.clone()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.borrow().calls.clone()
    }

    pub fn call_kinds(&self) -> Vec<CallKind> {
        self.state.borrow().calls.iter().map(|c| c.kind).collect()
    }

    /// Methods issued through `request`, in order.
    pub fn requested_methods(&self) -> Vec<String> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| c.kind == CallKind::Request)
            .map(|c| c.method.clone())
            .collect()
    }

    /// Params of every `request` for `method`.
    pub fn params_of(&self, method: &str) -> Vec<Option<Value>> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| c.kind == CallKind::Request && c.method == method)
            .map(|c| c.params.clone())
            .collect()
    }

    /// Invoke every listener registered for `event`.
    pub fn emit(&self, event: &str, payload: Value) {
        let handlers: Vec<EventHandler> = self
            .state
            .borrow()
            .listeners
            .iter()
            .filter(|(name, _, _)| name == event)
            .map(|(_, _, handler)| Rc::clone(handler))
            .collect();

        for handler in handlers {
            handler(payload.clone());
        }
    }

    /// Register a listener the way unrelated page code would.
    pub fn add_foreign_listener(&self, event: &str) -> u64 {
        let handler: EventHandler = Rc::new(|_: Value| {});
        self.register(event, handler)
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.state
            .borrow()
            .listeners
            .iter()
            .filter(|(name, _, _)| name == event)
            .count()
    }

    pub fn has_listener(&self, id: u64) -> bool {
        self.state
            .borrow()
            .listeners
            .iter()
            .any(|(_, listener, _)| *listener == id)
    }

    fn register(&self, event: &str, handler: EventHandler) -> u64 {
        let mut state = self.state.borrow_mut();
        let id = state.next_listener;
        state.next_listener += 1;
        state.listeners.push((event.to_string(), id, handler));
        id
    }

    fn record(&self, kind: CallKind, method: &str, params: Option<Value>) {
        self.state.borrow_mut().calls.push(RecordedCall {
            kind,
            method: method.to_string(),
            params,
        });
    }

    fn next_response(&self, kind: CallKind, method: &str) -> Option<Response> {
        let mut state = self.state.borrow_mut();
        let queue = state.responses.get_mut(&(kind, method.to_string()))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("MockProvider")
            .field("label", &state.label)
            .field("calls", &state.calls.len())
            .field("listeners", &state.listeners.len())
            .finish()
    }
}

#[async_trait(?Send)]
impl InjectedProvider for MockProvider {
    type Listener = u64;

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, ProviderError> {
        self.record(CallKind::Request, method, params);
        if self.state.borrow().no_request {
            return Err(ProviderError::Unsupported("request"));
        }
        self.next_response(CallKind::Request, method)
            .unwrap_or_else(|| Err(ProviderError::rpc(-32601, "method not supported")))
    }

    async fn send(&self, method: &str, params: Option<Value>) -> Result<Value, ProviderError> {
        self.record(CallKind::Send, method, params);
        self.next_response(CallKind::Send, method)
            .unwrap_or(Err(ProviderError::Unsupported("send")))
    }

    async fn send_payload(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, ProviderError> {
        self.record(CallKind::SendPayload, method, params);
        self.next_response(CallKind::SendPayload, method)
            .unwrap_or(Err(ProviderError::Unsupported("send")))
    }

    async fn enable(&self) -> Result<Value, ProviderError> {
        self.record(CallKind::Enable, "enable", None);
        self.next_response(CallKind::Enable, "enable")
            .unwrap_or(Err(ProviderError::Unsupported("enable")))
    }

    fn property(&self, path: &[&str]) -> Option<Value> {
        let state = self.state.borrow();
        let (first, rest) = path.split_first()?;
        let mut value = state.properties.get(*first)?;
        for key in rest {
            value = value.get(*key)?;
        }
        Some(value.clone())
    }

    fn providers(&self) -> Vec<Self> {
        self.state.borrow().providers.clone()
    }

    fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }

    fn on(&self, event: &str, handler: EventHandler) -> Result<u64, ProviderError> {
        if self.state.borrow().no_events {
            return Err(ProviderError::Unsupported("on"));
        }
        Ok(self.register(event, handler))
    }

    fn remove_listener(&self, event: &str, listener: &u64) {
        self.state
            .borrow_mut()
            .listeners
            .retain(|(name, id, _)| !(name == event && id == listener));
    }
}

/// Provider source that may only "inject" after some polls.
pub struct MockSource {
    provider: Option<MockProvider>,
    appear_after: u32,
    lookups: Cell<u32>,
    waits: Cell<u32>,
}

impl MockSource {
    pub fn new(provider: Option<MockProvider>) -> Self {
        Self {
            provider,
            appear_after: 0,
            lookups: Cell::new(0),
            waits: Cell::new(0),
        }
    }

    /// Hide the provider for the first `lookups` lookups.
    pub fn appearing_after(mut self, lookups: u32) -> Self {
        self.appear_after = lookups;
        self
    }

    pub fn lookups(&self) -> u32 {
        self.lookups.get()
    }

    pub fn waits(&self) -> u32 {
        self.waits.get()
    }
}

#[async_trait(?Send)]
impl ProviderSource for MockSource {
    type Provider = MockProvider;

    fn lookup(&self) -> Option<MockProvider> {
        let seen = self.lookups.get();
        self.lookups.set(seen + 1);
        if seen < self.appear_after {
            return None;
        }
        self.provider.clone()
    }

    /// Yields once, so other futures run between polls.
    async fn wait(&self, _duration: Duration) {
        self.waits.set(self.waits.get() + 1);
        let mut yielded = false;
        future::poll_fn(|cx| {
            if yielded {
                Poll::Ready(())
            } else {
                yielded = true;
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        })
        .await;
    }
}

/// One call made against [`RecordingActions`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionCall {
    Update(ConnectionUpdate),
    Reset,
    StartActivation,
    CancelActivation,
}

/// Host that records every call in order.
#[derive(Clone, Default)]
pub struct RecordingActions {
    calls: Rc<RefCell<Vec<ActionCall>>>,
}

impl RecordingActions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ActionCall> {
        self.calls.borrow().clone()
    }

    pub fn updates(&self) -> Vec<ConnectionUpdate> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                ActionCall::Update(update) => Some(update.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Actions for RecordingActions {
    fn update(&self, update: ConnectionUpdate) {
        self.calls.borrow_mut().push(ActionCall::Update(update));
    }

    fn reset_state(&self) {
        self.calls.borrow_mut().push(ActionCall::Reset);
    }

    fn start_activation(&self) -> CancelActivation {
        self.calls.borrow_mut().push(ActionCall::StartActivation);
        let calls = Rc::clone(&self.calls);
        Box::new(move || calls.borrow_mut().push(ActionCall::CancelActivation))
    }
}

/// Add-chain parameters for Polygon PoS.
pub fn polygon_parameters() -> AddEthereumChainParameter {
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
