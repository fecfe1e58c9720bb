//! Provider event bridge.
//!
//! Maps the provider's lifecycle events onto host [`Actions`] calls and keeps
//! the exact listener handles so they can be removed again.

use std::rc::Rc;

use serde_json::Value;

use crate::core::error::{ConnectorError, ProviderError};
use crate::core::provider::{EventHandler, InjectedProvider};
use crate::models::chain::{parse_chain_id, parse_hex_chain_id};
use crate::models::{Actions, ConnectionUpdate};
use crate::utils::console;

/// Callback receiving errors that have no caller to return to.
pub type ErrorCallback = Rc<dyn Fn(&ConnectorError)>;

/// Events the connector listens to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderEvent {
    Connect,
    Disconnect,
    ChainChanged,
    AccountsChanged,
    /// Legacy spelling of `disconnect`.
    Close,
    /// Legacy `chainChanged` carrying a decimal network id.
    NetworkChanged,
}

impl ProviderEvent {
    pub const ALL: [ProviderEvent; 6] = [
        Self::Connect,
        Self::Disconnect,
        Self::ChainChanged,
        Self::AccountsChanged,
        Self::Close,
        Self::NetworkChanged,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::ChainChanged => "chainChanged",
            Self::AccountsChanged => "accountsChanged",
            Self::Close => "close",
            Self::NetworkChanged => "networkChanged",
        }
    }
}

/// Apply one event payload to the host.
pub fn dispatch(
    event: ProviderEvent,
    payload: Value,
    actions: &dyn Actions,
    on_error: Option<&ErrorCallback>,
) {
    match event {
        ProviderEvent::Connect => {
            let chain_id = payload.get("chainId").unwrap_or(&payload);
            match parse_hex_chain_id(chain_id) {
                Some(chain_id) => actions.update(ConnectionUpdate::chain_id(chain_id)),
                None => console::debug(&format!("Ignoring connect event: {}", payload)),
            }
        }
        ProviderEvent::Disconnect | ProviderEvent::Close => {
            actions.reset_state();
            if let Some(on_error) = on_error {
                on_error(&ConnectorError::Disconnected(ProviderError::from_value(
                    &payload,
                )));
            }
        }
        ProviderEvent::ChainChanged => match parse_hex_chain_id(&payload) {
            Some(chain_id) => actions.update(ConnectionUpdate::chain_id(chain_id)),
            None => console::debug(&format!("Ignoring chainChanged event: {}", payload)),
        },
        ProviderEvent::NetworkChanged => match parse_chain_id(&payload) {
            Some(chain_id) => actions.update(ConnectionUpdate::chain_id(chain_id)),
            None => console::debug(&format!("Ignoring networkChanged event: {}", payload)),
        },
        ProviderEvent::AccountsChanged => {
            let accounts = parse_accounts(&payload);
            if accounts.is_empty() {
                // wallet locked or every account disconnected
                actions.reset_state();
            } else {
                actions.update(ConnectionUpdate::accounts(accounts));
            }
        }
    }
}

/// Collect the string entries of an address list.
pub(crate) fn parse_accounts(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Listeners registered on one provider.
pub struct Subscriptions<P: InjectedProvider> {
    entries: Vec<(ProviderEvent, P::Listener)>,
}

impl<P: InjectedProvider> Subscriptions<P> {
    /// Register a handler for every [`ProviderEvent`].
    ///
    /// A provider that refuses one listener still gets the others.
    pub fn attach(
        provider: &P,
        actions: Rc<dyn Actions>,
        on_error: Option<ErrorCallback>,
    ) -> Self {
        let mut entries = Vec::with_capacity(ProviderEvent::ALL.len());

        for event in ProviderEvent::ALL {
            let actions = Rc::clone(&actions);
            let on_error = on_error.clone();
            let handler: EventHandler = Rc::new(move |payload| {
                dispatch(event, payload, actions.as_ref(), on_error.as_ref());
            });

            match provider.on(event.name(), handler) {
                Ok(listener) => entries.push((event, listener)),
                Err(err) => console::warn(&format!(
                    "Could not subscribe to {}: {}",
                    event.name(),
                    err
                )),
            }
        }

        Self { entries }
    }

    /// Remove exactly the listeners added by [`attach`](Self::attach).
    pub fn detach(self, provider: &P) {
        for (event, listener) in &self.entries {
            provider.remove_listener(event.name(), listener);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use serde_json::json;

    use super::*;
    use crate::mock::{ActionCall, MockProvider, RecordingActions};

    fn attach(provider: &MockProvider, actions: &RecordingActions) -> Subscriptions<MockProvider> {
        Subscriptions::attach(provider, Rc::new(actions.clone()), None)
    }

    #[test]
    fn test_connect_updates_chain() {
        let provider = MockProvider::new();
        let actions = RecordingActions::new();
        let _subs = attach(&provider, &actions);

        provider.emit("connect", json!({ "chainId": "0x89" }));
        assert_eq!(
            actions.calls(),
            vec![ActionCall::Update(ConnectionUpdate::chain_id(137))]
        );
    }

    #[test]
    fn test_chain_changed_parses_hex() {
        let provider = MockProvider::new();
        let actions = RecordingActions::new();
        let _subs = attach(&provider, &actions);

        provider.emit("chainChanged", json!("0x10"));
        assert_eq!(
            actions.calls(),
            vec![ActionCall::Update(ConnectionUpdate::chain_id(16))]
        );
    }

    #[test]
    fn test_network_changed_parses_decimal() {
        let provider = MockProvider::new();
        let actions = RecordingActions::new();
        let _subs = attach(&provider, &actions);

        provider.emit("networkChanged", json!("10"));
        assert_eq!(
            actions.calls(),
            vec![ActionCall::Update(ConnectionUpdate::chain_id(10))]
        );
    }

    #[test]
    fn test_empty_accounts_reset_instead_of_update() {
        let provider = MockProvider::new();
        let actions = RecordingActions::new();
        let _subs = attach(&provider, &actions);

        provider.emit("accountsChanged", json!([]));
        assert_eq!(actions.calls(), vec![ActionCall::Reset]);
    }

    #[test]
    fn test_accounts_changed_updates_accounts() {
        let provider = MockProvider::new();
        let actions = RecordingActions::new();
        let _subs = attach(&provider, &actions);

        provider.emit("accountsChanged", json!(["0xabc", "0xdef"]));
        assert_eq!(
            actions.calls(),
            vec![ActionCall::Update(ConnectionUpdate::accounts(vec![
                "0xabc".to_string(),
                "0xdef".to_string()
            ]))]
        );
    }

    #[test]
    fn test_disconnect_resets_then_reports() {
        let provider = MockProvider::new();
        let actions = RecordingActions::new();
        let errors = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&errors);
        let on_error: ErrorCallback = Rc::new(move |err: &ConnectorError| sink.borrow_mut().push(err.clone()));
        let _subs = Subscriptions::attach(&provider, Rc::new(actions.clone()), Some(on_error));

        provider.emit("disconnect", json!({ "code": 1013, "message": "Try again later" }));
        provider.emit("close", json!({ "code": 1000, "message": "closed" }));

        assert_eq!(actions.calls(), vec![ActionCall::Reset, ActionCall::Reset]);
        assert_eq!(
            *errors.borrow(),
            vec![
                ConnectorError::Disconnected(ProviderError::rpc(1013, "Try again later")),
                ConnectorError::Disconnected(ProviderError::rpc(1000, "closed")),
            ]
        );
    }

    #[test]
    fn test_garbage_payloads_are_ignored() {
        let provider = MockProvider::new();
        let actions = RecordingActions::new();
        let _subs = attach(&provider, &actions);

        provider.emit("chainChanged", json!(null));
        provider.emit("connect", json!({}));
        provider.emit("networkChanged", json!("loading"));
        assert!(actions.calls().is_empty());
    }

    #[test]
    fn test_detach_removes_only_own_listeners() {
        let provider = MockProvider::new();
        let foreign = provider.add_foreign_listener("accountsChanged");
        let actions = RecordingActions::new();

        let subs = attach(&provider, &actions);
        assert_eq!(subs.len(), ProviderEvent::ALL.len());
        assert_eq!(provider.listener_count("accountsChanged"), 2);

        subs.detach(&provider);
        for event in ProviderEvent::ALL {
            let expected = usize::from(event == ProviderEvent::AccountsChanged);
            assert_eq!(provider.listener_count(event.name()), expected);
        }
        assert!(provider.has_listener(foreign));

        provider.emit("accountsChanged", json!([]));
        assert!(actions.calls().is_empty());
    }

    #[test]
    fn test_attach_tolerates_missing_on() {
        let provider = MockProvider::new().without_events();
        let actions = RecordingActions::new();
        let subs = attach(&provider, &actions);
        assert!(subs.is_empty());
    }
}
