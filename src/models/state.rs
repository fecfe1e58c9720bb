//! Host connection state and the contract the connector drives it through.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::chain::{ChainId, chain_name};
use crate::config::eth_address;

/// Callback returned by [`Actions::start_activation`] that reverts the
/// "activating" flag.
pub type CancelActivation = Box<dyn FnOnce()>;

/// Partial state update sent to the host.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionUpdate {
    pub chain_id: Option<ChainId>,
    pub accounts: Option<Vec<String>>,
}

impl ConnectionUpdate {
    pub fn chain_id(chain_id: ChainId) -> Self {
        Self {
            chain_id: Some(chain_id),
            accounts: None,
        }
    }

    pub fn accounts(accounts: Vec<String>) -> Self {
        Self {
            chain_id: None,
            accounts: Some(accounts),
        }
    }

    pub fn connected(chain_id: ChainId, accounts: Vec<String>) -> Self {
        Self {
            chain_id: Some(chain_id),
            accounts: Some(accounts),
        }
    }
}

/// Connection-state manager the connector reports to.
///
/// The host owns the state; the connector only ever writes through these
/// three calls, as do the provider event handlers.
pub trait Actions {
    fn update(&self, update: ConnectionUpdate);
    fn reset_state(&self);
    fn start_activation(&self) -> CancelActivation;
}

/// Connection state as seen by the UI.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub chain_id: Option<ChainId>,
    pub accounts: Option<Vec<String>>,
    pub activating: bool,
}

impl ConnectionState {
    /// Check if wallet is connected
    pub fn is_connected(&self) -> bool {
        self.chain_id.is_some() && self.account().is_some()
    }

    /// First authorized account, if any.
    pub fn account(&self) -> Option<&str> {
        self.accounts.as_ref()?.first().map(String::as_str)
    }

    /// Human-readable name of the connected chain, when it is a known one.
    pub fn network_name(&self) -> Option<&'static str> {
        self.chain_id.and_then(chain_name)
    }

    /// Format address for display (0x1234...5678)
    pub fn display_name(&self) -> String {
        match self.account() {
            Some(address) if address.len() >= eth_address::FULL_LEN => {
                match (
                    address.get(..eth_address::PREFIX_LEN),
                    address.get(eth_address::SUFFIX_START..),
                ) {
                    (Some(prefix), Some(suffix)) => format!("{}...{}", prefix, suffix),
                    _ => address.to_string(),
                }
            }
            Some(address) => address.to_string(),
            None if self.activating => "connecting...".to_string(),
            None => "guest".to_string(),
        }
    }
}

/// In-memory [`Actions`] host.
///
/// Each `start_activation` bumps a nonce so that a stale cancel callback
/// cannot clear a newer activation.
#[derive(Clone, Default)]
pub struct ConnectionStore {
    state: Rc<RefCell<ConnectionState>>,
    nonce: Rc<Cell<u64>>,
}

impl ConnectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ConnectionState {
        self.state.borrow().clone()
    }
}

impl Actions for ConnectionStore {
    fn update(&self, update: ConnectionUpdate) {
        let mut state = self.state.borrow_mut();
        if let Some(chain_id) = update.chain_id {
            state.chain_id = Some(chain_id);
        }
        if let Some(accounts) = update.accounts {
            state.accounts = Some(accounts);
        }
        // Activation settles once both halves are known.
        if state.chain_id.is_some() && state.accounts.is_some() {
            state.activating = false;
        }
    }

    fn reset_state(&self) {
        self.nonce.set(self.nonce.get() + 1);
        *self.state.borrow_mut() = ConnectionState::default();
    }

    fn start_activation(&self) -> CancelActivation {
        let nonce = self.nonce.get() + 1;
        self.nonce.set(nonce);
        self.state.borrow_mut().activating = true;

        let state = Rc::clone(&self.state);
        let current = Rc::clone(&self.nonce);
        Box::new(move || {
            if current.get() == nonce {
                state.borrow_mut().activating = false;
            }
        })
    }
}
