//! Best-effort queries across provider API generations.
//!
//! Each query is an ordered list of named [`Probe`]s. The first probe that
//! yields a usable value wins; failures are logged and the next probe runs.

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use serde_json::Value;

use crate::config::{CACHED_NET_VERSION_PATH, CACHED_RESULTS_FLAG, CHAIN_ID_PROPERTIES, methods};
use crate::core::error::ProviderError;
use crate::core::events::parse_accounts;
use crate::core::provider::InjectedProvider;
use crate::models::ChainId;
use crate::models::chain::parse_chain_id;
use crate::utils::console;

pub type ProbeFuture<'a, T> = LocalBoxFuture<'a, Result<Option<T>, ProviderError>>;

/// One retrieval strategy.
pub struct Probe<P, T> {
    pub name: &'static str,
    run: for<'a> fn(&'a P) -> ProbeFuture<'a, T>,
}

impl<P, T> Probe<P, T> {
    pub const fn new(name: &'static str, run: for<'a> fn(&'a P) -> ProbeFuture<'a, T>) -> Self {
        Self { name, run }
    }

    pub fn run<'a>(&self, provider: &'a P) -> ProbeFuture<'a, T> {
        (self.run)(provider)
    }
}

/// Run probes in order and return the first usable value.
pub async fn first_available<P, T>(provider: &P, probes: &[Probe<P, T>]) -> Option<T> {
    for probe in probes {
        match probe.run(provider).await {
            Ok(Some(value)) => return Some(value),
            Ok(None) => console::debug(&format!("{} returned nothing", probe.name)),
            Err(err) => console::debug(&format!("{} failed: {}", probe.name, err)),
        }
    }
    None
}

/// Chain id strategies, most modern first.
pub fn chain_id_probes<P: InjectedProvider>() -> [Probe<P, ChainId>; 4] {
    [
        Probe::new("eth_chainId", chain_id_request::<P>),
        Probe::new("net_version", net_version_request::<P>),
        Probe::new("net_version (callback)", net_version_payload::<P>),
        Probe::new("cached properties", cached_chain_id::<P>),
    ]
}

/// Account strategies, most modern first.
pub fn account_probes<P: InjectedProvider>() -> [Probe<P, String>; 3] {
    [
        Probe::new("eth_accounts", accounts_request::<P>),
        Probe::new("enable", accounts_enable::<P>),
        Probe::new("eth_accounts (callback)", accounts_payload::<P>),
    ]
}

/// `true` iff `eth_accounts` alone returns at least one account.
pub async fn is_authorized<P: InjectedProvider>(provider: &P) -> bool {
    match single_request(provider, methods::ACCOUNTS).await {
        Ok(accounts) => !parse_accounts(&accounts).is_empty(),
        Err(err) => {
            console::debug(&format!("eth_accounts failed: {}", err));
            false
        }
    }
}

/// Issue a parameterless request through `request`, or `send` on providers
/// that predate it, and unwrap legacy `{ result }` envelopes.
pub async fn single_request<P: InjectedProvider>(
    provider: &P,
    method: &str,
) -> Result<Value, ProviderError> {
    let value = match provider.request(method, None).await {
        Err(ProviderError::Unsupported(_)) => provider.send(method, None).await?,
        other => other?,
    };
    Ok(unwrap_result(value))
}

fn unwrap_result(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("result") => {
            map.remove("result").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn first_account(value: &Value) -> Option<String> {
    parse_accounts(value).into_iter().next()
}

fn chain_id_request<P: InjectedProvider>(provider: &P) -> ProbeFuture<'_, ChainId> {
    async move {
        let value = single_request(provider, methods::CHAIN_ID).await?;
        Ok(parse_chain_id(&value))
    }
    .boxed_local()
}

fn net_version_request<P: InjectedProvider>(provider: &P) -> ProbeFuture<'_, ChainId> {
    async move {
        let value = single_request(provider, methods::NET_VERSION).await?;
        Ok(parse_chain_id(&value))
    }
    .boxed_local()
}

fn net_version_payload<P: InjectedProvider>(provider: &P) -> ProbeFuture<'_, ChainId> {
    async move {
        let value = provider.send_payload(methods::NET_VERSION, None).await?;
        Ok(parse_chain_id(&unwrap_result(value)))
    }
    .boxed_local()
}

fn cached_chain_id<P: InjectedProvider>(provider: &P) -> ProbeFuture<'_, ChainId> {
    let cached = provider
        .has_flag(CACHED_RESULTS_FLAG)
        .then(|| provider.property(CACHED_NET_VERSION_PATH))
        .flatten()
        .and_then(|value| parse_chain_id(&value));

    let chain_id = cached.or_else(|| {
        CHAIN_ID_PROPERTIES
            .iter()
            .filter_map(|&name| provider.property(&[name]))
            .find_map(|value| parse_chain_id(&value))
    });

    async move { Ok(chain_id) }.boxed_local()
}

fn accounts_request<P: InjectedProvider>(provider: &P) -> ProbeFuture<'_, String> {
    async move {
        let value = single_request(provider, methods::ACCOUNTS).await?;
        Ok(first_account(&value))
    }
    .boxed_local()
}

fn accounts_enable<P: InjectedProvider>(provider: &P) -> ProbeFuture<'_, String> {
    async move {
        let value = provider.enable().await?;
        Ok(first_account(&unwrap_result(value)))
    }
    .boxed_local()
}

fn accounts_payload<P: InjectedProvider>(provider: &P) -> ProbeFuture<'_, String> {
    async move {
        let value = provider.send_payload(methods::ACCOUNTS, None).await?;
        Ok(first_account(&unwrap_result(value)))
    }
    .boxed_local()
}
