//! Activation protocol: authorize, then negotiate the active chain.
//!
//! Chain negotiation is a bounded state machine:
//!
//! ```text
//! ChainCheck ──mismatch──▶ Switching ──ok──▶ ChainCheck
//!                              │
//!                              └─4902 + params──▶ Adding ──ok──▶ Switching
//! ```
//!
//! Every switch request counts against `max_switches`, so a wallet that
//! acknowledges switches without ever changing chain cannot loop forever.

use serde_json::json;

use crate::config::methods;
use crate::core::error::{ConnectorError, ProviderError};
use crate::core::events::parse_accounts;
use crate::core::probe;
use crate::core::provider::InjectedProvider;
use crate::models::chain::{describe_chain, to_hex};
use crate::models::{AddEthereumChainParameter, ChainId, DesiredChain};
use crate::utils::console;

/// How accounts are obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Authorization {
    /// `eth_requestAccounts`, which may prompt the user.
    Prompt,
    /// `eth_accounts`, which never prompts; an empty list is a failure.
    Silent,
}

/// Outcome of a successful activation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Activation {
    pub chain_id: ChainId,
    pub accounts: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step<'a> {
    ChainCheck,
    Switching,
    Adding(&'a AddEthereumChainParameter),
}

/// Run Authorizing followed by chain negotiation.
pub async fn activate<P: InjectedProvider>(
    provider: &P,
    authorization: Authorization,
    desired: Option<&DesiredChain>,
    max_switches: usize,
) -> Result<Activation, ConnectorError> {
    let accounts = authorize(provider, authorization).await?;
    let chain_id = negotiate_chain(provider, desired, max_switches).await?;
    Ok(Activation { chain_id, accounts })
}

async fn authorize<P: InjectedProvider>(
    provider: &P,
    authorization: Authorization,
) -> Result<Vec<String>, ConnectorError> {
    let method = match authorization {
        Authorization::Prompt => methods::REQUEST_ACCOUNTS,
        Authorization::Silent => methods::ACCOUNTS,
    };
    let accounts = parse_accounts(&provider.request(method, None).await?);

    if authorization == Authorization::Silent && accounts.is_empty() {
        return Err(ConnectorError::NoAccounts);
    }
    Ok(accounts)
}

/// Bring the wallet onto `desired`, returning the chain it ends up on.
pub async fn negotiate_chain<P: InjectedProvider>(
    provider: &P,
    desired: Option<&DesiredChain>,
    max_switches: usize,
) -> Result<ChainId, ConnectorError> {
    let mut current = current_chain_id(provider).await?;
    let desired = match desired {
        Some(desired) if desired.chain_id() != current => desired,
        _ => return Ok(current),
    };
    let target = desired.chain_id();

    let mut step = Step::Switching;
    let mut switches = 0;
    let mut added = false;

    loop {
        step = match step {
            Step::ChainCheck => {
                // re-verify, some wallets acknowledge a switch without doing it
                current = current_chain_id(provider).await?;
                if current == target {
                    return Ok(current);
                }
                Step::Switching
            }
            Step::Switching => {
                if switches >= max_switches {
                    return Err(ConnectorError::ChainMismatch {
                        desired: target,
                        current,
                    });
                }
                switches += 1;
                console::debug(&format!(
                    "Switching wallet from {} to {}",
                    describe_chain(current),
                    describe_chain(target)
                ));

                match (switch_chain(provider, target).await, desired.parameters()) {
                    (Ok(()), _) => Step::ChainCheck,
                    (Err(err), Some(params)) if err.is_unrecognized_chain() && !added => {
                        Step::Adding(params)
                    }
                    (Err(err), _) => return Err(err.into()),
                }
            }
            Step::Adding(params) => {
                added = true;
                provider
                    .request(methods::ADD_CHAIN, Some(params.to_request_params()))
                    .await?;
                Step::Switching
            }
        };
    }
}

/// Chain the wallet reports, through the same fallbacks as
/// `InjectedConnector::get_chain_id`.
async fn current_chain_id<P: InjectedProvider>(provider: &P) -> Result<ChainId, ConnectorError> {
    probe::first_available(provider, &probe::chain_id_probes())
        .await
        .ok_or_else(|| {
            ProviderError::InvalidResponse("wallet reported no chain id".to_string()).into()
        })
}

async fn switch_chain<P: InjectedProvider>(
    provider: &P,
    chain_id: ChainId,
) -> Result<(), ProviderError> {
    provider
        .request(
            methods::SWITCH_CHAIN,
            Some(json!([{ "chainId": to_hex(chain_id) }])),
        )
        .await
        .map(|_| ())
}
