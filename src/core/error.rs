//! Error types for provider requests and connector operations.
//!
//! - [`ProviderError`] - a single request against the injected provider failed
//! - [`ConnectorError`] - a connector operation failed as a whole

use serde_json::Value;
use thiserror::Error;

use crate::config::error_codes;
use crate::models::ChainId;

/// Failure of one request against the injected provider.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// The provider does not expose this entry point.
    #[error("provider does not support `{0}`")]
    Unsupported(&'static str),
    /// The provider rejected the request with an EIP-1193 error object.
    #[error("{message} (code {code})")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },
    /// The provider answered with a value of the wrong shape.
    #[error("unexpected provider response: {0}")]
    InvalidResponse(String),
    /// Anything thrown that is not an error object.
    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Build an error from a thrown JSON value (`{ code, message, data }`).
    pub fn from_value(value: &Value) -> Self {
        let code = value.get("code").and_then(Value::as_i64);
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string);

        match (code, message) {
            (Some(code), message) => Self::Rpc {
                code,
                message: message.unwrap_or_default(),
                data: value.get("data").cloned(),
            },
            (None, Some(message)) => Self::Other(message),
            (None, None) => Self::Other(
                value
                    .as_str()
                    .map_or_else(|| value.to_string(), str::to_string),
            ),
        }
    }

    /// Effective error code.
    ///
    /// Some wallets wrap the real error, so `data.originalError.code` wins
    /// over the outer `code`.
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Rpc { code, data, .. } => data
                .as_ref()
                .and_then(|d| d.pointer("/originalError/code"))
                .and_then(Value::as_i64)
                .or(Some(*code)),
            _ => None,
        }
    }

    pub fn is_user_rejection(&self) -> bool {
        self.code() == Some(error_codes::USER_REJECTED)
    }

    pub fn is_unrecognized_chain(&self) -> bool {
        self.code() == Some(error_codes::UNRECOGNIZED_CHAIN)
    }
}

/// Connector-level failures surfaced to the caller of `activate` and friends.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConnectorError {
    /// No injected provider was found within the detection window.
    #[error("wallet not installed. Please install the browser extension.")]
    NotInstalled,
    /// The user dismissed the wallet prompt (code 4001).
    #[error("request rejected by user: {0}")]
    UserRejected(ProviderError),
    /// The wallet accepted the switch requests but never reported the chain.
    #[error("wallet did not switch to chain {desired} (still on {current})")]
    ChainMismatch { desired: ChainId, current: ChainId },
    /// The wallet returned no accounts.
    #[error("no accounts returned from wallet")]
    NoAccounts,
    /// `wallet_watchAsset` did not answer `true`.
    #[error("asset was not added to the wallet")]
    AssetRejected,
    /// The provider emitted `disconnect` or `close`.
    #[error("provider disconnected: {0}")]
    Disconnected(ProviderError),
    #[error(transparent)]
    Provider(ProviderError),
}

impl From<ProviderError> for ConnectorError {
    fn from(err: ProviderError) -> Self {
        if err.is_user_rejection() {
            Self::UserRejected(err)
        } else {
            Self::Provider(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_with_code() {
        let err = ProviderError::from_value(&json!({ "code": 4001, "message": "User denied" }));
        assert_eq!(err, ProviderError::rpc(4001, "User denied"));
        assert!(err.is_user_rejection());
    }

    #[test]
    fn test_from_value_without_code() {
        let err = ProviderError::from_value(&json!({ "message": "boom" }));
        assert_eq!(err, ProviderError::Other("boom".to_string()));
        assert_eq!(err.code(), None);

        let err = ProviderError::from_value(&json!("plain string"));
        assert_eq!(err, ProviderError::Other("plain string".to_string()));
    }

    #[test]
    fn test_wrapped_code_takes_precedence() {
        let err = ProviderError::from_value(&json!({
            "code": -32603,
            "message": "Internal error",
            "data": { "originalError": { "code": 4902 } }
        }));
        assert_eq!(err.code(), Some(4902));
        assert!(err.is_unrecognized_chain());
    }

    #[test]
    fn test_user_rejection_maps_to_distinct_variant() {
        let err: ConnectorError = ProviderError::rpc(4001, "nope").into();
        assert!(matches!(err, ConnectorError::UserRejected(_)));

        let err: ConnectorError = ProviderError::rpc(-32000, "other").into();
        assert!(matches!(err, ConnectorError::Provider(_)));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ProviderError::rpc(4902, "Unrecognized chain").to_string(),
            "Unrecognized chain (code 4902)"
        );
        assert_eq!(
            ConnectorError::ChainMismatch {
                desired: 5,
                current: 1
            }
            .to_string(),
            "wallet did not switch to chain 5 (still on 1)"
        );
    }
}
