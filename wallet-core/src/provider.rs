//! Injected wallet provider interface
//!
//! Browser-style wallets expose a single `request({ method, params })` entry
//! point speaking Ethereum JSON-RPC method names. The host application wraps
//! whatever it finds in a [`WalletProvider`] and injects it into a
//! [`ProviderSlot`](crate::detector::ProviderSlot); nothing in this crate
//! inspects global state to find one.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::WalletError;

pub const METHOD_REQUEST_ACCOUNTS: &str = "eth_requestAccounts";
pub const METHOD_CHAIN_ID: &str = "eth_chainId";
pub const METHOD_GET_BALANCE: &str = "eth_getBalance";

/// EIP-1193 code for "the user rejected the request".
pub const USER_REJECTED_CODE: i64 = 4001;

/// A single provider request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderRequest {
    pub method: String,
    pub params: Value,
}

impl ProviderRequest {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    pub fn request_accounts() -> Self {
        Self::new(METHOD_REQUEST_ACCOUNTS, Value::Array(Vec::new()))
    }

    pub fn chain_id() -> Self {
        Self::new(METHOD_CHAIN_ID, Value::Array(Vec::new()))
    }

    pub fn get_balance(address: &str) -> Self {
        Self::new(METHOD_GET_BALANCE, serde_json::json!([address, "latest"]))
    }
}

/// Error object returned by a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFailure {
    pub code: i64,
    pub message: String,
}

impl ProviderFailure {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn user_rejected() -> Self {
        Self::new(USER_REJECTED_CODE, "User rejected the request.")
    }

    pub fn is_user_rejection(&self) -> bool {
        self.code == USER_REJECTED_CODE
    }
}

impl From<ProviderFailure> for WalletError {
    fn from(failure: ProviderFailure) -> Self {
        if failure.is_user_rejection() {
            WalletError::WalletRejected(failure.message)
        } else {
            WalletError::Provider(format!("{} (code {})", failure.message, failure.code))
        }
    }
}

/// An injected wallet, e.g. a browser extension bridged into the host.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Vendor identifier reported by detection (`"metamask"`, `"coinbase"`, ...).
    fn kind(&self) -> &str;

    async fn request(&self, request: ProviderRequest) -> Result<Value, ProviderFailure>;
}

/// Parse an `eth_chainId` result; wallets answer with a hex quantity, a few
/// legacy ones with a decimal number.
pub fn parse_chain_id(value: &Value) -> Result<u64, WalletError> {
    match value {
        Value::String(text) => {
            let parsed = if let Some(stripped) = text.strip_prefix("0x") {
                u64::from_str_radix(stripped, 16)
            } else {
                text.parse()
            };
            parsed.map_err(|_| WalletError::Provider(format!("Invalid chain id: {}", text)))
        }
        Value::Number(number) => number
            .as_u64()
            .ok_or_else(|| WalletError::Provider(format!("Invalid chain id: {}", number))),
        other => Err(WalletError::Provider(format!(
            "Invalid chain id response: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_maps_to_rejected_error() {
        let err: WalletError = ProviderFailure::user_rejected().into();
        assert!(matches!(err, WalletError::WalletRejected(_)));

        let err: WalletError = ProviderFailure::new(-32603, "Internal error").into();
        assert_eq!(
            err,
            WalletError::Provider("Internal error (code -32603)".to_string())
        );
    }

    #[test]
    fn chain_id_parsing() {
        assert_eq!(parse_chain_id(&Value::from("0xaa36a7")).unwrap(), 11_155_111);
        assert_eq!(parse_chain_id(&Value::from("1")).unwrap(), 1);
        assert_eq!(parse_chain_id(&Value::from(5u64)).unwrap(), 5);
        assert!(parse_chain_id(&Value::Null).is_err());
        assert!(parse_chain_id(&Value::from("0xzz")).is_err());
    }

    #[test]
    fn balance_request_shape() {
        let request = ProviderRequest::get_balance("0xabc");
        assert_eq!(request.method, METHOD_GET_BALANCE);
        assert_eq!(request.params, serde_json::json!(["0xabc", "latest"]));
    }
}
