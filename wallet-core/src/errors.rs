use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletError {
    // Wallet connection errors
    WalletNotFound,
    WalletRejected(String),
    Provider(String),
    ConnectionTimeout,

    // Ledger errors
    InsufficientBalance,
    InvalidInput(String),
    InvalidAmount(String),

    // Storage errors
    StorageError(String),

    // Network errors
    NetworkError(String),

    // Lookup errors
    NotFound(String),
}

impl WalletError {
    /// Short reason string recorded on a session that moved to `Error`.
    pub fn reason(&self) -> String {
        match self {
            WalletError::WalletRejected(msg) | WalletError::Provider(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WalletError::WalletNotFound => write!(f, "No wallet provider detected"),
            WalletError::WalletRejected(msg) => write!(f, "Wallet request rejected: {}", msg),
            WalletError::Provider(msg) => write!(f, "Wallet provider error: {}", msg),
            WalletError::ConnectionTimeout => write!(f, "Connection timeout"),

            WalletError::InsufficientBalance => write!(f, "Insufficient token balance"),
            WalletError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            WalletError::InvalidAmount(msg) => write!(f, "Invalid amount: {}", msg),

            WalletError::StorageError(msg) => write!(f, "Storage error: {}", msg),

            WalletError::NetworkError(msg) => write!(f, "Network error: {}", msg),

            WalletError::NotFound(msg) => write!(f, "Not found: {}", msg),
        }
    }
}

impl std::error::Error for WalletError {}

pub type WalletResult<T> = Result<T, WalletError>;

// Helper macro for easy error creation
#[macro_export]
macro_rules! wallet_error {
    ($variant:ident, $msg:expr) => {
        $crate::errors::WalletError::$variant($msg.to_string())
    };
    ($variant:ident) => {
        $crate::errors::WalletError::$variant
    };
}

// Conversion helpers
impl From<std::io::Error> for WalletError {
    fn from(error: std::io::Error) -> Self {
        WalletError::StorageError(format!("IO error: {}", error))
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(error: serde_json::Error) -> Self {
        WalletError::StorageError(format!("JSON error: {}", error))
    }
}
