//! Wallet adapters
//!
//! Two interchangeable implementations of one connection contract:
//! [`RealWalletAdapter`] drives an injected provider, while
//! [`SimulatedWalletAdapter`] answers with a fixed demo identity. The bridge
//! holds exactly one of them at a time through [`WalletAdapter`].

mod real;
mod simulated;

pub use real::RealWalletAdapter;
pub use simulated::SimulatedWalletAdapter;

use crate::errors::WalletResult;
use crate::session::{ConnectFuture, WalletMode, WalletSession};

#[derive(Debug, Clone)]
pub enum WalletAdapter {
    Real(RealWalletAdapter),
    Demo(SimulatedWalletAdapter),
}

impl WalletAdapter {
    pub fn mode(&self) -> WalletMode {
        match self {
            WalletAdapter::Real(_) => WalletMode::Real,
            WalletAdapter::Demo(_) => WalletMode::Demo,
        }
    }

    pub fn session(&self) -> WalletSession {
        match self {
            WalletAdapter::Real(adapter) => adapter.session(),
            WalletAdapter::Demo(adapter) => adapter.session(),
        }
    }

    /// Whether a connect is currently in flight.
    pub fn is_busy(&self) -> bool {
        match self {
            WalletAdapter::Real(adapter) => adapter.is_busy(),
            WalletAdapter::Demo(adapter) => adapter.is_busy(),
        }
    }

    pub async fn connect(&self) -> WalletResult<WalletSession> {
        self.start_connect()?.await
    }

    /// Mark the session `Connecting` (or join the pending attempt) and hand
    /// back the attempt without awaiting it.
    pub(crate) fn start_connect(&self) -> WalletResult<ConnectFuture> {
        match self {
            WalletAdapter::Real(adapter) => adapter.start_connect(),
            WalletAdapter::Demo(adapter) => Ok(adapter.start_connect()),
        }
    }

    pub fn disconnect(&self) {
        match self {
            WalletAdapter::Real(adapter) => adapter.disconnect(),
            WalletAdapter::Demo(adapter) => adapter.disconnect(),
        }
    }
}
