use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::amount::Amount;
use crate::errors::{WalletError, WalletResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "camelCase")]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Connected,
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
    Unknown,
}

impl Network {
    pub fn from_chain_id(chain_id: Option<u64>) -> Self {
        match chain_id {
            Some(1) => Network::Mainnet,
            // Ropsten, Rinkeby, Goerli, Kovan, Sepolia, Holesky
            Some(3) | Some(4) | Some(5) | Some(42) | Some(11_155_111) | Some(17_000) => {
                Network::Testnet
            }
            _ => Network::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletMode {
    Real,
    Demo,
}

/// Connection state owned by exactly one adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSession {
    pub status: SessionStatus,
    pub account: Option<String>,
    pub network: Network,
    pub chain_id: Option<u64>,
    pub balance: Amount,
    pub mode: WalletMode,
}

impl WalletSession {
    pub fn disconnected(mode: WalletMode) -> Self {
        Self {
            status: SessionStatus::Disconnected,
            account: None,
            network: Network::Unknown,
            chain_id: None,
            balance: Amount::ZERO,
            mode,
        }
    }

    pub fn connected(
        mode: WalletMode,
        account: impl Into<String>,
        chain_id: Option<u64>,
        balance: Amount,
    ) -> Self {
        Self {
            status: SessionStatus::Connected,
            account: Some(account.into()),
            network: Network::from_chain_id(chain_id),
            chain_id,
            balance,
            mode,
        }
    }

    fn failed(mode: WalletMode, reason: String) -> Self {
        Self {
            status: SessionStatus::Error(reason),
            ..Self::disconnected(mode)
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == SessionStatus::Connected
    }

    pub fn error_reason(&self) -> Option<&str> {
        match &self.status {
            SessionStatus::Error(reason) => Some(reason),
            _ => None,
        }
    }
}

pub(crate) type ConnectFuture = Shared<BoxFuture<'static, WalletResult<WalletSession>>>;

struct SessionState {
    session: WalletSession,
    inflight: Option<ConnectFuture>,
    /// Bumped on every disconnect so a connect that resolves afterwards is dropped.
    epoch: u64,
}

/// Shared session state for one adapter, with connect coalescing.
#[derive(Clone)]
pub(crate) struct SessionManager {
    state: Arc<RwLock<SessionState>>,
    mode: WalletMode,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("SessionManager")
            .field("mode", &self.mode)
            .field("status", &state.session.status)
            .field("busy", &state.inflight.is_some())
            .finish()
    }
}

impl SessionManager {
    pub fn new(mode: WalletMode) -> Self {
        Self {
            state: Arc::new(RwLock::new(SessionState {
                session: WalletSession::disconnected(mode),
                inflight: None,
                epoch: 0,
            })),
            mode,
        }
    }

    pub fn snapshot(&self) -> WalletSession {
        self.state.read().session.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.state.read().inflight.is_some()
    }

    /// Start a connect, or join the one already in flight.
    ///
    /// `start` is only invoked when nothing is pending. The attempt is spawned
    /// onto the runtime so it settles even if every caller stops waiting.
    pub fn begin_connect<F>(&self, start: F) -> ConnectFuture
    where
        F: FnOnce(SessionManager, u64) -> BoxFuture<'static, WalletResult<WalletSession>>,
    {
        let mut state = self.state.write();
        if let Some(pending) = &state.inflight {
            log::debug!("{:?} connect already in flight; joining it", self.mode);
            return pending.clone();
        }

        state.session = WalletSession {
            status: SessionStatus::Connecting,
            ..WalletSession::disconnected(self.mode)
        };
        let attempt = start(self.clone(), state.epoch).shared();
        state.inflight = Some(attempt.clone());
        drop(state);

        tokio::spawn(attempt.clone().map(|_| ()));
        attempt
    }

    /// Record the outcome of the attempt started at `epoch`.
    pub fn finish_connect(
        &self,
        epoch: u64,
        result: WalletResult<WalletSession>,
    ) -> WalletResult<WalletSession> {
        let mut state = self.state.write();
        if state.epoch != epoch {
            log::debug!("{:?} connect resolved after disconnect; discarded", self.mode);
            return Err(WalletError::Provider(
                "Connection cancelled by disconnect".to_string(),
            ));
        }

        state.inflight = None;
        match result {
            Ok(session) => {
                log::info!(
                    "{:?} wallet connected: account={:?} chain_id={:?}",
                    self.mode,
                    session.account,
                    session.chain_id
                );
                state.session = session.clone();
                Ok(session)
            }
            Err(err) => {
                log::warn!("{:?} wallet connection failed: {}", self.mode, err);
                state.session = WalletSession::failed(self.mode, err.reason());
                Err(err)
            }
        }
    }

    /// Always ends in `Disconnected`; safe to call repeatedly.
    pub fn disconnect(&self) {
        let mut state = self.state.write();
        state.epoch = state.epoch.wrapping_add(1);
        state.inflight = None;
        if state.session.status != SessionStatus::Disconnected {
            log::info!("{:?} wallet disconnected", self.mode);
        }
        state.session = WalletSession::disconnected(self.mode);
    }

    /// Mutate a connected session in place; ignored otherwise.
    pub fn update_connected<F>(&self, update: F) -> bool
    where
        F: FnOnce(&mut WalletSession),
    {
        let mut state = self.state.write();
        if !state.session.is_connected() {
            return false;
        }
        update(&mut state.session);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn demo_session() -> WalletSession {
        WalletSession::connected(WalletMode::Demo, "0xabc", Some(1), Amount::ZERO)
    }

    #[test]
    fn network_from_chain_id() {
        assert_eq!(Network::from_chain_id(Some(1)), Network::Mainnet);
        assert_eq!(Network::from_chain_id(Some(11_155_111)), Network::Testnet);
        assert_eq!(Network::from_chain_id(Some(137)), Network::Unknown);
        assert_eq!(Network::from_chain_id(None), Network::Unknown);
    }

    #[test]
    fn status_serializes_with_reason() {
        let json = serde_json::to_value(SessionStatus::Error("denied".into())).unwrap();
        assert_eq!(json, serde_json::json!({"state": "error", "reason": "denied"}));
    }

    #[tokio::test]
    async fn concurrent_connects_share_one_attempt() {
        let manager = SessionManager::new(WalletMode::Demo);
        let started = Arc::new(AtomicUsize::new(0));

        let start = |counter: Arc<AtomicUsize>| {
            move |manager: SessionManager, epoch: u64| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    manager.finish_connect(epoch, Ok(demo_session()))
                }
                .boxed()
            }
        };

        let first = manager.begin_connect(start(started.clone()));
        assert!(manager.is_busy());
        assert_eq!(manager.snapshot().status, SessionStatus::Connecting);
        let second = manager.begin_connect(start(started.clone()));

        let (a, b) = tokio::join!(first, second);
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert!(!manager.is_busy());
        assert!(manager.snapshot().is_connected());
    }

    #[tokio::test]
    async fn disconnect_discards_late_result() {
        let manager = SessionManager::new(WalletMode::Demo);
        let pending = manager.begin_connect(|manager, epoch| {
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                manager.finish_connect(epoch, Ok(demo_session()))
            }
            .boxed()
        });

        manager.disconnect();
        assert!(pending.await.is_err());
        assert_eq!(manager.snapshot(), WalletSession::disconnected(WalletMode::Demo));
    }

    #[tokio::test]
    async fn failure_records_reason_and_allows_retry() {
        let manager = SessionManager::new(WalletMode::Real);
        let result = manager
            .begin_connect(|manager, epoch| {
                async move {
                    manager.finish_connect(
                        epoch,
                        Err(WalletError::WalletRejected("User rejected".into())),
                    )
                }
                .boxed()
            })
            .await;
        assert!(matches!(result, Err(WalletError::WalletRejected(_))));
        assert_eq!(manager.snapshot().error_reason(), Some("User rejected"));
        assert!(!manager.is_busy());

        let retried = manager
            .begin_connect(|manager, epoch| {
                async move { manager.finish_connect(epoch, Ok(demo_session())) }.boxed()
            })
            .await;
        assert!(retried.is_ok());
    }
}
