use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::adapter::{RealWalletAdapter, SimulatedWalletAdapter, WalletAdapter};
use crate::amount::Amount;
use crate::config_store::{AppConfig, DemoProfile};
use crate::detector::WalletDetector;
use crate::errors::{WalletError, WalletResult};
use crate::session::{Network, SessionStatus, WalletMode, WalletSession};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub demo_mode_enabled: bool,
    pub demo: DemoProfile,
    /// Caller-side limit on how long `connect` waits.
    pub connect_timeout: Option<Duration>,
}

impl From<&AppConfig> for BridgeConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            demo_mode_enabled: config.demo_mode_enabled,
            demo: config.demo.clone(),
            connect_timeout: config.timing.connect_timeout(),
        }
    }
}

/// Read model published to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletView {
    pub is_connected: bool,
    pub account: Option<String>,
    pub balance: Amount,
    pub network: Network,
    pub chain_id: Option<u64>,
    pub is_loading: bool,
    pub is_demo: bool,
    pub is_wallet_available: bool,
    pub error: Option<String>,
}

struct BridgeInner {
    detector: WalletDetector,
    demo_mode_enabled: RwLock<bool>,
    connect_timeout: Option<Duration>,
    real: RealWalletAdapter,
    demo: SimulatedWalletAdapter,
    selected: RwLock<WalletAdapter>,
    views: watch::Sender<WalletView>,
}

/// One wallet contract over whichever adapter is selected.
///
/// Selection is `demo` exactly when no provider is detected and demo mode is
/// enabled. It is only re-evaluated while no session is connecting or
/// connected, so a wallet appearing mid-session takes effect after the next
/// `disconnect`.
#[derive(Clone)]
pub struct WalletBridge {
    inner: Arc<BridgeInner>,
}

impl WalletBridge {
    pub fn new(detector: WalletDetector, config: BridgeConfig) -> Self {
        let real = RealWalletAdapter::new(detector.clone());
        let demo = SimulatedWalletAdapter::new(config.demo);
        let initial = select(&detector, config.demo_mode_enabled, &real, &demo);
        let view = build_view(&detector, &initial);
        let (views, _) = watch::channel(view);

        log::info!("Wallet bridge starting in {:?} mode", initial.mode());
        Self {
            inner: Arc::new(BridgeInner {
                detector,
                demo_mode_enabled: RwLock::new(config.demo_mode_enabled),
                connect_timeout: config.connect_timeout,
                real,
                demo,
                selected: RwLock::new(initial),
                views,
            }),
        }
    }

    pub fn view(&self) -> WalletView {
        self.inner.view()
    }

    /// Receiver that observes every republished view.
    pub fn subscribe(&self) -> watch::Receiver<WalletView> {
        self.inner.views.subscribe()
    }

    pub fn session(&self) -> WalletSession {
        self.inner.selected.read().session()
    }

    pub fn mode(&self) -> WalletMode {
        self.inner.selected.read().mode()
    }

    pub fn is_demo(&self) -> bool {
        self.mode() == WalletMode::Demo
    }

    pub fn is_demo_mode_enabled(&self) -> bool {
        *self.inner.demo_mode_enabled.read()
    }

    /// Connect through the selected adapter, re-selecting first when idle.
    pub async fn connect(&self) -> WalletResult<WalletSession> {
        self.inner.reselect_if_idle();
        let adapter = self.inner.selected.read().clone();

        let started = adapter.start_connect();
        self.inner.publish();
        let attempt = started?;

        let result = match self.inner.connect_timeout {
            Some(limit) => match tokio::time::timeout(limit, attempt.clone()).await {
                Ok(result) => result,
                Err(_) => {
                    log::warn!("Wallet connect exceeded {:?}", limit);
                    // The attempt keeps running; republish once it settles.
                    let inner = self.inner.clone();
                    tokio::spawn(async move {
                        let _ = attempt.await;
                        inner.publish();
                    });
                    Err(WalletError::ConnectionTimeout)
                }
            },
            None => attempt.await,
        };

        self.inner.publish();
        result
    }

    /// End the session and re-evaluate which adapter to use next.
    pub fn disconnect(&self) {
        self.inner.selected.read().disconnect();
        self.inner.reselect_if_idle();
        self.inner.publish();
    }

    /// Flip the demo-mode flag. Takes effect immediately when idle,
    /// otherwise after the active session disconnects.
    pub fn set_demo_mode(&self, enabled: bool) {
        *self.inner.demo_mode_enabled.write() = enabled;
        self.inner.reselect_if_idle();
        self.inner.publish();
    }

    /// Re-run detection, e.g. after the host injected or removed a provider.
    /// Returns whether the selected adapter changed.
    pub fn refresh(&self) -> bool {
        let changed = self.inner.reselect_if_idle();
        self.inner.publish();
        changed
    }

    pub fn handle_accounts_changed(&self, accounts: &[String]) {
        if let WalletAdapter::Real(adapter) = &*self.inner.selected.read() {
            adapter.handle_accounts_changed(accounts);
        }
        self.inner.publish();
    }

    pub fn handle_chain_changed(&self, chain_id: u64) {
        if let WalletAdapter::Real(adapter) = &*self.inner.selected.read() {
            adapter.handle_chain_changed(chain_id);
        }
        self.inner.publish();
    }
}

impl fmt::Debug for WalletBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletBridge")
            .field("mode", &self.mode())
            .field("demo_mode_enabled", &self.is_demo_mode_enabled())
            .field("connect_timeout", &self.inner.connect_timeout)
            .finish()
    }
}

impl BridgeInner {
    fn view(&self) -> WalletView {
        build_view(&self.detector, &self.selected.read())
    }

    fn publish(&self) {
        self.views.send_replace(self.view());
    }

    fn reselect_if_idle(&self) -> bool {
        let mut selected = self.selected.write();
        let session = selected.session();
        if selected.is_busy()
            || matches!(
                session.status,
                SessionStatus::Connecting | SessionStatus::Connected
            )
        {
            return false;
        }

        let next = select(
            &self.detector,
            *self.demo_mode_enabled.read(),
            &self.real,
            &self.demo,
        );
        if next.mode() == selected.mode() {
            return false;
        }

        log::info!(
            "Wallet adapter switched from {:?} to {:?}",
            selected.mode(),
            next.mode()
        );
        selected.disconnect();
        *selected = next;
        true
    }
}

fn select(
    detector: &WalletDetector,
    demo_mode_enabled: bool,
    real: &RealWalletAdapter,
    demo: &SimulatedWalletAdapter,
) -> WalletAdapter {
    if !detector.detect().is_present() && demo_mode_enabled {
        WalletAdapter::Demo(demo.clone())
    } else {
        WalletAdapter::Real(real.clone())
    }
}

fn build_view(detector: &WalletDetector, adapter: &WalletAdapter) -> WalletView {
    let session = adapter.session();
    WalletView {
        is_connected: session.is_connected(),
        error: session.error_reason().map(str::to_string),
        account: session.account,
        balance: session.balance,
        network: session.network,
        chain_id: session.chain_id,
        is_loading: adapter.is_busy(),
        is_demo: adapter.mode() == WalletMode::Demo,
        is_wallet_available: detector.detect().is_present(),
    }
}
