use futures::future::FutureExt;

use crate::config_store::DemoProfile;
use crate::errors::WalletResult;
use crate::session::{ConnectFuture, SessionManager, WalletMode, WalletSession};

/// Deterministic stand-in used when no provider is installed.
///
/// Every connect yields the same configured identity after the same
/// simulated delay; nothing leaves the process.
#[derive(Debug, Clone)]
pub struct SimulatedWalletAdapter {
    profile: DemoProfile,
    session: SessionManager,
}

impl SimulatedWalletAdapter {
    pub fn new(profile: DemoProfile) -> Self {
        Self {
            profile,
            session: SessionManager::new(WalletMode::Demo),
        }
    }

    pub fn profile(&self) -> &DemoProfile {
        &self.profile
    }

    pub fn session(&self) -> WalletSession {
        self.session.snapshot()
    }

    pub fn is_busy(&self) -> bool {
        self.session.is_busy()
    }

    pub async fn connect(&self) -> WalletResult<WalletSession> {
        self.start_connect().await
    }

    pub(crate) fn start_connect(&self) -> ConnectFuture {
        let profile = self.profile.clone();
        self.session.begin_connect(move |session, epoch| {
            async move {
                tokio::time::sleep(profile.connect_delay()).await;
                let demo = WalletSession::connected(
                    WalletMode::Demo,
                    profile.address.clone(),
                    Some(profile.chain_id),
                    profile.balance,
                );
                session.finish_connect(epoch, Ok(demo))
            }
            .boxed()
        })
    }

    pub fn disconnect(&self) {
        self.session.disconnect();
    }
}
