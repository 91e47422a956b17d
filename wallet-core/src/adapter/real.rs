use futures::future::FutureExt;
use serde_json::Value;
use std::sync::Arc;

use crate::amount::Amount;
use crate::detector::WalletDetector;
use crate::errors::{WalletError, WalletResult};
use crate::provider::{parse_chain_id, ProviderRequest, WalletProvider};
use crate::session::{ConnectFuture, Network, SessionManager, WalletMode, WalletSession};

/// Connection state machine around an injected provider.
///
/// `Disconnected -> Connecting -> Connected`, with `Error` on failure and
/// `Disconnected` again after [`disconnect`](Self::disconnect).
#[derive(Debug, Clone)]
pub struct RealWalletAdapter {
    detector: WalletDetector,
    session: SessionManager,
}

impl RealWalletAdapter {
    pub fn new(detector: WalletDetector) -> Self {
        Self {
            detector,
            session: SessionManager::new(WalletMode::Real),
        }
    }

    pub fn session(&self) -> WalletSession {
        self.session.snapshot()
    }

    pub fn is_busy(&self) -> bool {
        self.session.is_busy()
    }

    /// Request account, chain id and balance from the provider.
    ///
    /// Calls made while a connect is pending join it instead of issuing new
    /// provider requests.
    pub async fn connect(&self) -> WalletResult<WalletSession> {
        self.start_connect()?.await
    }

    pub(crate) fn start_connect(&self) -> WalletResult<ConnectFuture> {
        if !self.session.is_busy() && !self.detector.detect().is_present() {
            return Err(WalletError::WalletNotFound);
        }
        let provider = self.detector.provider();

        Ok(self.session.begin_connect(move |session, epoch| {
            async move {
                let result = match provider {
                    Some(provider) => request_session(provider).await,
                    None => Err(WalletError::WalletNotFound),
                };
                session.finish_connect(epoch, result)
            }
            .boxed()
        }))
    }

    pub fn disconnect(&self) {
        self.session.disconnect();
    }

    /// Provider `accountsChanged` event. An empty list means the user revoked
    /// access, which ends the session.
    pub fn handle_accounts_changed(&self, accounts: &[String]) {
        match accounts.first() {
            None => {
                log::info!("Wallet revoked account access");
                self.session.disconnect();
            }
            Some(account) => {
                let account = account.to_lowercase();
                if self
                    .session
                    .update_connected(|session| session.account = Some(account))
                {
                    log::info!("Active wallet account changed");
                }
            }
        }
    }

    /// Provider `chainChanged` event.
    pub fn handle_chain_changed(&self, chain_id: u64) {
        let updated = self.session.update_connected(|session| {
            session.chain_id = Some(chain_id);
            session.network = Network::from_chain_id(Some(chain_id));
        });
        if updated {
            log::info!("Wallet switched to chain {}", chain_id);
        }
    }
}

async fn request_session(provider: Arc<dyn WalletProvider>) -> WalletResult<WalletSession> {
    let accounts = provider
        .request(ProviderRequest::request_accounts())
        .await?;
    let account = first_account(&accounts)?;

    let chain_id = parse_chain_id(&provider.request(ProviderRequest::chain_id()).await?)?;

    let balance = match provider
        .request(ProviderRequest::get_balance(&account))
        .await?
    {
        Value::String(quantity) => Amount::from_hex_quantity(&quantity)?,
        other => {
            return Err(WalletError::Provider(format!(
                "Invalid balance response: {}",
                other
            )))
        }
    };

    Ok(WalletSession::connected(
        WalletMode::Real,
        account,
        Some(chain_id),
        balance,
    ))
}

fn first_account(accounts: &Value) -> WalletResult<String> {
    let list = accounts.as_array().ok_or_else(|| {
        WalletError::Provider(format!("Invalid accounts response: {}", accounts))
    })?;
    match list.first().and_then(Value::as_str) {
        Some(account) if !account.is_empty() => Ok(account.to_lowercase()),
        _ => Err(WalletError::WalletRejected(
            "No account was authorized".to_string(),
        )),
    }
}
