use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;

use crate::amount::Amount;
use crate::bridge::{BridgeConfig, WalletBridge};
use crate::catalog_client::CatalogClient;
use crate::config_store::{AppConfig, ConfigStore};
use crate::detector::{ProviderSlot, WalletDetector};
use crate::errors::{WalletError, WalletResult};
use crate::notifications::Notifications;
use crate::storage::{Cart, LocalStore};
use crate::tokens::TokenLedger;
use crate::transactions::{NewTransaction, Transaction, TransactionLedger};

const ENV_ENVIRONMENT: &str = "ECOMARKET_ENV";
const CONFIG_FILENAME: &str = "ecomarket.config";
const LOCAL_DIR: &str = "local";

/// Everything the marketplace UI talks to, wired once at startup.
#[derive(Debug)]
pub struct MarketplaceContext {
    root_dir: PathBuf,
    environment: String,
    config_store: ConfigStore,
    config: AppConfig,
    local: LocalStore,
    provider_slot: ProviderSlot,
    notifications: Notifications,
    tokens: Arc<TokenLedger>,
    transactions: TransactionLedger,
    bridge: WalletBridge,
    catalog: CatalogClient,
    ledger_save: Mutex<()>,
    checkout_guard: AsyncMutex<()>,
}

impl MarketplaceContext {
    /// Start with no injected wallet provider.
    pub fn initialize(root_dir: impl AsRef<Path>) -> WalletResult<Self> {
        Self::initialize_with_slot(root_dir, ProviderSlot::new())
    }

    /// Start against a host-owned provider slot. Providers injected later
    /// are picked up the next time the bridge re-selects.
    pub fn initialize_with_slot(
        root_dir: impl AsRef<Path>,
        provider_slot: ProviderSlot,
    ) -> WalletResult<Self> {
        let root_dir = root_dir.as_ref().to_path_buf();
        if root_dir.as_os_str().is_empty() {
            return Err(WalletError::StorageError(
                "Marketplace root directory cannot be empty".to_string(),
            ));
        }
        std::fs::create_dir_all(&root_dir)?;

        let environment =
            std::env::var(ENV_ENVIRONMENT).unwrap_or_else(|_| "development".to_string());
        let config_store = ConfigStore::new(root_dir.join(CONFIG_FILENAME));
        let mut config = match config_store.load_or_default(environment.clone()) {
            Ok(config) => config,
            Err(e) => {
                log::warn!(
                    "Falling back to default configuration ({}): {}",
                    config_store.path().display(),
                    e
                );
                AppConfig::new(environment.clone())
            }
        };
        config.apply_env_overrides();

        let local = LocalStore::new(root_dir.join(LOCAL_DIR))?;
        let notifications = Notifications::new();
        let tokens = Arc::new(TokenLedger::with_balance(
            local.load_token_balance(),
            config.timing.withdrawal_delay(),
        ));
        let transactions = TransactionLedger::with_records(
            tokens.clone(),
            notifications.clone(),
            config.timing.processing_delay(),
            local.load_transactions(),
        )?;
        let bridge = WalletBridge::new(
            WalletDetector::new(provider_slot.clone()),
            BridgeConfig::from(&config),
        );
        let catalog = CatalogClient::new(&config.catalog)?;

        log::info!(
            "Marketplace context ready in {} ({}): {} transactions, balance {}",
            root_dir.display(),
            environment,
            transactions.len(),
            tokens.balance()
        );

        Ok(Self {
            root_dir,
            environment,
            config_store,
            config,
            local,
            provider_slot,
            notifications,
            tokens,
            transactions,
            bridge,
            catalog,
            ledger_save: Mutex::new(()),
            checkout_guard: AsyncMutex::new(()),
        })
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn config_store(&self) -> &ConfigStore {
        &self.config_store
    }

    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    pub fn provider_slot(&self) -> &ProviderSlot {
        &self.provider_slot
    }

    pub fn notifications(&self) -> &Notifications {
        &self.notifications
    }

    pub fn tokens(&self) -> &Arc<TokenLedger> {
        &self.tokens
    }

    pub fn transactions(&self) -> &TransactionLedger {
        &self.transactions
    }

    pub fn bridge(&self) -> &WalletBridge {
        &self.bridge
    }

    pub fn catalog(&self) -> &CatalogClient {
        &self.catalog
    }

    /// Persist a config change and push the demo-mode flag to the bridge.
    pub fn update_config<F>(&mut self, updater: F) -> WalletResult<&AppConfig>
    where
        F: FnOnce(&mut AppConfig) -> WalletResult<()>,
    {
        let mut updated = self.config.clone();
        updater(&mut updated)?;
        self.config_store.save(&updated)?;
        self.bridge.set_demo_mode(updated.demo_mode_enabled);
        self.config = updated;
        Ok(&self.config)
    }

    /// Write the token balance and transaction log to local storage.
    pub fn save_ledger(&self) -> WalletResult<()> {
        let _guard = self.ledger_save.lock();
        let (balance, records) = self.transactions.snapshot();
        self.local.save_ledger(balance, &records)
    }

    /// Record a purchase and persist the ledger, whatever the outcome.
    pub async fn add_transaction(&self, data: NewTransaction) -> WalletResult<Transaction> {
        let result = self.transactions.add_transaction(data).await;
        self.save_ledger()?;
        result
    }

    /// Withdraw tokens and persist the new balance when it changed.
    pub async fn withdraw_tokens(&self, amount: Amount) -> WalletResult<bool> {
        let withdrawn = self.tokens.withdraw_tokens(amount).await;
        if withdrawn {
            self.save_ledger()?;
        }
        Ok(withdrawn)
    }

    /// Record one transaction per cart line under `order_id`, then store the
    /// cart without the recorded lines and persist the ledger.
    ///
    /// Checkouts run one at a time, so a repeated request finds the cart
    /// already emptied. Each line is priced at `price * quantity`. If a line
    /// fails, lines recorded before it stay recorded and are removed from
    /// the cart; the failing line and everything after it remain.
    pub async fn checkout(&self, order_id: &str) -> WalletResult<Vec<Transaction>> {
        let _checkout = self.checkout_guard.lock().await;
        let mut cart = self.local.load_cart();
        if cart.is_empty() {
            return Err(WalletError::InvalidInput("Cart is empty".to_string()));
        }

        let mut recorded = Vec::with_capacity(cart.len());
        let mut failure = None;
        for item in cart.items().to_vec() {
            let outcome = match item.line_total() {
                Ok(price) => {
                    self.transactions
                        .add_transaction(NewTransaction {
                            order_id: order_id.to_string(),
                            product_id: item.product_id.clone(),
                            product_name: item.name.clone(),
                            price,
                            currency: item.currency.clone(),
                            category: item.category.clone(),
                            marketplace: item.marketplace.clone(),
                        })
                        .await
                }
                Err(e) => Err(e),
            };
            match outcome {
                Ok(transaction) => {
                    cart.remove(&item.product_id);
                    recorded.push(transaction);
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        self.local.save_cart(&cart)?;
        self.save_ledger()?;
        match failure {
            Some(e) => {
                log::warn!(
                    "Checkout of order {} stopped after {} lines: {}",
                    order_id,
                    recorded.len(),
                    e
                );
                Err(e)
            }
            None => {
                log::info!("Checked out order {} ({} lines)", order_id, recorded.len());
                Ok(recorded)
            }
        }
    }

    pub fn load_cart(&self) -> Cart {
        self.local.load_cart()
    }

    pub fn save_cart(&self, cart: &Cart) -> WalletResult<()> {
        self.local.save_cart(cart)
    }
}
