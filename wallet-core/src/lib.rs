// lib.rs - Core library for the marketplace wallet bridge and incentive ledger

pub mod adapter;
pub mod amount;
pub mod app_state;
pub mod bridge;
pub mod catalog_client;
pub mod config_store;
pub mod detector;
pub mod errors;
pub mod logging;
pub mod notifications;
pub mod provider;
pub mod session;
pub mod storage;
pub mod tokens;
pub mod transactions;
pub mod validation;

// Re-export common types
pub use adapter::{RealWalletAdapter, SimulatedWalletAdapter, WalletAdapter};
pub use amount::Amount;
pub use app_state::MarketplaceContext;
pub use bridge::{BridgeConfig, WalletBridge, WalletView};
pub use catalog_client::{CatalogClient, Product};
pub use config_store::{AppConfig, CatalogConfig, ConfigStore, DemoProfile, TimingConfig};
pub use detector::{Detection, ProviderSlot, WalletDetector};
pub use errors::{WalletError, WalletResult};
pub use notifications::{Notice, NoticeLevel, Notifications};
pub use provider::{ProviderFailure, ProviderRequest, WalletProvider};
pub use session::{Network, SessionStatus, WalletMode, WalletSession};
pub use storage::{Cart, CartItem, CartProduct, LocalStore, NetworkPreference, Wishlist};
pub use tokens::{calculate_incentive, impact_category_of, ImpactCategory, TokenLedger};
pub use transactions::{NewTransaction, Transaction, TransactionLedger, TransactionStatus};
pub use validation::InputValidator;
