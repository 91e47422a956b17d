use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ecomarket_wallet_lib::{
    Amount, AppConfig, ConfigStore, MarketplaceContext, Network, NewTransaction, NoticeLevel,
    ProviderFailure, ProviderRequest, ProviderSlot, TimingConfig, WalletError, WalletMode,
    WalletProvider, WalletResult, Wishlist,
};
use serde_json::Value;
use tempfile::TempDir;

fn tokens(value: &str) -> Amount {
    Amount::from_string(value).expect("valid amount")
}

fn context_in(dir: &TempDir, slot: ProviderSlot) -> WalletResult<MarketplaceContext> {
    let mut config = AppConfig::new("test");
    config.timing = TimingConfig::immediate();
    config.demo.connect_delay_ms = 20;
    ConfigStore::new(dir.path().join("ecomarket.config")).save(&config)?;
    MarketplaceContext::initialize_with_slot(dir.path(), slot)
}

struct CountingExtension {
    account_requests: AtomicUsize,
}

#[async_trait]
impl WalletProvider for CountingExtension {
    fn kind(&self) -> &str {
        "metamask"
    }

    async fn request(&self, request: ProviderRequest) -> Result<Value, ProviderFailure> {
        match request.method.as_str() {
            "eth_requestAccounts" => {
                self.account_requests.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(25)).await;
                Ok(serde_json::json!(["0x00000000000000000000000000000000000000bb"]))
            }
            "eth_chainId" => Ok(Value::from("0xaa36a7")),
            "eth_getBalance" => Ok(Value::from("0xde0b6b3a7640000")),
            _ => Err(ProviderFailure::new(-32601, "Method not found")),
        }
    }
}

#[tokio::test]
async fn purchase_credits_incentive_and_notifies() -> WalletResult<()> {
    let dir = TempDir::new().expect("create temp dir");
    let context = context_in(&dir, ProviderSlot::new())?;
    let mut notices = context.notifications().subscribe();

    let record = context
        .transactions()
        .add_transaction(NewTransaction {
            order_id: "order-1".to_string(),
            product_id: "p-1".to_string(),
            product_name: "Recycled Denim Jacket".to_string(),
            price: tokens("100"),
            currency: "USD".to_string(),
            category: "clothing".to_string(),
            marketplace: "etsy".to_string(),
        })
        .await?;

    assert_eq!(record.tokens_earned(), tokens("10"));
    assert_eq!(context.tokens().balance(), tokens("10"));
    assert_eq!(context.transactions().transactions()[0].id(), record.id());
    assert_eq!(
        context.transactions().get_transaction_by_id(record.id()),
        Some(record.clone())
    );

    let notice = notices.recv().await.expect("notice published");
    assert_eq!(notice.level, NoticeLevel::Success);
    Ok(())
}

#[tokio::test]
async fn overdraw_is_refused_without_side_effects() -> WalletResult<()> {
    let dir = TempDir::new().expect("create temp dir");
    let context = context_in(&dir, ProviderSlot::new())?;
    context.tokens().add_tokens(tokens("10"))?;

    assert!(!context.tokens().withdraw_tokens(tokens("15")).await);
    assert_eq!(context.tokens().balance(), tokens("10"));
    assert!(context.tokens().withdraw_tokens(tokens("10")).await);
    assert!(context.tokens().balance().is_zero());
    Ok(())
}

#[tokio::test]
async fn overlapping_connects_share_one_provider_prompt() -> WalletResult<()> {
    let dir = TempDir::new().expect("create temp dir");
    let extension = Arc::new(CountingExtension {
        account_requests: AtomicUsize::new(0),
    });
    let context = context_in(&dir, ProviderSlot::with_provider(extension.clone()))?;
    let bridge = context.bridge().clone();

    let (first, second) = tokio::join!(bridge.connect(), context.bridge().connect());
    let (first, second) = (first?, second?);
    assert_eq!(first, second);
    assert_eq!(extension.account_requests.load(Ordering::SeqCst), 1);

    let view = bridge.view();
    assert!(view.is_connected);
    assert!(!view.is_demo);
    assert_eq!(view.network, Network::Testnet);
    assert_eq!(view.chain_id, Some(11_155_111));
    assert_eq!(view.balance, tokens("1"));
    Ok(())
}

#[tokio::test]
async fn demo_wallet_is_deterministic_across_cycles() -> WalletResult<()> {
    let dir = TempDir::new().expect("create temp dir");
    let context = context_in(&dir, ProviderSlot::new())?;
    let bridge = context.bridge();

    let first = bridge.connect().await?;
    bridge.disconnect();
    assert!(!bridge.view().is_connected);
    let second = bridge.connect().await?;

    assert_eq!(first, second);
    assert_eq!(first.mode, WalletMode::Demo);
    assert_eq!(first.balance, tokens("2.5"));
    assert!(bridge.view().is_demo);
    Ok(())
}

#[tokio::test]
async fn demo_disabled_without_provider_reports_not_found() -> WalletResult<()> {
    let dir = TempDir::new().expect("create temp dir");
    let mut context = context_in(&dir, ProviderSlot::new())?;
    context.update_config(|config| {
        config.demo_mode_enabled = false;
        Ok(())
    })?;

    assert_eq!(
        context.bridge().connect().await,
        Err(WalletError::WalletNotFound)
    );
    assert!(!context.bridge().view().is_demo);
    Ok(())
}

#[test]
fn local_state_survives_restart() -> WalletResult<()> {
    let dir = TempDir::new().expect("create temp dir");
    {
        let context = context_in(&dir, ProviderSlot::new())?;
        let mut wishlist = Wishlist::default();
        wishlist.toggle("p-9");
        wishlist.toggle("p-3");
        context.local().save_wishlist(&wishlist)?;
        context.local().save_testnet_maintenance(true)?;
    }

    let context = MarketplaceContext::initialize(dir.path())?;
    assert_eq!(context.local().load_wishlist().ids(), ["p-9", "p-3"]);
    assert!(context.local().load_testnet_maintenance());
    assert_eq!(context.config().environment, "test");
    Ok(())
}
