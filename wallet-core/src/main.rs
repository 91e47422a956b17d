//! Scripted walkthrough of the marketplace core: connect the demo wallet,
//! record a purchase, withdraw part of the reward and print every view.

use std::path::PathBuf;

use anyhow::Context;
use ecomarket_wallet_lib::logging::init_logging;
use ecomarket_wallet_lib::{Amount, CartProduct, MarketplaceContext, NoticeLevel};

const ENV_DATA_DIR: &str = "ECOMARKET_DATA_DIR";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let root_dir = std::env::var(ENV_DATA_DIR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir().join("ecomarket-wallet"));
    let context = MarketplaceContext::initialize(&root_dir)
        .with_context(|| format!("initializing {}", root_dir.display()))?;

    let mut notices = context.notifications().subscribe();
    tokio::spawn(async move {
        while let Ok(notice) = notices.recv().await {
            match notice.level {
                NoticeLevel::Error => tracing::warn!(message = %notice.message, "notice"),
                _ => tracing::info!(message = %notice.message, "notice"),
            }
        }
    });

    let session = context.bridge().connect().await?;
    tracing::info!(account = ?session.account, mode = ?session.mode, "wallet connected");
    println!("{}", serde_json::to_string_pretty(&context.bridge().view())?);

    let mut cart = context.load_cart();
    cart.add_item(
        CartProduct {
            product_id: "organic-tee".to_string(),
            name: "Organic Cotton Tee".to_string(),
            price: Amount::from_string("24.99")?,
            currency: "USD".to_string(),
            image: String::new(),
            marketplace: "etsy".to_string(),
            category: "clothing".to_string(),
        },
        2,
    )?;
    context.save_cart(&cart)?;

    let order_id = format!("order-{}", chrono::Utc::now().timestamp_millis());
    let records = context.checkout(&order_id).await?;
    println!("{}", serde_json::to_string_pretty(&records)?);

    let withdrawn = context.withdraw_tokens(Amount::from_string("1")?).await?;
    tracing::info!(withdrawn, balance = %context.tokens().balance(), "withdrawal settled");

    for product in context.catalog().fetch_products("amazon").await.iter().take(3) {
        tracing::info!(id = %product.id, name = %product.name, price = %product.price, "catalog");
    }

    context.bridge().disconnect();
    println!("{}", serde_json::to_string_pretty(&context.bridge().view())?);
    Ok(())
}
