//! HTTP client for the product catalog that backs marketplace listings.
//!
//! Catalog failures never reach the UI: `fetch_products` logs and returns an
//! empty listing instead.
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::amount::Amount;
use crate::config_store::CatalogConfig;
use crate::errors::{WalletError, WalletResult};

const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: Amount,
    pub currency: String,
    pub image: String,
    pub category: String,
    pub marketplace: String,
}

/// Wire shape of a catalog entry.
#[derive(Debug, Deserialize)]
struct CatalogEntry {
    id: Value,
    title: String,
    #[serde(default)]
    description: String,
    price: Amount,
    #[serde(default)]
    image: String,
    #[serde(default)]
    category: String,
}

impl CatalogEntry {
    fn into_product(self, marketplace: &str) -> Product {
        let id = match self.id {
            Value::String(id) => id,
            other => other.to_string(),
        };
        Product {
            id,
            name: self.title,
            description: self.description,
            price: self.price,
            currency: DEFAULT_CURRENCY.to_string(),
            image: self.image,
            category: self.category,
            marketplace: marketplace.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: Client,
    base_url: String,
}

impl CatalogClient {
    pub fn new(config: &CatalogConfig) -> WalletResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| {
                WalletError::NetworkError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(CatalogClient {
            client,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Products listed for `marketplace`. Empty on any failure.
    pub async fn fetch_products(&self, marketplace: &str) -> Vec<Product> {
        match self.try_fetch_products(marketplace).await {
            Ok(products) => {
                log::debug!(
                    "Fetched {} products for marketplace {}",
                    products.len(),
                    marketplace
                );
                products
            }
            Err(e) => {
                log::warn!("Catalog fetch for {} failed: {}", marketplace, e);
                Vec::new()
            }
        }
    }

    async fn try_fetch_products(&self, marketplace: &str) -> WalletResult<Vec<Product>> {
        let url = format!("{}/products", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| WalletError::NetworkError(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(WalletError::NetworkError(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let entries: Vec<CatalogEntry> = response
            .json()
            .await
            .map_err(|e| WalletError::NetworkError(format!("Failed to parse response: {}", e)))?;

        Ok(entries
            .into_iter()
            .map(|entry| entry.into_product(marketplace))
            .collect())
    }
}
