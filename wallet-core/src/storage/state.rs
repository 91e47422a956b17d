use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::amount::Amount;
use crate::errors::{WalletError, WalletResult};

/// Which network the storefront targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NetworkPreference {
    Testnet,
    #[default]
    Demo,
}

/// Saved product ids, in insertion order, without duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Wishlist {
    ids: Vec<String>,
}

impl Wishlist {
    /// Build from stored ids, keeping the first occurrence of each.
    pub fn from_ids(ids: impl IntoIterator<Item = String>) -> Self {
        let mut wishlist = Self::default();
        for id in ids {
            wishlist.add(id);
        }
        wishlist
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, product_id: &str) -> bool {
        self.ids.iter().any(|id| id == product_id)
    }

    /// Returns `false` when the id was already present.
    pub fn add(&mut self, product_id: impl Into<String>) -> bool {
        let product_id = product_id.into();
        if self.contains(&product_id) {
            return false;
        }
        self.ids.push(product_id);
        true
    }

    pub fn remove(&mut self, product_id: &str) -> bool {
        let before = self.ids.len();
        self.ids.retain(|id| id != product_id);
        self.ids.len() != before
    }

    /// Add when absent, remove when present. Returns whether it is now saved.
    pub fn toggle(&mut self, product_id: &str) -> bool {
        if self.remove(product_id) {
            false
        } else {
            self.ids.push(product_id.to_string());
            true
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: String,
    pub product_id: String,
    pub name: String,
    pub price: Amount,
    pub currency: String,
    #[serde(default)]
    pub image: String,
    pub quantity: u32,
    pub marketplace: String,
    pub category: String,
}

impl CartItem {
    pub fn line_total(&self) -> WalletResult<Amount> {
        self.price.checked_mul_quantity(self.quantity)
    }
}

/// Product details for a cart line; the cart assigns the line id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartProduct {
    pub product_id: String,
    pub name: String,
    pub price: Amount,
    pub currency: String,
    pub image: String,
    pub marketplace: String,
    pub category: String,
}

/// Ordered cart lines. Every line has `quantity >= 1` and a distinct product.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// Build from stored lines, dropping zero quantities and merging repeats.
    pub fn from_items(items: impl IntoIterator<Item = CartItem>) -> Self {
        let mut cart = Self::default();
        for item in items {
            if item.quantity == 0 {
                log::debug!("Dropping empty cart line {}", item.id);
                continue;
            }
            match cart.position(&item.product_id) {
                Some(index) => {
                    let line = &mut cart.items[index];
                    line.quantity = line.quantity.saturating_add(item.quantity);
                }
                None => cart.items.push(item),
            }
        }
        cart
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn position(&self, product_id: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.product_id == product_id)
    }

    pub fn get(&self, product_id: &str) -> Option<&CartItem> {
        self.position(product_id).map(|index| &self.items[index])
    }

    /// Add `quantity` of a product, merging into an existing line.
    pub fn add_item(&mut self, product: CartProduct, quantity: u32) -> WalletResult<&CartItem> {
        if quantity == 0 {
            return Err(WalletError::InvalidInput(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let index = match self.position(&product.product_id) {
            Some(index) => {
                let line = &mut self.items[index];
                line.quantity = line.quantity.checked_add(quantity).ok_or_else(|| {
                    WalletError::InvalidInput("Quantity is too large".to_string())
                })?;
                index
            }
            None => {
                self.items.push(CartItem {
                    id: Uuid::new_v4().to_string(),
                    product_id: product.product_id,
                    name: product.name,
                    price: product.price,
                    currency: product.currency,
                    image: product.image,
                    quantity,
                    marketplace: product.marketplace,
                    category: product.category,
                });
                self.items.len() - 1
            }
        };
        Ok(&self.items[index])
    }

    /// Set a line's quantity; `0` removes the line.
    pub fn set_quantity(&mut self, product_id: &str, quantity: u32) -> WalletResult<()> {
        let index = self
            .position(product_id)
            .ok_or_else(|| WalletError::NotFound(format!("Cart has no product {}", product_id)))?;
        if quantity == 0 {
            self.items.remove(index);
        } else {
            self.items[index].quantity = quantity;
        }
        Ok(())
    }

    pub fn remove(&mut self, product_id: &str) -> Option<CartItem> {
        self.position(product_id)
            .map(|index| self.items.remove(index))
    }

    pub fn clear(&mut self) -> Vec<CartItem> {
        std::mem::take(&mut self.items)
    }

    /// Sum of `price * quantity` across lines. Mixed currencies are summed
    /// as-is.
    pub fn total(&self) -> WalletResult<Amount> {
        self.items.iter().try_fold(Amount::ZERO, |sum, item| {
            sum.checked_add(&item.line_total()?)
        })
    }
}
