use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;

use crate::amount::Amount;
use crate::errors::{WalletError, WalletResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactCategory {
    High,
    Medium,
    Low,
}

impl ImpactCategory {
    /// Incentive rate in basis points.
    pub fn rate_bps(self) -> u32 {
        match self {
            ImpactCategory::High => 1_000,
            ImpactCategory::Medium => 500,
            ImpactCategory::Low => 200,
        }
    }
}

const HIGH_IMPACT: &[&str] = &[
    "clothing",
    "fashion",
    "apparel",
    "footwear",
    "textiles",
    "furniture",
];

const MEDIUM_IMPACT: &[&str] = &[
    "electronics",
    "home",
    "beauty",
    "personal-care",
    "sports",
    "toys",
];

/// Case-insensitive tier lookup; anything unmapped is `Low`.
pub fn impact_category_of(category: &str) -> ImpactCategory {
    let normalized = category.trim().to_lowercase();
    if HIGH_IMPACT.contains(&normalized.as_str()) {
        ImpactCategory::High
    } else if MEDIUM_IMPACT.contains(&normalized.as_str()) {
        ImpactCategory::Medium
    } else {
        ImpactCategory::Low
    }
}

/// `price * rate(impact_category_of(category))`, exact to one base unit.
pub fn calculate_incentive(price: Amount, category: &str) -> Amount {
    price.apply_rate_bps(impact_category_of(category).rate_bps())
}

/// Reward-token balance.
///
/// Credits apply immediately. Withdrawals run one at a time and check the
/// balance again right before deducting, so interleaved withdrawals can
/// never take it below zero.
#[derive(Debug)]
pub struct TokenLedger {
    balance: RwLock<Amount>,
    withdrawals: AsyncMutex<()>,
    settlement_delay: Duration,
}

impl TokenLedger {
    pub fn new(settlement_delay: Duration) -> Self {
        Self::with_balance(Amount::ZERO, settlement_delay)
    }

    pub fn with_balance(balance: Amount, settlement_delay: Duration) -> Self {
        Self {
            balance: RwLock::new(balance),
            withdrawals: AsyncMutex::new(()),
            settlement_delay,
        }
    }

    pub fn balance(&self) -> Amount {
        *self.balance.read()
    }

    pub fn impact_category_of(&self, category: &str) -> ImpactCategory {
        impact_category_of(category)
    }

    pub fn calculate_incentive(&self, price: Amount, category: &str) -> Amount {
        calculate_incentive(price, category)
    }

    /// Credit tokens and return the new balance. Leaves the balance untouched
    /// when the credit would overflow.
    pub fn add_tokens(&self, amount: Amount) -> WalletResult<Amount> {
        let mut balance = self.balance.write();
        let updated = balance
            .checked_add(&amount)
            .map_err(|e| WalletError::InvalidInput(format!("Cannot credit {}: {}", amount, e)))?;
        *balance = updated;
        log::debug!("Credited {} tokens; balance {}", amount, updated);
        Ok(updated)
    }

    /// Parse and credit a decimal amount coming from the UI. Negative or
    /// malformed text is rejected with `InvalidInput`.
    pub fn add_tokens_str(&self, amount: &str) -> WalletResult<Amount> {
        self.add_tokens(Amount::from_string(amount)?)
    }

    /// Withdraw after the settlement delay. Returns `false`, with no
    /// mutation, when the balance does not cover `amount`.
    pub async fn withdraw_tokens(&self, amount: Amount) -> bool {
        if amount > self.balance() {
            log::info!(
                "Withdrawal of {} rejected: balance {}",
                amount,
                self.balance()
            );
            return false;
        }

        let _serialized = self.withdrawals.lock().await;
        if !self.settlement_delay.is_zero() {
            tokio::time::sleep(self.settlement_delay).await;
        }

        let mut balance = self.balance.write();
        match balance.checked_sub(&amount) {
            Ok(remaining) => {
                *balance = remaining;
                log::info!("Withdrew {} tokens; balance {}", amount, remaining);
                true
            }
            Err(_) => {
                log::info!(
                    "Withdrawal of {} rejected at settlement: balance {}",
                    amount,
                    *balance
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn tokens(value: &str) -> Amount {
        Amount::from_string(value).unwrap()
    }

    #[test]
    fn unknown_categories_fall_back_to_low() {
        for category in ["", "books", "Groceries", "🌱", "clothing-ish"] {
            assert_eq!(impact_category_of(category), ImpactCategory::Low);
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(impact_category_of("CLOTHING"), ImpactCategory::High);
        assert_eq!(impact_category_of(" Electronics "), ImpactCategory::Medium);
    }

    #[test]
    fn incentive_matches_tier_rate() {
        let price = tokens("100");
        assert_eq!(calculate_incentive(price, "clothing"), tokens("10"));
        assert_eq!(calculate_incentive(price, "electronics"), tokens("5"));
        assert_eq!(calculate_incentive(price, "books"), tokens("2"));
        assert_eq!(calculate_incentive(Amount::ZERO, "clothing"), Amount::ZERO);
        assert_eq!(ImpactCategory::Medium.rate_bps(), 500);
    }

    #[test]
    fn add_tokens_rejects_negative_text() {
        let ledger = TokenLedger::new(Duration::ZERO);
        ledger.add_tokens(tokens("3.5")).unwrap();
        let err = ledger.add_tokens_str("-1").unwrap_err();
        assert!(matches!(err, WalletError::InvalidInput(_)));
        assert_eq!(ledger.balance(), tokens("3.5"));
    }

    #[test]
    fn add_tokens_rejects_overflow_without_mutation() {
        let max = Amount::from_whole(Amount::MAX_TOKENS).unwrap();
        let ledger = TokenLedger::with_balance(max, Duration::ZERO);
        assert!(ledger.add_tokens(tokens("1")).is_err());
        assert_eq!(ledger.balance(), max);
    }

    #[tokio::test]
    async fn overdraw_returns_false_and_keeps_balance() {
        let ledger = TokenLedger::with_balance(tokens("10"), Duration::from_millis(5));
        assert!(!ledger.withdraw_tokens(tokens("15")).await);
        assert_eq!(ledger.balance(), tokens("10"));

        assert!(ledger.withdraw_tokens(tokens("4")).await);
        assert_eq!(ledger.balance(), tokens("6"));
    }

    #[tokio::test]
    async fn concurrent_withdrawals_never_overdraw() {
        let ledger = Arc::new(TokenLedger::with_balance(
            tokens("10"),
            Duration::from_millis(10),
        ));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.withdraw_tokens(tokens("4")).await })
            })
            .collect();

        let mut succeeded = 0;
        for handle in handles {
            if handle.await.unwrap() {
                succeeded += 1;
            }
        }

        assert_eq!(succeeded, 2);
        assert_eq!(ledger.balance(), tokens("2"));
    }
}
