use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::amount::Amount;
use crate::errors::{WalletError, WalletResult};
use crate::notifications::Notifications;
use crate::tokens::TokenLedger;
use crate::validation::InputValidator;

const ID_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn is_final(self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

/// Purchase details supplied by the checkout flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    pub order_id: String,
    pub product_id: String,
    pub product_name: String,
    pub price: Amount,
    pub currency: String,
    pub category: String,
    pub marketplace: String,
}

/// Immutable ledger record. Fields are read-only outside this module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    id: String,
    order_id: String,
    product_id: String,
    product_name: String,
    price: Amount,
    currency: String,
    category: String,
    marketplace: String,
    tokens_earned: Amount,
    timestamp: DateTime<Utc>,
    tx_hash: String,
    status: TransactionStatus,
}

impl Transaction {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn price(&self) -> Amount {
        self.price
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn marketplace(&self) -> &str {
        &self.marketplace
    }

    pub fn tokens_earned(&self) -> Amount {
        self.tokens_earned
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Random display hash. Not derived from the record and not a proof of
    /// anything on chain.
    pub fn tx_hash(&self) -> &str {
        &self.tx_hash
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }
}

/// Append-only purchase log that credits the token ledger.
///
/// Records are kept most-recent-first in insertion order. A record enters
/// as `Pending` when its settlement starts and moves once to `Completed` or
/// `Failed`.
#[derive(Debug)]
pub struct TransactionLedger {
    tokens: Arc<TokenLedger>,
    notifications: Notifications,
    validator: InputValidator,
    records: RwLock<VecDeque<Transaction>>,
    processing_delay: Duration,
}

impl TransactionLedger {
    pub fn new(
        tokens: Arc<TokenLedger>,
        notifications: Notifications,
        processing_delay: Duration,
    ) -> WalletResult<Self> {
        Self::with_records(tokens, notifications, processing_delay, Vec::new())
    }

    /// Restore a stored log, most recent first. Records still `Pending`
    /// never finished settling and are marked `Failed`.
    pub fn with_records(
        tokens: Arc<TokenLedger>,
        notifications: Notifications,
        processing_delay: Duration,
        records: Vec<Transaction>,
    ) -> WalletResult<Self> {
        let records = records
            .into_iter()
            .map(|mut tx| {
                if !tx.status.is_final() {
                    log::warn!("Transaction {} was interrupted; marking failed", tx.id);
                    tx.status = TransactionStatus::Failed;
                }
                tx
            })
            .collect();

        Ok(Self {
            tokens,
            notifications,
            validator: InputValidator::new()?,
            records: RwLock::new(records),
            processing_delay,
        })
    }

    pub fn tokens(&self) -> &Arc<TokenLedger> {
        &self.tokens
    }

    /// Validate, settle and record a purchase, crediting its incentive.
    ///
    /// Invalid input is rejected before anything changes and reported on the
    /// notification channel as well as through the returned error. A credit
    /// that cannot be applied leaves the record `Failed` and is reported the
    /// same way.
    pub async fn add_transaction(&self, data: NewTransaction) -> WalletResult<Transaction> {
        if let Err(err) = self.validate(&data) {
            log::warn!("Rejected transaction for product '{}': {}", data.product_id, err);
            self.notifications
                .error(format!("Transaction rejected: {}", err));
            return Err(err);
        }

        let tokens_earned = self.tokens.calculate_incentive(data.price, &data.category);
        let timestamp = Utc::now();
        let id = self.unique_id(timestamp);

        let record = Transaction {
            id,
            order_id: data.order_id,
            product_id: data.product_id,
            product_name: data.product_name,
            price: data.price,
            currency: data.currency.to_uppercase(),
            category: data.category,
            marketplace: data.marketplace,
            tokens_earned,
            timestamp,
            tx_hash: generate_tx_hash(),
            status: TransactionStatus::Pending,
        };
        self.records.write().push_front(record.clone());

        if !self.processing_delay.is_zero() {
            tokio::time::sleep(self.processing_delay).await;
        }

        match self.settle(&record.id, tokens_earned) {
            Ok(settled) => {
                log::info!(
                    "Recorded transaction {} for order {}: earned {} tokens",
                    settled.id,
                    settled.order_id,
                    settled.tokens_earned
                );
                self.notifications.success(format!(
                    "Purchase recorded! You earned {} tokens",
                    settled.tokens_earned.to_display_string(2)
                ));
                Ok(settled)
            }
            Err(err) => {
                log::warn!("Transaction {} failed at settlement: {}", record.id, err);
                self.notifications
                    .error(format!("Transaction failed: {}", err));
                Err(err)
            }
        }
    }

    /// Credit the incentive and finalize the record in one step, so a
    /// snapshot never sees the balance and the record disagree.
    fn settle(&self, id: &str, tokens_earned: Amount) -> WalletResult<Transaction> {
        let mut records = self.records.write();
        let record = records
            .iter_mut()
            .find(|tx| tx.id == id)
            .ok_or_else(|| WalletError::NotFound(format!("Transaction {}", id)))?;
        if record.status.is_final() {
            return Err(WalletError::InvalidInput(format!(
                "Transaction {} is already settled",
                id
            )));
        }

        match self.tokens.add_tokens(tokens_earned) {
            Ok(_) => {
                record.status = TransactionStatus::Completed;
                Ok(record.clone())
            }
            Err(err) => {
                record.status = TransactionStatus::Failed;
                Err(err)
            }
        }
    }

    /// Balance and records taken together, for persisting.
    pub fn snapshot(&self) -> (Amount, Vec<Transaction>) {
        let records = self.records.read();
        (self.tokens.balance(), records.iter().cloned().collect())
    }

    /// `None` when no record has this id.
    pub fn get_transaction_by_id(&self, id: &str) -> Option<Transaction> {
        self.records.read().iter().find(|tx| tx.id == id).cloned()
    }

    /// Snapshot, most recent first.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.records.read().iter().cloned().collect()
    }

    pub fn transactions_for_order(&self, order_id: &str) -> Vec<Transaction> {
        self.records
            .read()
            .iter()
            .filter(|tx| tx.order_id == order_id)
            .cloned()
            .collect()
    }

    pub fn total_tokens_earned(&self) -> Amount {
        self.records
            .read()
            .iter()
            .filter(|tx| tx.status == TransactionStatus::Completed)
            .fold(Amount::ZERO, |sum, tx| {
                sum.checked_add(&tx.tokens_earned).unwrap_or(sum)
            })
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn validate(&self, data: &NewTransaction) -> WalletResult<()> {
        self.validator.validate_identifier("productId", &data.product_id)?;
        self.validator.validate_text("category", &data.category, true)?;
        self.validator.validate_text("orderId", &data.order_id, false)?;
        self.validator
            .validate_text("productName", &data.product_name, false)?;
        self.validator
            .validate_text("marketplace", &data.marketplace, false)?;
        self.validator.validate_currency(&data.currency)?;
        Ok(())
    }

    fn unique_id(&self, timestamp: DateTime<Utc>) -> String {
        loop {
            let id = generate_id(timestamp);
            if !self.records.read().iter().any(|tx| tx.id == id) {
                return id;
            }
        }
    }
}

/// `tx_<unix millis>_<9 random base36 chars>`
fn generate_id(timestamp: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("tx_{}_{}", timestamp.timestamp_millis(), suffix)
}

fn generate_tx_hash() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
