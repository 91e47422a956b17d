use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config_store::{parse_bool_flag, write_atomically};
use crate::amount::Amount;
use crate::errors::{WalletError, WalletResult};
use crate::storage::state::{Cart, CartItem, NetworkPreference, Wishlist};
use crate::transactions::Transaction;

pub const KEY_NETWORK: &str = "network";
pub const KEY_TESTNET_MAINTENANCE: &str = "testnetMaintenance";
pub const KEY_WISHLIST: &str = "wishlist";
pub const KEY_CART: &str = "cart";
pub const KEY_TOKEN_BALANCE: &str = "tokenBalance";
pub const KEY_TRANSACTIONS: &str = "transactions";

/// Key/value store holding one JSON document per key under a directory.
///
/// Writes go through a single lock and replace the whole value, so the last
/// write wins. The typed `load_*` helpers never fail: missing or corrupt
/// values are logged and replaced by the default.
#[derive(Debug)]
pub struct LocalStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl LocalStore {
    pub fn new(dir: impl AsRef<Path>) -> WalletResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        if dir.as_os_str().is_empty() {
            return Err(WalletError::StorageError(
                "Local storage directory cannot be empty".to_string(),
            ));
        }
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> WalletResult<PathBuf> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(WalletError::InvalidInput(format!(
                "Invalid storage key '{}'",
                key
            )));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }

    /// Read and decode a value. `Ok(None)` when the key was never written.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> WalletResult<Option<T>> {
        let path = self.key_path(key)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> WalletResult<()> {
        let path = self.key_path(key)?;
        let serialized = serde_json::to_vec(value)?;
        let _guard = self.write_lock.lock();
        write_atomically(&path, &serialized)
    }

    pub fn remove(&self, key: &str) -> WalletResult<()> {
        let path = self.key_path(key)?;
        let _guard = self.write_lock.lock();
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn load_or<T, F>(&self, key: &str, default: F) -> T
    where
        T: DeserializeOwned,
        F: FnOnce() -> T,
    {
        match self.get(key) {
            Ok(Some(value)) => value,
            Ok(None) => default(),
            Err(e) => {
                log::warn!("Discarding stored '{}': {}", key, e);
                default()
            }
        }
    }

    pub fn load_network(&self) -> NetworkPreference {
        self.load_or(KEY_NETWORK, NetworkPreference::default)
    }

    pub fn save_network(&self, network: NetworkPreference) -> WalletResult<()> {
        self.set(KEY_NETWORK, &network)
    }

    /// Stored as the string `"true"` / `"false"`.
    pub fn load_testnet_maintenance(&self) -> bool {
        let raw: String = self.load_or(KEY_TESTNET_MAINTENANCE, || "false".to_string());
        parse_bool_flag(&raw, KEY_TESTNET_MAINTENANCE).unwrap_or_else(|e| {
            log::warn!("Discarding stored '{}': {}", KEY_TESTNET_MAINTENANCE, e);
            false
        })
    }

    pub fn save_testnet_maintenance(&self, enabled: bool) -> WalletResult<()> {
        self.set(KEY_TESTNET_MAINTENANCE, &enabled.to_string())
    }

    pub fn load_wishlist(&self) -> Wishlist {
        let ids: Vec<String> = self.load_or(KEY_WISHLIST, Vec::new);
        Wishlist::from_ids(ids)
    }

    pub fn save_wishlist(&self, wishlist: &Wishlist) -> WalletResult<()> {
        self.set(KEY_WISHLIST, wishlist.ids())
    }

    pub fn load_cart(&self) -> Cart {
        let items: Vec<CartItem> = self.load_or(KEY_CART, Vec::new);
        Cart::from_items(items)
    }

    pub fn save_cart(&self, cart: &Cart) -> WalletResult<()> {
        self.set(KEY_CART, cart.items())
    }

    pub fn load_token_balance(&self) -> Amount {
        self.load_or(KEY_TOKEN_BALANCE, || Amount::ZERO)
    }

    /// Transaction log, most recent first.
    pub fn load_transactions(&self) -> Vec<Transaction> {
        self.load_or(KEY_TRANSACTIONS, Vec::new)
    }

    /// Store the token balance and the transaction log together.
    pub fn save_ledger(&self, balance: Amount, transactions: &[Transaction]) -> WalletResult<()> {
        self.set(KEY_TRANSACTIONS, transactions)?;
        self.set(KEY_TOKEN_BALANCE, &balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;
    use tempfile::TempDir;

    fn store() -> (TempDir, LocalStore) {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path().join("local")).unwrap();
        (dir, store)
    }

    #[test]
    fn defaults_when_nothing_stored() {
        let (_dir, store) = store();
        assert_eq!(store.load_network(), NetworkPreference::Demo);
        assert!(!store.load_testnet_maintenance());
        assert!(store.load_wishlist().is_empty());
        assert!(store.load_cart().is_empty());
        assert!(store.load_token_balance().is_zero());
        assert!(store.load_transactions().is_empty());
    }

    #[test]
    fn values_persist_across_instances() {
        let dir = TempDir::new().unwrap();
        {
            let store = LocalStore::new(dir.path()).unwrap();
            store.save_network(NetworkPreference::Testnet).unwrap();
            store.save_testnet_maintenance(true).unwrap();
            let mut wishlist = Wishlist::default();
            wishlist.add("p-1");
            wishlist.add("p-2");
            store.save_wishlist(&wishlist).unwrap();
        }

        let store = LocalStore::new(dir.path()).unwrap();
        assert_eq!(store.load_network(), NetworkPreference::Testnet);
        assert!(store.load_testnet_maintenance());
        assert_eq!(store.load_wishlist().ids(), ["p-1", "p-2"]);

        let raw = fs::read_to_string(dir.path().join("testnetMaintenance.json")).unwrap();
        assert_eq!(raw, "\"true\"");
    }

    #[test]
    fn corrupt_values_fall_back_to_defaults() {
        let (_dir, store) = store();
        fs::write(store.dir().join("wishlist.json"), b"{not json").unwrap();
        fs::write(store.dir().join("network.json"), b"\"mainnet\"").unwrap();
        fs::write(store.dir().join("testnetMaintenance.json"), b"\"maybe\"").unwrap();
        fs::write(store.dir().join("cart.json"), b"[{\"productId\": 3}]").unwrap();

        assert!(store.load_wishlist().is_empty());
        assert_eq!(store.load_network(), NetworkPreference::Demo);
        assert!(!store.load_testnet_maintenance());
        assert!(store.load_cart().is_empty());

        fs::write(store.dir().join("tokenBalance.json"), b"\"-3\"").unwrap();
        fs::write(store.dir().join("transactions.json"), b"[{\"id\": 1}]").unwrap();
        assert!(store.load_token_balance().is_zero());
        assert!(store.load_transactions().is_empty());
    }

    #[test]
    fn loaders_dedupe_wishlist_and_drop_empty_lines() {
        let (_dir, store) = store();
        store.set(KEY_WISHLIST, &["a", "b", "a", "c", "b"]).unwrap();
        assert_eq!(store.load_wishlist().ids(), ["a", "b", "c"]);

        let json = serde_json::json!([
            {"id": "1", "productId": "p1", "name": "Tee", "price": "10", "currency": "USD",
             "image": "", "quantity": 2, "marketplace": "amazon", "category": "clothing"},
            {"id": "2", "productId": "p2", "name": "Lamp", "price": "5", "currency": "USD",
             "image": "", "quantity": 0, "marketplace": "amazon", "category": "home"}
        ]);
        store.set(KEY_CART, &json).unwrap();
        let cart = store.load_cart();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.total().unwrap(), Amount::from_string("20").unwrap());
    }

    #[test]
    fn rejects_path_like_keys() {
        let (_dir, store) = store();
        assert!(store.set("../escape", &1).is_err());
        assert!(store.get::<u32>("").is_err());
        store.remove(KEY_CART).unwrap();
    }
}
