use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use blake3::Hasher as Blake3;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::errors::{WalletError, WalletResult};

const CONFIG_VERSION: u16 = 1;

const ENV_DEMO_MODE: &str = "ECOMARKET_DEMO_MODE";
const ENV_CATALOG_URL: &str = "ECOMARKET_CATALOG_URL";
const ENV_CONNECT_TIMEOUT_MS: &str = "ECOMARKET_CONNECT_TIMEOUT_MS";

/// Identity handed out by the simulated wallet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DemoProfile {
    pub address: String,
    pub balance: Amount,
    pub chain_id: u64,
    pub connect_delay_ms: u64,
}

impl DemoProfile {
    pub fn connect_delay(&self) -> Duration {
        Duration::from_millis(self.connect_delay_ms)
    }
}

impl Default for DemoProfile {
    fn default() -> Self {
        Self {
            address: "0x742d35cc6634c0532925a3b844bc454e4438f44e".to_string(),
            balance: Amount::from_base_units(2_500_000_000_000_000_000).unwrap_or_default(),
            // Sepolia
            chain_id: 11_155_111,
            connect_delay_ms: 1_000,
        }
    }
}

/// Simulated latencies and the optional caller-side connect timeout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimingConfig {
    pub processing_delay_ms: u64,
    pub withdrawal_delay_ms: u64,
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
}

impl TimingConfig {
    pub fn processing_delay(&self) -> Duration {
        Duration::from_millis(self.processing_delay_ms)
    }

    pub fn withdrawal_delay(&self) -> Duration {
        Duration::from_millis(self.withdrawal_delay_ms)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    /// No simulated latency at all; used by tests and scripted runs.
    pub fn immediate() -> Self {
        Self {
            processing_delay_ms: 0,
            withdrawal_delay_ms: 0,
            connect_timeout_ms: None,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            processing_delay_ms: 1_500,
            withdrawal_delay_ms: 1_000,
            connect_timeout_ms: Some(60_000),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogConfig {
    pub endpoint: String,
    pub request_timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://fakestoreapi.com".to_string(),
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    pub demo_mode_enabled: bool,
    pub demo: DemoProfile,
    pub timing: TimingConfig,
    pub catalog: CatalogConfig,
    pub environment: String,
    pub last_updated: DateTime<Utc>,
    pub version: u16,
}

impl AppConfig {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            demo_mode_enabled: true,
            demo: DemoProfile::default(),
            timing: TimingConfig::default(),
            catalog: CatalogConfig::default(),
            environment: environment.into(),
            last_updated: Utc::now(),
            version: CONFIG_VERSION,
        }
    }

    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }

    /// Apply `ECOMARKET_*` environment variables on top of the stored values.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| -> Option<String> {
            let value = lookup(key)?;
            if value.trim().is_empty() || value.chars().any(|c| c.is_control()) {
                log::warn!("Ignoring empty or malformed {}", key);
                return None;
            }
            Some(value.trim().to_string())
        };

        if let Some(value) = read(ENV_DEMO_MODE) {
            match parse_bool_flag(&value, ENV_DEMO_MODE) {
                Ok(enabled) => self.demo_mode_enabled = enabled,
                Err(err) => log::warn!("{}", err),
            }
        }

        if let Some(value) = read(ENV_CATALOG_URL) {
            log::debug!("Catalog endpoint overridden by {}", ENV_CATALOG_URL);
            self.catalog.endpoint = value;
        }

        if let Some(value) = read(ENV_CONNECT_TIMEOUT_MS) {
            match value.parse::<u64>() {
                Ok(0) => self.timing.connect_timeout_ms = None,
                Ok(ms) => self.timing.connect_timeout_ms = Some(ms),
                Err(_) => log::warn!(
                    "Invalid value '{}' for {}, keeping {:?}",
                    value,
                    ENV_CONNECT_TIMEOUT_MS,
                    self.timing.connect_timeout_ms
                ),
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigEnvelope {
    version: u16,
    checksum: [u8; 32],
    payload: AppConfig,
    modified_at_unix: i64,
}

/// Handles persistence of the application configuration with integrity checks.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn load_or_default(&self, environment: impl Into<String>) -> WalletResult<AppConfig> {
        if !self.path.exists() {
            let config = AppConfig::new(environment);
            self.save(&config)?;
            return Ok(config);
        }

        let bytes = fs::read(&self.path)?;
        let envelope: ConfigEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version != CONFIG_VERSION {
            return Err(WalletError::StorageError(format!(
                "Unsupported config version {}",
                envelope.version
            )));
        }

        if checksum(&envelope.payload)? != envelope.checksum {
            return Err(WalletError::StorageError(
                "Config integrity verification failed".to_string(),
            ));
        }

        Ok(envelope.payload)
    }

    pub fn save(&self, config: &AppConfig) -> WalletResult<()> {
        let mut payload = config.clone();
        payload.touch();

        let envelope = ConfigEnvelope {
            version: CONFIG_VERSION,
            checksum: checksum(&payload)?,
            modified_at_unix: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map_err(|e| WalletError::StorageError(e.to_string()))?
                .as_secs() as i64,
            payload,
        };

        let serialized = serde_json::to_vec_pretty(&envelope)?;
        write_atomically(&self.path, &serialized)
    }

    pub fn update<F>(&self, environment: impl Into<String>, updater: F) -> WalletResult<AppConfig>
    where
        F: FnOnce(&mut AppConfig) -> WalletResult<()>,
    {
        let mut config = self.load_or_default(environment)?;
        updater(&mut config)?;
        config.touch();
        self.save(&config)?;
        Ok(config)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Write to a sibling temp file, fsync, then rename over the target.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> WalletResult<()> {
    let tmp_path = path.with_extension("new");
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(tmp_path, path)?;
    Ok(())
}

fn checksum(config: &AppConfig) -> WalletResult<[u8; 32]> {
    let mut hasher = Blake3::new();
    let encoded = serde_json::to_vec(config)?;
    hasher.update(&encoded);
    let mut output = [0u8; 32];
    output.copy_from_slice(hasher.finalize().as_bytes());
    Ok(output)
}

pub(crate) fn parse_bool_flag(value: &str, key: &str) -> WalletResult<bool> {
    let normalized = value.trim().to_ascii_lowercase();
    if normalized.is_empty() {
        return Err(WalletError::InvalidInput(format!(
            "Configuration key '{}' cannot be empty",
            key
        )));
    }

    match normalized.as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(WalletError::InvalidInput(format!(
            "Invalid boolean value '{}' for key '{}'",
            value, key
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn save_and_load_config_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ecomarket.config");
        let store = ConfigStore::new(&path);

        let mut config = AppConfig::new("development");
        config.demo_mode_enabled = false;
        config.catalog.endpoint = "http://localhost:3001".into();
        store.save(&config).unwrap();

        let loaded = store.load_or_default("development").unwrap();
        assert!(!loaded.demo_mode_enabled);
        assert_eq!(loaded.catalog.endpoint, "http://localhost:3001");
        assert_eq!(loaded.demo, DemoProfile::default());
    }

    #[test]
    fn missing_config_is_created_with_defaults() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::new(temp.path().join("nested").join("ecomarket.config"));
        let config = store.load_or_default("test").unwrap();
        assert!(config.demo_mode_enabled);
        assert!(store.path().exists());
    }

    #[test]
    fn tampered_config_detected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ecomarket.config");
        let store = ConfigStore::new(&path);
        store.save(&AppConfig::new("test")).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        fs::write(&path, text.replace("\"demo_mode_enabled\": true", "\"demo_mode_enabled\": false")).unwrap();

        let result = store.load_or_default("test");
        assert!(matches!(result, Err(WalletError::StorageError(_))));
    }

    #[test]
    fn update_persists_changes() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::new(temp.path().join("ecomarket.config"));
        store
            .update("test", |config| {
                config.timing.processing_delay_ms = 10;
                Ok(())
            })
            .unwrap();
        assert_eq!(
            store.load_or_default("test").unwrap().timing.processing_delay_ms,
            10
        );
    }

    #[test]
    fn overrides_apply_and_ignore_garbage() {
        let vars: HashMap<&str, &str> = [
            (ENV_DEMO_MODE, "off"),
            (ENV_CATALOG_URL, "http://127.0.0.1:8080"),
            (ENV_CONNECT_TIMEOUT_MS, "soon"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::new("test");
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));
        assert!(!config.demo_mode_enabled);
        assert_eq!(config.catalog.endpoint, "http://127.0.0.1:8080");
        assert_eq!(config.timing.connect_timeout_ms, Some(60_000));

        config.apply_overrides(|key| (key == ENV_CONNECT_TIMEOUT_MS).then(|| "0".to_string()));
        assert_eq!(config.timing.connect_timeout_ms, None);
    }

    #[test]
    fn bool_flags() {
        assert!(parse_bool_flag("Yes", "K").unwrap());
        assert!(!parse_bool_flag("0", "K").unwrap());
        assert!(parse_bool_flag("maybe", "K").is_err());
    }
}
