use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

use crate::provider::WalletProvider;

/// Slot the host fills once a wallet extension finishes injecting itself.
///
/// Injection may happen at any time, including after the bridge already
/// selected demo mode; the bridge only looks again when it is idle.
#[derive(Clone, Default)]
pub struct ProviderSlot(Arc<RwLock<Option<Arc<dyn WalletProvider>>>>);

impl ProviderSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(provider: Arc<dyn WalletProvider>) -> Self {
        let slot = Self::new();
        slot.inject(provider);
        slot
    }

    pub fn inject(&self, provider: Arc<dyn WalletProvider>) {
        log::info!("Wallet provider injected: {}", provider.kind());
        *self.0.write() = Some(provider);
    }

    pub fn eject(&self) {
        if self.0.write().take().is_some() {
            log::info!("Wallet provider removed");
        }
    }

    fn current(&self) -> Option<Arc<dyn WalletProvider>> {
        self.0.read().clone()
    }
}

impl fmt::Debug for ProviderSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.0.read().as_ref().map(|p| p.kind().to_string());
        f.debug_tuple("ProviderSlot").field(&kind).finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    Absent,
    Present { kind: String },
}

impl Detection {
    pub fn is_present(&self) -> bool {
        matches!(self, Detection::Present { .. })
    }

    pub fn kind(&self) -> Option<&str> {
        match self {
            Detection::Present { kind } => Some(kind),
            Detection::Absent => None,
        }
    }
}

/// Synchronous capability probe. Reading the slot has no side effects, so
/// `detect` is safe to call on every poll.
#[derive(Debug, Clone)]
pub struct WalletDetector {
    slot: ProviderSlot,
}

impl WalletDetector {
    pub fn new(slot: ProviderSlot) -> Self {
        Self { slot }
    }

    pub fn detect(&self) -> Detection {
        match self.slot.current() {
            Some(provider) => Detection::Present {
                kind: provider.kind().to_string(),
            },
            None => Detection::Absent,
        }
    }

    /// Provider handle for the real adapter; `None` when detection is `Absent`.
    pub fn provider(&self) -> Option<Arc<dyn WalletProvider>> {
        self.slot.current()
    }

    pub fn slot(&self) -> &ProviderSlot {
        &self.slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ProviderFailure, ProviderRequest};
    use async_trait::async_trait;
    use serde_json::Value;

    struct Extension;

    #[async_trait]
    impl WalletProvider for Extension {
        fn kind(&self) -> &str {
            "metamask"
        }

        async fn request(&self, _request: ProviderRequest) -> Result<Value, ProviderFailure> {
            Err(ProviderFailure::new(-32601, "unsupported"))
        }
    }

    #[test]
    fn detect_reflects_slot_contents() {
        let slot = ProviderSlot::new();
        let detector = WalletDetector::new(slot.clone());
        assert_eq!(detector.detect(), Detection::Absent);
        assert!(detector.provider().is_none());

        slot.inject(Arc::new(Extension));
        let detection = detector.detect();
        assert!(detection.is_present());
        assert_eq!(detection.kind(), Some("metamask"));
        // Idempotent
        assert_eq!(detector.detect(), detection);

        slot.eject();
        assert_eq!(detector.detect(), Detection::Absent);
    }
}
