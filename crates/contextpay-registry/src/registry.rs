//! Merchant registry trait and in-memory implementation

use std::collections::HashMap;

use contextpay_crypto::PublicKey;
use contextpay_types::{BeaconIdentity, MerchantEntry};
use parking_lot::RwLock;

/// Lookup service for whitelisted beacons and merchant verification keys
pub trait MerchantRegistry: Send + Sync {
    /// Merchant metadata for a beacon, or `None` if it is not whitelisted
    fn find_beacon(&self, identity: &BeaconIdentity) -> Option<MerchantEntry>;

    /// Public key used to verify tokens for `merchant_id`
    fn merchant_public_key(&self, merchant_id: &str) -> Option<PublicKey>;
}

impl<R: MerchantRegistry + ?Sized> MerchantRegistry for std::sync::Arc<R> {
    fn find_beacon(&self, identity: &BeaconIdentity) -> Option<MerchantEntry> {
        (**self).find_beacon(identity)
    }

    fn merchant_public_key(&self, merchant_id: &str) -> Option<PublicKey> {
        (**self).merchant_public_key(merchant_id)
    }
}

/// In-memory whitelist
#[derive(Default)]
pub struct InMemoryMerchantRegistry {
    beacons: RwLock<HashMap<BeaconIdentity, MerchantEntry>>,
    keys: RwLock<HashMap<String, PublicKey>>,
}

impl InMemoryMerchantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whitelist a beacon, replacing any previous entry for it
    pub fn register_beacon(&self, identity: BeaconIdentity, entry: MerchantEntry) {
        tracing::debug!(
            beacon = %identity,
            location_id = %entry.location_id,
            merchant_id = %entry.merchant_id,
            "Beacon registered"
        );
        self.beacons.write().insert(identity.normalized(), entry);
    }

    /// Remove a beacon from the whitelist
    pub fn remove_beacon(&self, identity: &BeaconIdentity) -> Option<MerchantEntry> {
        self.beacons.write().remove(&identity.normalized())
    }

    /// Publish the verification key for a merchant
    pub fn register_merchant_key(&self, merchant_id: impl Into<String>, key: PublicKey) {
        let merchant_id = merchant_id.into();
        tracing::debug!(merchant_id = %merchant_id, "Merchant key registered");
        self.keys.write().insert(merchant_id, key);
    }

    pub fn beacon_count(&self) -> usize {
        self.beacons.read().len()
    }

    pub fn merchant_count(&self) -> usize {
        self.keys.read().len()
    }
}

impl MerchantRegistry for InMemoryMerchantRegistry {
    fn find_beacon(&self, identity: &BeaconIdentity) -> Option<MerchantEntry> {
        self.beacons.read().get(&identity.normalized()).cloned()
    }

    fn merchant_public_key(&self, merchant_id: &str) -> Option<PublicKey> {
        self.keys.read().get(merchant_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contextpay_crypto::KeyPair;

    #[test]
    fn test_unknown_beacon_is_none() {
        let registry = InMemoryMerchantRegistry::new();
        assert!(registry.find_beacon(&BeaconIdentity::new("uuid-X", 1, 1)).is_none());
    }

    #[test]
    fn test_find_beacon_ignores_uuid_case() {
        let registry = InMemoryMerchantRegistry::new();
        registry.register_beacon(
            BeaconIdentity::new("ABCD-1234", 1, 2),
            MerchantEntry::new("Cafe", "store-1", "m-1"),
        );

        let found = registry.find_beacon(&BeaconIdentity::new("abcd-1234", 1, 2)).unwrap();
        assert_eq!(found.location_id, "store-1");
        assert!(registry.find_beacon(&BeaconIdentity::new("abcd-1234", 1, 3)).is_none());
    }

    #[test]
    fn test_remove_beacon() {
        let registry = InMemoryMerchantRegistry::new();
        let id = BeaconIdentity::new("u", 1, 1);
        registry.register_beacon(id.clone(), MerchantEntry::new("Cafe", "store-1", "m-1"));
        assert!(registry.remove_beacon(&id).is_some());
        assert!(registry.find_beacon(&id).is_none());
    }

    #[test]
    fn test_merchant_key_lookup() {
        let registry = InMemoryMerchantRegistry::new();
        let public = PublicKey::from_keypair(&KeyPair::generate());
        registry.register_merchant_key("m-1", public.clone());

        assert_eq!(registry.merchant_public_key("m-1"), Some(public));
        assert!(registry.merchant_public_key("m-2").is_none());
        assert_eq!(registry.merchant_count(), 1);
    }
}
