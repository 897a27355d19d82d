//! Memoizing address derivation
//!
//! Addresses are a pure function of (account key, chain, index), so every
//! derived address is kept for the lifetime of the cache. Nothing is evicted.

use bitcoin::bip32::{ChildNumber, Xpub};
use bitcoin::secp256k1::{Secp256k1, VerifyOnly};
use bitcoin::{Address, CompressedPublicKey, Network};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Mutex, MutexGuard};

use crate::keys::{normal_child, KeyError};
use crate::scheme::{Bip84, Scheme};
use crate::types::Chain;

#[derive(Default)]
struct Entries {
    by_index: HashMap<(Chain, u32), Address>,
    by_address: HashMap<Address, (Chain, u32)>,
}

/// Append-only map from (chain, index) to address.
///
/// Safe to share between threads. Derivation runs outside the lock and the
/// result is inserted only if absent, so two racing derivations of the same
/// key store a single (identical) value.
pub struct AddressCache<S: Scheme = Bip84> {
    account: Xpub,
    network: Network,
    secp: Secp256k1<VerifyOnly>,
    entries: Mutex<Entries>,
    _scheme: PhantomData<S>,
}

impl<S: Scheme> AddressCache<S> {
    /// Create an empty cache over an account-level public key
    pub fn new(account: Xpub, network: Network) -> Self {
        Self {
            account,
            network,
            secp: Secp256k1::verification_only(),
            entries: Mutex::new(Entries::default()),
            _scheme: PhantomData,
        }
    }

    /// The account key addresses are derived from
    pub fn account(&self) -> &Xpub {
        &self.account
    }

    /// Network addresses are encoded for
    pub fn network(&self) -> Network {
        self.network
    }

    /// Address at (chain, index), derived on first use
    pub fn address_for(&self, chain: Chain, index: u32) -> Result<Address, KeyError> {
        if let Some(address) = self.entries().by_index.get(&(chain, index)) {
            return Ok(address.clone());
        }

        let address = self.derive(chain, index)?;
        log::trace!("derived {} address {}: {}", chain, index, address);

        let mut entries = self.entries();
        let stored = entries
            .by_index
            .entry((chain, index))
            .or_insert(address)
            .clone();
        entries
            .by_address
            .entry(stored.clone())
            .or_insert((chain, index));
        Ok(stored)
    }

    /// Where a previously derived address sits in the hierarchy
    pub fn lookup(&self, address: &Address) -> Option<(Chain, u32)> {
        self.entries().by_address.get(address).copied()
    }

    /// Number of cached addresses across both chains
    pub fn len(&self) -> usize {
        self.entries().by_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn derive(&self, chain: Chain, index: u32) -> Result<Address, KeyError> {
        let path = [
            ChildNumber::Normal {
                index: chain.branch(),
            },
            normal_child(index)?,
        ];
        let child = self
            .account
            .derive_pub(&self.secp, &path)
            .map_err(|e| KeyError::DerivationFailed(e.to_string()))?;
        Ok(S::address(&CompressedPublicKey(child.public_key), self.network))
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        // Entries are only ever inserted whole, so a poisoned map is still consistent
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xkey::parse_account_key;
    use std::collections::HashSet;
    use std::sync::Arc;

    const ZPUB: &str = "zpub6rFR7y4Q2AijBEqTUquhVz398htDFrtymD9xYYfG1m4wAcvPhXNfE3EfH1r1ADqtfSdVCToUG868RvUUkgDKf31mGDtKsAYz2oz2AGutZYs";

    fn cache() -> AddressCache {
        AddressCache::new(parse_account_key(ZPUB).unwrap(), Network::Bitcoin)
    }

    #[test]
    fn test_bip84_address_vectors() {
        let cache = cache();
        assert_eq!(
            cache.address_for(Chain::External, 0).unwrap().to_string(),
            "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu"
        );
        assert_eq!(
            cache.address_for(Chain::External, 1).unwrap().to_string(),
            "bc1qnjg0jd8228aq7egyzacy8cys3knf9xvrerkf9g"
        );
        assert_eq!(
            cache.address_for(Chain::Internal, 0).unwrap().to_string(),
            "bc1q8c6fshw2dlwun7ekn9qwf37cu2rn755upcp6el"
        );
    }

    #[test]
    fn test_memoized() {
        let cache = cache();
        let first = cache.address_for(Chain::External, 5).unwrap();
        assert_eq!(cache.len(), 1);
        let second = cache.address_for(Chain::External, 5).unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_deterministic_across_instances() {
        let a = cache();
        let b = cache();
        for index in 0..5 {
            assert_eq!(
                a.address_for(Chain::Internal, index).unwrap(),
                b.address_for(Chain::Internal, index).unwrap()
            );
        }
    }

    #[test]
    fn test_unique_per_index_and_chain() {
        let cache = cache();
        let mut seen = HashSet::new();
        for chain in [Chain::External, Chain::Internal] {
            for index in 0..20 {
                assert!(seen.insert(cache.address_for(chain, index).unwrap()));
            }
        }
    }

    #[test]
    fn test_lookup() {
        let cache = cache();
        let address = cache.address_for(Chain::Internal, 9).unwrap();
        assert_eq!(cache.lookup(&address), Some((Chain::Internal, 9)));

        let unknown = self::cache().address_for(Chain::External, 100).unwrap();
        assert_eq!(cache.lookup(&unknown), None);
    }

    #[test]
    fn test_hardened_index_rejected() {
        let cache = cache();
        assert!(matches!(
            cache.address_for(Chain::External, u32::MAX),
            Err(KeyError::InvalidIndex(_))
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_derivation_stores_one_value() {
        let cache = Arc::new(cache());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.address_for(Chain::External, 42).unwrap())
            })
            .collect();
        let results: HashSet<Address> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.len(), 1);
        assert_eq!(cache.len(), 1);
    }
}
