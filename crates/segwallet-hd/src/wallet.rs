//! The HD wallet: account key, address cache, discovery cursors and the
//! last fetched balance/UTXO snapshot.

use bitcoin::bip32::Xpub;
use bitcoin::{Address, Network, NetworkKind};
use segwallet_core::keys::{account_xpub, signing_credential_for_address, MasterKey};
use segwallet_core::{
    export_account_key, parse_account_key, AddressCache, Bip84, Chain, Credential, KeyError,
    Scheme, WalletSecret,
};
use segwallet_electrum::{AddressUtxo, ChainOracle};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::balance::BalanceSnapshot;
use crate::config::DiscoveryConfig;
use crate::WalletError;

/// A single-account BIP-84 wallet backed by a chain oracle.
///
/// The mnemonic is optional: a watch-only wallet built from a zpub derives
/// and discovers addresses but cannot produce signing credentials.
pub struct HdWallet<O, S: Scheme = Bip84> {
    secret: Option<WalletSecret>,
    pub(crate) cache: AddressCache<S>,
    pub(crate) oracle: Arc<O>,
    pub(crate) config: DiscoveryConfig,
    pub(crate) next_free_address_index: u32,
    pub(crate) next_free_change_address_index: u32,
    pub(crate) used: BTreeSet<(Chain, u32)>,
    pub(crate) balance: BalanceSnapshot,
    pub(crate) utxo: Vec<AddressUtxo>,
}

impl<O: ChainOracle + 'static, S: Scheme> HdWallet<O, S> {
    /// Restore a wallet from a BIP-39 mnemonic phrase
    pub fn from_mnemonic(
        phrase: &str,
        network: Network,
        oracle: Arc<O>,
        config: DiscoveryConfig,
    ) -> Result<Self, WalletError> {
        let secret = WalletSecret::from_phrase(phrase)?;
        Self::from_secret(secret, network, oracle, config)
    }

    /// Create a wallet with a fresh 24-word mnemonic
    pub fn generate(
        network: Network,
        oracle: Arc<O>,
        config: DiscoveryConfig,
    ) -> Result<Self, WalletError> {
        Self::from_secret(WalletSecret::generate()?, network, oracle, config)
    }

    /// Take ownership of a wallet secret.
    ///
    /// The account key is derived once here; the seed is dropped before
    /// returning.
    pub fn from_secret(
        secret: WalletSecret,
        network: Network,
        oracle: Arc<O>,
        config: DiscoveryConfig,
    ) -> Result<Self, WalletError> {
        let master = MasterKey::from_secret(&secret, network)?;
        let account = account_xpub::<S>(&master)?;
        log::debug!("Restored {} wallet on {}", S::NAME, network);
        Ok(Self::with_account(Some(secret), account, network, oracle, config))
    }

    /// Watch-only wallet from an exported account key (zpub/vpub or the
    /// generic xpub/tpub form).
    pub fn watch_only(
        account_key: &str,
        network: Network,
        oracle: Arc<O>,
        config: DiscoveryConfig,
    ) -> Result<Self, WalletError> {
        let account = parse_account_key(account_key)?;
        if account.network != NetworkKind::from(network) {
            return Err(KeyError::MalformedExtendedKey(format!(
                "account key is not for {}",
                network
            ))
            .into());
        }
        log::debug!("Watch-only {} wallet on {}", S::NAME, network);
        Ok(Self::with_account(None, account, network, oracle, config))
    }

    fn with_account(
        secret: Option<WalletSecret>,
        account: Xpub,
        network: Network,
        oracle: Arc<O>,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            secret,
            cache: AddressCache::new(account, network),
            oracle,
            config,
            next_free_address_index: 0,
            next_free_change_address_index: 0,
            used: BTreeSet::new(),
            balance: BalanceSnapshot::default(),
            utxo: Vec::new(),
        }
    }
}

impl<O, S: Scheme> HdWallet<O, S> {
    pub fn network(&self) -> Network {
        self.cache.network()
    }

    /// True when no mnemonic is held and spending is impossible
    pub fn is_watch_only(&self) -> bool {
        self.secret.is_none()
    }

    /// The mnemonic phrase, if this wallet holds one
    pub fn mnemonic(&self) -> Option<&str> {
        self.secret.as_ref().map(|s| s.phrase())
    }

    /// Account public key in the scheme's export format (zpub on mainnet)
    pub fn account_key(&self) -> String {
        export_account_key(self.cache.account(), S::public_version(self.network()))
    }

    pub fn discovery_config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Address at (chain, index)
    pub fn address_for(&self, chain: Chain, index: u32) -> Result<Address, WalletError> {
        Ok(self.cache.address_for(chain, index)?)
    }

    /// Chain and index of an address this wallet has derived
    pub fn lookup(&self, address: &Address) -> Option<(Chain, u32)> {
        self.cache.lookup(address)
    }

    /// First receive index not known to be used
    pub fn next_free_address_index(&self) -> u32 {
        self.next_free_address_index
    }

    /// First change index not known to be used
    pub fn next_free_change_address_index(&self) -> u32 {
        self.next_free_change_address_index
    }

    pub fn cursor(&self, chain: Chain) -> u32 {
        match chain {
            Chain::External => self.next_free_address_index,
            Chain::Internal => self.next_free_change_address_index,
        }
    }

    pub(crate) fn set_cursor(&mut self, chain: Chain, index: u32) {
        match chain {
            Chain::External => self.next_free_address_index = index,
            Chain::Internal => self.next_free_change_address_index = index,
        }
    }

    /// (chain, index) pairs discovery has seen with history
    pub fn used_addresses(&self) -> &BTreeSet<(Chain, u32)> {
        &self.used
    }

    /// Private key for (chain, index), exported as WIF
    pub fn signing_credential_for_address(
        &self,
        chain: Chain,
        index: u32,
    ) -> Result<Credential, WalletError> {
        let master = self.master_key()?;
        Ok(signing_credential_for_address::<S>(&master, chain, index)?)
    }

    /// Private key for an address previously derived by this wallet
    pub fn credential_for(&self, address: &Address) -> Result<Credential, WalletError> {
        let (chain, index) = self
            .lookup(address)
            .ok_or_else(|| WalletError::UnknownAddress(address.to_string()))?;
        self.signing_credential_for_address(chain, index)
    }

    /// Re-derive the master key for one operation
    pub(crate) fn master_key(&self) -> Result<MasterKey, WalletError> {
        let secret = self.secret.as_ref().ok_or(WalletError::WatchOnly)?;
        Ok(MasterKey::from_secret(secret, self.network())?)
    }
}

impl<O, S: Scheme> fmt::Debug for HdWallet<O, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HdWallet")
            .field("scheme", &S::NAME)
            .field("network", &self.network())
            .field("watch_only", &self.is_watch_only())
            .field("next_free_address_index", &self.next_free_address_index)
            .field(
                "next_free_change_address_index",
                &self.next_free_change_address_index,
            )
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segwallet_electrum::test_utils::StubOracle;

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
    const ZPUB: &str = "zpub6rFR7y4Q2AijBEqTUquhVz398htDFrtymD9xYYfG1m4wAcvPhXNfE3EfH1r1ADqtfSdVCToUG868RvUUkgDKf31mGDtKsAYz2oz2AGutZYs";

    fn wallet() -> HdWallet<StubOracle> {
        HdWallet::from_mnemonic(
            ABANDON,
            Network::Bitcoin,
            Arc::new(StubOracle::new()),
            DiscoveryConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_account_key_vector() {
        assert_eq!(wallet().account_key(), ZPUB);
    }

    #[test]
    fn test_known_addresses() {
        let w = wallet();
        assert_eq!(
            w.address_for(Chain::External, 0).unwrap().to_string(),
            "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu"
        );
        assert_eq!(
            w.address_for(Chain::Internal, 0).unwrap().to_string(),
            "bc1q8c6fshw2dlwun7ekn9qwf37cu2rn755upcp6el"
        );
    }

    #[test]
    fn test_credentials() {
        let w = wallet();
        let wif = w.signing_credential_for_address(Chain::External, 0).unwrap();
        assert_eq!(
            wif.as_wif(),
            "KyZpNDKnfs94vbrwhJneDi77V6jF64PWPF8x5cdJb8ifgg2DUc9d"
        );

        let change = w.address_for(Chain::Internal, 0).unwrap();
        let wif = w.credential_for(&change).unwrap();
        assert_eq!(
            wif.as_wif(),
            "KxuoxufJL5csa1Wieb2kp29VNdn92Us8CoaUG3aGtPtcF3AzeXvF"
        );
    }

    #[test]
    fn test_unknown_address() {
        let w = wallet();
        let other = wallet();
        let far = other.address_for(Chain::External, 500).unwrap();
        // Equal keys, but `w` never derived index 500
        assert!(matches!(
            w.credential_for(&far),
            Err(WalletError::UnknownAddress(_))
        ));
    }

    #[test]
    fn test_watch_only_matches_full_wallet() {
        let full = wallet();
        let watch: HdWallet<StubOracle> = HdWallet::watch_only(
            ZPUB,
            Network::Bitcoin,
            Arc::new(StubOracle::new()),
            DiscoveryConfig::default(),
        )
        .unwrap();

        assert!(watch.is_watch_only());
        assert!(watch.mnemonic().is_none());
        for i in 0..5 {
            assert_eq!(
                watch.address_for(Chain::External, i).unwrap(),
                full.address_for(Chain::External, i).unwrap()
            );
        }
        assert!(matches!(
            watch.signing_credential_for_address(Chain::External, 0),
            Err(WalletError::WatchOnly)
        ));
    }

    #[test]
    fn test_watch_only_network_mismatch() {
        let result: Result<HdWallet<StubOracle>, _> = HdWallet::watch_only(
            ZPUB,
            Network::Testnet,
            Arc::new(StubOracle::new()),
            DiscoveryConfig::default(),
        );
        assert!(matches!(
            result,
            Err(WalletError::Key(KeyError::MalformedExtendedKey(_)))
        ));
    }

    #[test]
    fn test_invalid_mnemonic() {
        let result: Result<HdWallet<StubOracle>, _> = HdWallet::from_mnemonic(
            "abandon abandon abandon",
            Network::Bitcoin,
            Arc::new(StubOracle::new()),
            DiscoveryConfig::default(),
        );
        assert!(matches!(
            result,
            Err(WalletError::Key(KeyError::InvalidMnemonic(_)))
        ));
    }

    #[test]
    fn test_generate() {
        let w: HdWallet<StubOracle> = HdWallet::generate(
            Network::Testnet,
            Arc::new(StubOracle::new()),
            DiscoveryConfig::default(),
        )
        .unwrap();
        assert_eq!(w.mnemonic().unwrap().split_whitespace().count(), 24);
        assert!(w.account_key().starts_with("vpub"));
        assert!(w
            .address_for(Chain::External, 0)
            .unwrap()
            .to_string()
            .starts_with("tb1q"));
    }

    #[test]
    fn test_fresh_cursors() {
        let w = wallet();
        assert_eq!(w.next_free_address_index(), 0);
        assert_eq!(w.next_free_change_address_index(), 0);
        assert!(w.used_addresses().is_empty());
    }

    #[test]
    fn test_debug_hides_mnemonic() {
        let printed = format!("{:?}", wallet());
        assert!(!printed.contains("abandon"));
    }
}
