//! Key derivation from a BIP-39 mnemonic
//!
//! Derives the master key, the BIP-84 account key and per-address signing
//! credentials. The account key is neutered once and exported as a zpub.

use bitcoin::bip32::{ChildNumber, DerivationPath, Xpriv, Xpub};
use bitcoin::secp256k1::Secp256k1;
use bitcoin::{Network, PrivateKey};
use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::scheme::Scheme;
use crate::seed::WalletSecret;
use crate::types::Chain;

/// BIP-84 account path for Bitcoin mainnet (native segwit)
pub const BIP84_PATH: &str = "m/84'/0'/0'";

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),
    #[error("Derivation failed: {0}")]
    DerivationFailed(String),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("Malformed extended key: {0}")]
    MalformedExtendedKey(String),
    #[error("Invalid index: {0}")]
    InvalidIndex(u64),
}

/// Root extended private key of a wallet.
///
/// Built from the seed for one operation and dropped afterwards. The root
/// secret is overwritten on drop.
pub struct MasterKey {
    root: Xpriv,
    network: Network,
}

impl MasterKey {
    /// Derive the root key from the wallet secret.
    pub fn from_secret(secret: &WalletSecret, network: Network) -> Result<Self, KeyError> {
        let seed = secret.seed()?;
        let root = Xpriv::new_master(network, &seed[..])
            .map_err(|e| KeyError::DerivationFailed(e.to_string()))?;
        Ok(Self { root, network })
    }

    /// Network this key was created for
    pub fn network(&self) -> Network {
        self.network
    }

    fn erase(&mut self) {
        self.root.private_key.non_secure_erase();
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.erase();
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}

/// A single-key signing credential in WIF (compressed).
pub struct Credential(Zeroizing<String>);

impl Credential {
    /// The WIF text
    pub fn as_wif(&self) -> &str {
        &self.0
    }

    /// Parse back into a private key for signing
    pub fn to_private_key(&self) -> Result<PrivateKey, KeyError> {
        PrivateKey::from_wif(&self.0).map_err(|e| KeyError::DerivationFailed(e.to_string()))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Validate a mnemonic and derive its root key
pub fn derive_master_key(mnemonic: &str, network: Network) -> Result<MasterKey, KeyError> {
    let secret = WalletSecret::from_phrase(mnemonic)?;
    MasterKey::from_secret(&secret, network)
}

/// Derive an extended private key along a path string such as `m/84'/0'/0'/0/5`
pub fn derive_path(master: &MasterKey, path: &str) -> Result<Xpriv, KeyError> {
    let path: DerivationPath = path
        .parse()
        .map_err(|e: bitcoin::bip32::Error| KeyError::InvalidPath(e.to_string()))?;
    derive(master, &path)
}

fn derive(master: &MasterKey, path: &DerivationPath) -> Result<Xpriv, KeyError> {
    master
        .root
        .derive_priv(&Secp256k1::new(), path)
        .map_err(|e| KeyError::DerivationFailed(e.to_string()))
}

/// Strip the private half of an extended key
pub fn neuter_to_public(xpriv: &Xpriv) -> Xpub {
    Xpub::from_priv(&Secp256k1::new(), xpriv)
}

/// Derive the neutered account key (`m/84'/coin'/0'` for BIP-84)
pub fn account_xpub<S: Scheme>(master: &MasterKey) -> Result<Xpub, KeyError> {
    let account = derive(master, &S::account_path(master.network()))?;
    Ok(neuter_to_public(&account))
}

/// Reject indices that would land in the hardened range
pub fn normal_child(index: u32) -> Result<ChildNumber, KeyError> {
    ChildNumber::from_normal_idx(index).map_err(|_| KeyError::InvalidIndex(index as u64))
}

/// Derive the signing credential for the address at (chain, index)
pub fn signing_credential_for_address<S: Scheme>(
    master: &MasterKey,
    chain: Chain,
    index: u32,
) -> Result<Credential, KeyError> {
    normal_child(index)?;
    let network = master.network();
    let leaf = derive(master, &S::leaf_path(network, chain, index))?;
    let key = PrivateKey::new(leaf.private_key, network);
    Ok(Credential(Zeroizing::new(key.to_wif())))
}
