//! Wallet derivation schemes
//!
//! A scheme fixes the derivation path template, the extended-key version
//! bytes used on export, and the address encoding. Wallet types are generic
//! over it instead of having one wallet type per variant.

use bitcoin::bip32::{ChildNumber, DerivationPath};
use bitcoin::{Address, CompressedPublicKey, Network};

use crate::types::Chain;
use crate::xkey::KeyVersion;

/// Capabilities a derivation scheme provides to the wallet.
pub trait Scheme: Send + Sync + 'static {
    /// Human-readable scheme name
    const NAME: &'static str;

    /// BIP-43 purpose field
    const PURPOSE: u32;

    /// SLIP-44 coin type: 0 on mainnet, 1 on every test network.
    fn coin_type(network: Network) -> u32 {
        match network {
            Network::Bitcoin => 0,
            _ => 1,
        }
    }

    /// Account path `m/purpose'/coin'/0'`
    fn account_path(network: Network) -> DerivationPath {
        DerivationPath::from(vec![
            ChildNumber::Hardened {
                index: Self::PURPOSE,
            },
            ChildNumber::Hardened {
                index: Self::coin_type(network),
            },
            ChildNumber::Hardened { index: 0 },
        ])
    }

    /// Full path for a leaf key, `m/purpose'/coin'/0'/chain/index`.
    ///
    /// `index` must already be checked to be non-hardened.
    fn leaf_path(network: Network, chain: Chain, index: u32) -> DerivationPath {
        Self::account_path(network)
            .child(ChildNumber::Normal {
                index: chain.branch(),
            })
            .child(ChildNumber::Normal { index })
    }

    /// Version bytes the account public key is exported with.
    fn public_version(network: Network) -> KeyVersion;

    /// Encode a leaf public key as an address.
    fn address(public_key: &CompressedPublicKey, network: Network) -> Address;
}

/// BIP-84: native segwit v0 (P2WPKH) with zpub/vpub export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bip84;

impl Scheme for Bip84 {
    const NAME: &'static str = "HD SegWit (BIP84 Bech32 Native)";
    const PURPOSE: u32 = 84;

    fn public_version(network: Network) -> KeyVersion {
        match network {
            Network::Bitcoin => KeyVersion::ZPUB,
            _ => KeyVersion::VPUB,
        }
    }

    fn address(public_key: &CompressedPublicKey, network: Network) -> Address {
        Address::p2wpkh(public_key, network)
    }
}
