//! segwallet Core
//!
//! Key material and address derivation for a BIP-84 (native segwit) HD wallet.
//!
//! # Key Derivation
//!
//! From a single BIP-39 mnemonic:
//! - Account key: m/84'/0'/0' (exported as a zpub)
//! - Receive addresses: m/84'/0'/0'/0/i
//! - Change addresses: m/84'/0'/0'/1/i
//!
//! # Secrets
//!
//! The mnemonic lives in [`WalletSecret`], which is neither `Clone` nor
//! printable. Seeds are regenerated per operation and zeroized on drop.

pub mod cache;
pub mod keys;
pub mod scheme;
pub mod seed;
pub mod types;
pub mod xkey;

pub use cache::AddressCache;
pub use keys::*;
pub use scheme::{Bip84, Scheme};
pub use seed::{generate_mnemonic, parse_mnemonic, validate_mnemonic, WalletSecret};
pub use types::Chain;
pub use xkey::{
    export_account_key, parse_account_key, reencode, xpub_to_zpub, zpub_to_xpub, KeyVersion,
};
