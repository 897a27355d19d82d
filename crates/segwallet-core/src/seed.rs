//! BIP-39 mnemonic handling
//!
//! Handles mnemonic generation, import, and on-demand seed derivation.

use bip39::{Language, Mnemonic};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use zeroize::{Zeroize, Zeroizing};

use crate::keys::KeyError;

/// Entropy for newly generated wallets (24 words)
const ENTROPY_BYTES: usize = 32;

/// The wallet's mnemonic phrase.
///
/// Exclusively owned by one wallet. Not `Clone`, redacted in `Debug`,
/// wiped from memory on drop.
pub struct WalletSecret {
    phrase: Zeroizing<String>,
}

impl WalletSecret {
    /// Import a mnemonic. Whitespace is normalized; the checksum and
    /// wordlist membership are validated.
    pub fn from_phrase(words: &str) -> Result<Self, KeyError> {
        let mnemonic = parse_mnemonic(words)?;
        Ok(Self {
            phrase: Zeroizing::new(mnemonic.to_string()),
        })
    }

    /// Create a fresh 24-word secret from OS randomness.
    pub fn generate() -> Result<Self, KeyError> {
        let mnemonic = generate_mnemonic()?;
        Ok(Self {
            phrase: Zeroizing::new(mnemonic.to_string()),
        })
    }

    /// The normalized phrase, for backup display only.
    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    /// Derive the BIP-39 seed (empty passphrase).
    ///
    /// The phrase was validated on construction, so re-parsing cannot fail
    /// unless memory was corrupted.
    pub(crate) fn seed(&self) -> Result<Zeroizing<[u8; 64]>, KeyError> {
        let mnemonic = parse_mnemonic(&self.phrase)?;
        Ok(Zeroizing::new(mnemonic.to_seed("")))
    }
}

impl fmt::Debug for WalletSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WalletSecret(<redacted>)")
    }
}

/// Generate a new BIP-39 mnemonic (24 words) from 32 bytes of OS randomness
pub fn generate_mnemonic() -> Result<Mnemonic, KeyError> {
    let mut entropy = [0u8; ENTROPY_BYTES];
    OsRng.fill_bytes(&mut entropy);
    let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy)
        .map_err(|e| KeyError::InvalidMnemonic(e.to_string()));
    entropy.zeroize();
    mnemonic
}

/// Parse a mnemonic from words
pub fn parse_mnemonic(words: &str) -> Result<Mnemonic, KeyError> {
    Mnemonic::parse_in(Language::English, words)
        .map_err(|e| KeyError::InvalidMnemonic(e.to_string()))
}

/// Check a phrase without keeping it
pub fn validate_mnemonic(words: &str) -> bool {
    parse_mnemonic(words).is_ok()
}
