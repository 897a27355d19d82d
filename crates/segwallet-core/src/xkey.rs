//! Extended-key version re-encoding
//!
//! `bitcoin` only understands the generic xpub/tpub prefixes, while BIP-84
//! wallets export the same key material under zpub/vpub. Only the first four
//! bytes of the 78-byte payload differ, so conversion is a base58check
//! decode, a prefix swap and a re-encode.

use bitcoin::base58;
use bitcoin::bip32::Xpub;
use std::fmt;

use crate::keys::KeyError;

/// Length of a serialized BIP-32 extended key
const EXTENDED_KEY_LEN: usize = 78;

/// Four-byte extended-key version prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyVersion(pub [u8; 4]);

impl KeyVersion {
    /// Generic mainnet public (`xpub`)
    pub const XPUB: KeyVersion = KeyVersion([0x04, 0x88, 0xB2, 0x1E]);
    /// Native segwit mainnet public (`zpub`)
    pub const ZPUB: KeyVersion = KeyVersion([0x04, 0xB2, 0x47, 0x46]);
    /// Generic testnet public (`tpub`)
    pub const TPUB: KeyVersion = KeyVersion([0x04, 0x35, 0x87, 0xCF]);
    /// Native segwit testnet public (`vpub`)
    pub const VPUB: KeyVersion = KeyVersion([0x04, 0x5F, 0x1C, 0xF6]);

    /// Generic counterpart understood by `bitcoin::bip32`
    pub fn generic(self) -> Option<KeyVersion> {
        match self {
            KeyVersion::XPUB | KeyVersion::ZPUB => Some(KeyVersion::XPUB),
            KeyVersion::TPUB | KeyVersion::VPUB => Some(KeyVersion::TPUB),
            _ => None,
        }
    }
}

impl fmt::Display for KeyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", u32::from_be_bytes(self.0))
    }
}

fn decode(key: &str) -> Result<Vec<u8>, KeyError> {
    let data =
        base58::decode_check(key).map_err(|e| KeyError::MalformedExtendedKey(e.to_string()))?;
    if data.len() != EXTENDED_KEY_LEN {
        return Err(KeyError::MalformedExtendedKey(format!(
            "expected {} bytes, got {}",
            EXTENDED_KEY_LEN,
            data.len()
        )));
    }
    Ok(data)
}

fn prefix(data: &[u8]) -> KeyVersion {
    KeyVersion([data[0], data[1], data[2], data[3]])
}

/// Swap the version prefix of a base58check extended key.
///
/// Fails if the key does not decode, is not 78 bytes, or does not carry
/// the `from` prefix.
pub fn reencode(key: &str, from: KeyVersion, to: KeyVersion) -> Result<String, KeyError> {
    let mut data = decode(key)?;
    let found = prefix(&data);
    if found != from {
        return Err(KeyError::MalformedExtendedKey(format!(
            "expected version {}, found {}",
            from, found
        )));
    }
    data[..4].copy_from_slice(&to.0);
    Ok(base58::encode_check(&data))
}

/// Mainnet xpub to zpub
pub fn xpub_to_zpub(xpub: &str) -> Result<String, KeyError> {
    reencode(xpub, KeyVersion::XPUB, KeyVersion::ZPUB)
}

/// Mainnet zpub to xpub
pub fn zpub_to_xpub(zpub: &str) -> Result<String, KeyError> {
    reencode(zpub, KeyVersion::ZPUB, KeyVersion::XPUB)
}

/// Serialize an account key under the given version prefix
pub fn export_account_key(xpub: &Xpub, version: KeyVersion) -> String {
    let mut data = xpub.encode();
    data[..4].copy_from_slice(&version.0);
    base58::encode_check(&data)
}

/// Parse an account key given as xpub, zpub, tpub or vpub
pub fn parse_account_key(key: &str) -> Result<Xpub, KeyError> {
    let mut data = decode(key)?;
    let version = prefix(&data);
    let generic = version.generic().ok_or_else(|| {
        KeyError::MalformedExtendedKey(format!("unsupported version {}", version))
    })?;
    data[..4].copy_from_slice(&generic.0);
    Xpub::decode(&data).map_err(|e| KeyError::MalformedExtendedKey(e.to_string()))
}
