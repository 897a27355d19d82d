//! Shared wallet types

use serde::{Deserialize, Serialize};
use std::fmt;

/// A BIP-44 style derivation chain under the account key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    /// Receive addresses (branch 0)
    External,
    /// Change addresses (branch 1)
    Internal,
}

impl Chain {
    /// The non-hardened child number of this chain under the account key.
    pub fn branch(self) -> u32 {
        match self {
            Chain::External => 0,
            Chain::Internal => 1,
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chain::External => write!(f, "external"),
            Chain::Internal => write!(f, "internal"),
        }
    }
}
