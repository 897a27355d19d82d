//! Chain-state oracle interface
//!
//! The wallet asks three questions about an address. Calls are blocking;
//! callers that need concurrency run them on a worker pool.

use bitcoin::{Address, Amount, Txid};

use crate::Error;

/// One transaction touching an address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub txid: Txid,
    /// Confirmation height, 0 while in the mempool
    pub height: u32,
}

/// An unspent output paying to one of the wallet's addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressUtxo {
    pub txid: Txid,
    pub vout: u32,
    pub amount: Amount,
    pub confirmations: u32,
    pub address: Address,
}

/// Read-only view of chain state keyed by address.
///
/// Must be connected before use; connection lifecycle belongs to the
/// implementation.
pub trait ChainOracle: Send + Sync {
    /// Every transaction that paid to or spent from `address`
    fn transactions_for_address(&self, address: &Address) -> Result<Vec<HistoryEntry>, Error>;

    /// Currently unspent outputs paying to `address`
    fn unspent_outputs_for_address(&self, address: &Address) -> Result<Vec<AddressUtxo>, Error>;

    /// Confirmed plus unconfirmed balance of `address`
    fn balance_for_address(&self, address: &Address) -> Result<Amount, Error>;
}

/// Confirmations of an output at `height` given the chain tip
pub(crate) fn confirmations(tip: u32, height: u32) -> u32 {
    if height == 0 || height > tip {
        0
    } else {
        tip - height + 1
    }
}
