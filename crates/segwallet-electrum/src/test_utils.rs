//! Scriptable in-memory oracle for tests.
//!
//! Addresses without scripted history are reported as unused with no
//! balance. Every history query is recorded so tests can assert which
//! addresses were scanned.

use bitcoin::hashes::Hash;
use bitcoin::{Address, Amount, Txid};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use crate::oracle::{AddressUtxo, ChainOracle, HistoryEntry};
use crate::Error;

/// Deterministic fake txid
pub fn test_txid(n: u8) -> Txid {
    Txid::from_byte_array([n; 32])
}

#[derive(Default)]
pub struct StubOracle {
    history: HashMap<Address, Vec<HistoryEntry>>,
    utxos: HashMap<Address, Vec<AddressUtxo>>,
    balances: HashMap<Address, Amount>,
    failing: HashSet<Address>,
    delay: Option<Duration>,
    delays: HashMap<Address, Duration>,
    history_calls: Mutex<Vec<Address>>,
}

impl StubOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give `address` one confirmed transaction
    pub fn with_history(mut self, address: &Address) -> Self {
        let n = self.history.len() as u8;
        self.history
            .entry(address.clone())
            .or_default()
            .push(HistoryEntry {
                txid: test_txid(n),
                height: 800_000,
            });
        self
    }

    pub fn with_utxo(mut self, utxo: AddressUtxo) -> Self {
        self.utxos.entry(utxo.address.clone()).or_default().push(utxo);
        self
    }

    pub fn with_balance(mut self, address: &Address, amount: Amount) -> Self {
        self.balances.insert(address.clone(), amount);
        self
    }

    /// Every query about `address` fails with a connection error
    pub fn failing_on(mut self, address: &Address) -> Self {
        self.failing.insert(address.clone());
        self
    }

    /// Sleep before answering any query
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sleep before answering queries about `address`, overriding `with_delay`
    pub fn with_delay_on(mut self, address: &Address, delay: Duration) -> Self {
        self.delays.insert(address.clone(), delay);
        self
    }

    /// Addresses passed to `transactions_for_address`, in call order
    pub fn history_calls(&self) -> Vec<Address> {
        self.history_calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn answer(&self, address: &Address) -> Result<(), Error> {
        if let Some(delay) = self.delays.get(address).copied().or(self.delay) {
            std::thread::sleep(delay);
        }
        if self.failing.contains(address) {
            return Err(Error::Connection(format!("stub failure for {}", address)));
        }
        Ok(())
    }
}

impl ChainOracle for StubOracle {
    fn transactions_for_address(&self, address: &Address) -> Result<Vec<HistoryEntry>, Error> {
        self.history_calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(address.clone());
        self.answer(address)?;
        Ok(self.history.get(address).cloned().unwrap_or_default())
    }

    fn unspent_outputs_for_address(&self, address: &Address) -> Result<Vec<AddressUtxo>, Error> {
        self.answer(address)?;
        Ok(self.utxos.get(address).cloned().unwrap_or_default())
    }

    fn balance_for_address(&self, address: &Address) -> Result<Amount, Error> {
        self.answer(address)?;
        Ok(self.balances.get(address).copied().unwrap_or(Amount::ZERO))
    }
}
