//! Balance and UTXO aggregation over the wallet's tracked addresses.

use bitcoin::{Address, Amount};
use segwallet_core::{Chain, Scheme};
use segwallet_electrum::{AddressUtxo, ChainOracle};
use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;

use crate::query::query_all;
use crate::wallet::HdWallet;
use crate::WalletError;

/// Last fetched wallet balance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceSnapshot {
    pub satoshis: Amount,
    /// Unix seconds of the last successful fetch, 0 if never fetched
    pub last_fetch_timestamp: u64,
}

impl Default for BalanceSnapshot {
    fn default() -> Self {
        Self {
            satoshis: Amount::ZERO,
            last_fetch_timestamp: 0,
        }
    }
}

impl BalanceSnapshot {
    pub fn is_fetched(&self) -> bool {
        self.last_fetch_timestamp != 0
    }
}

impl<O: ChainOracle + 'static, S: Scheme> HdWallet<O, S> {
    /// Every address balances and UTXOs are collected from: receive and
    /// change addresses up to and including their cursors, plus anything
    /// discovery saw with history.
    pub fn tracked_addresses(&self) -> Result<Vec<Address>, WalletError> {
        let mut keys: BTreeSet<(Chain, u32)> = self.used.clone();
        keys.extend((0..=self.next_free_address_index).map(|i| (Chain::External, i)));
        keys.extend((0..=self.next_free_change_address_index).map(|i| (Chain::Internal, i)));

        keys.into_iter()
            .map(|(chain, index)| self.address_for(chain, index))
            .collect()
    }

    /// Query and store the wallet balance.
    ///
    /// On failure the previous snapshot is kept.
    pub async fn fetch_balance(&mut self) -> Result<Amount, WalletError> {
        let addresses = self.tracked_addresses()?;
        let count = addresses.len();
        let balances = query_all(
            &self.oracle,
            addresses,
            self.config.max_in_flight,
            &CancellationToken::new(),
            |oracle, address| oracle.balance_for_address(address),
        )
        .await?;

        let total = balances
            .into_iter()
            .try_fold(Amount::ZERO, |acc, b| acc.checked_add(b))
            .ok_or(WalletError::AmountOverflow)?;

        self.balance = BalanceSnapshot {
            satoshis: total,
            last_fetch_timestamp: current_timestamp(),
        };
        log::info!("Balance {} across {} addresses", total, count);
        Ok(total)
    }

    /// Stored balance in BTC
    pub fn balance(&self) -> f64 {
        self.balance.satoshis.to_btc()
    }

    pub fn balance_snapshot(&self) -> BalanceSnapshot {
        self.balance
    }

    /// Query and store unspent outputs of every tracked address
    pub async fn fetch_utxo(&mut self) -> Result<Vec<AddressUtxo>, WalletError> {
        let addresses = self.tracked_addresses()?;
        let per_address = query_all(
            &self.oracle,
            addresses,
            self.config.max_in_flight,
            &CancellationToken::new(),
            |oracle, address| oracle.unspent_outputs_for_address(address),
        )
        .await?;

        self.utxo = per_address.into_iter().flatten().collect();
        log::debug!("Fetched {} UTXOs", self.utxo.len());
        Ok(self.utxo.clone())
    }

    /// UTXOs from the last successful [`fetch_utxo`](Self::fetch_utxo)
    pub fn utxo(&self) -> &[AddressUtxo] {
        &self.utxo
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
