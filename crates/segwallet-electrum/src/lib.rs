//! segwallet Electrum Client
//!
//! Provides chain-state access via the Electrum protocol for:
//! - Address history (gap-limit discovery of free addresses)
//! - UTXO enumeration (spendable outputs per address)
//! - Per-address balances
//!
//! The wallet depends only on the [`ChainOracle`] trait; [`ElectrumClient`]
//! is the network-backed implementation.
//!
//! # Security
//!
//! - Always use SSL/TLS connections (ssl:// or tcp+tls://)
//! - Never send private keys over the wire
//!
//! # Example
//!
//! ```ignore
//! use segwallet_electrum::{ChainOracle, ElectrumClient};
//! use bitcoin::Network;
//!
//! let client = ElectrumClient::new("ssl://electrum.blockstream.info:50002", Network::Bitcoin)?;
//! let history = client.transactions_for_address(&address)?;
//! println!("{} has {} transactions", address, history.len());
//! ```

pub mod oracle;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use oracle::{AddressUtxo, ChainOracle, HistoryEntry};

use bitcoin::{Address, Amount, Network, OutPoint, Script, ScriptBuf};
use electrum_client::{ElectrumApi, Error as ElectrumError};
use thiserror::Error;

/// Errors from Electrum operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Electrum protocol error: {0}")]
    Protocol(#[from] ElectrumError),
}

/// A UTXO (unspent transaction output) discovered via Electrum
#[derive(Debug, Clone)]
pub struct Utxo {
    /// The outpoint (txid:vout)
    pub outpoint: OutPoint,
    /// Value in satoshis
    pub value: Amount,
    /// Block height where this was confirmed (0 if unconfirmed)
    pub height: u32,
    /// The script pubkey
    pub script_pubkey: ScriptBuf,
}

/// Electrum client for Bitcoin network operations
pub struct ElectrumClient {
    client: electrum_client::Client,
    network: Network,
}

impl ElectrumClient {
    /// Create a new Electrum client
    ///
    /// # Arguments
    /// * `url` - Electrum server URL (e.g., "ssl://electrum.blockstream.info:50002")
    /// * `network` - Bitcoin network (Mainnet, Testnet, Signet, Regtest)
    ///
    /// # Security
    /// Always use SSL URLs in production. Plaintext connections can be MITM'd.
    pub fn new(url: &str, network: Network) -> Result<Self, Error> {
        if !url.starts_with("ssl://") && !url.contains("tls") {
            log::warn!("Connecting to Electrum without SSL - insecure for mainnet!");
        }

        let client = electrum_client::Client::new(url)
            .map_err(|e: ElectrumError| Error::Connection(e.to_string()))?;

        log::info!("Connected to Electrum server {} ({})", url, network);
        Ok(Self { client, network })
    }

    /// Get current blockchain height
    pub fn get_height(&self) -> Result<u32, Error> {
        let header = self.client.block_headers_subscribe()?;
        Ok(header.height as u32)
    }

    /// Get the confirmed and mempool history of a script
    pub fn get_script_history(&self, script: &Script) -> Result<Vec<HistoryEntry>, Error> {
        let history = self.client.script_get_history(script)?;
        Ok(history
            .into_iter()
            .map(|h| HistoryEntry {
                txid: h.tx_hash,
                // Electrum reports mempool entries with height 0 or -1
                height: h.height.max(0) as u32,
            })
            .collect())
    }

    /// Get UTXOs for a script
    pub fn get_utxos_for_script(&self, script: &Script) -> Result<Vec<Utxo>, Error> {
        let unspent = self.client.script_list_unspent(script)?;

        let utxos: Vec<Utxo> = unspent
            .into_iter()
            .map(|u| Utxo {
                outpoint: OutPoint {
                    txid: u.tx_hash,
                    vout: u.tx_pos as u32,
                },
                value: Amount::from_sat(u.value),
                height: u.height as u32,
                script_pubkey: script.to_owned(),
            })
            .collect();

        Ok(utxos)
    }

    /// Get UTXOs for an address
    pub fn get_utxos(&self, address: &Address) -> Result<Vec<Utxo>, Error> {
        self.get_utxos_for_script(address.script_pubkey().as_script())
    }

    /// Get the balance for a script
    pub fn get_balance(&self, script: &Script) -> Result<Amount, Error> {
        let balance = self.client.script_get_balance(script)?;
        // unconfirmed can be negative (pending spends)
        let total = balance.confirmed as i64 + balance.unconfirmed;
        Ok(Amount::from_sat(total.max(0) as u64))
    }

    /// Get the network this client is configured for
    pub fn network(&self) -> Network {
        self.network
    }
}

impl ChainOracle for ElectrumClient {
    fn transactions_for_address(&self, address: &Address) -> Result<Vec<HistoryEntry>, Error> {
        self.get_script_history(address.script_pubkey().as_script())
    }

    fn unspent_outputs_for_address(&self, address: &Address) -> Result<Vec<AddressUtxo>, Error> {
        let tip = self.get_height()?;
        let utxos = self.get_utxos(address)?;
        Ok(utxos
            .into_iter()
            .map(|u| AddressUtxo {
                txid: u.outpoint.txid,
                vout: u.outpoint.vout,
                amount: u.value,
                confirmations: oracle::confirmations(tip, u.height),
                address: address.clone(),
            })
            .collect())
    }

    fn balance_for_address(&self, address: &Address) -> Result<Amount, Error> {
        self.get_balance(address.script_pubkey().as_script())
    }
}

/// Default Electrum servers for each network
pub fn default_server(network: Network) -> &'static str {
    match network {
        Network::Bitcoin => "ssl://electrum.blockstream.info:50002",
        Network::Testnet => "ssl://electrum.blockstream.info:60002",
        Network::Signet => "ssl://mempool.space:60602",
        Network::Regtest => "tcp://127.0.0.1:60401",
        _ => "ssl://electrum.blockstream.info:50002",
    }
}
