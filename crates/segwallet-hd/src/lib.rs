//! segwallet HD Wallet
//!
//! A BIP-84 native segwit wallet built on `segwallet-core` key derivation
//! and a [`ChainOracle`] for chain state.
//!
//! # Features
//!
//! - Gap-limit discovery of the next free receive and change address
//! - Balance and UTXO aggregation across every tracked address
//! - Spend preparation: per-input signing credentials and change selection,
//!   handed to a [`TransactionSigner`]
//! - Watch-only wallets from a zpub
//!
//! # Example
//!
//! ```ignore
//! use segwallet_hd::{HdWallet, WalletConfig};
//! use segwallet_electrum::ElectrumClient;
//! use std::sync::Arc;
//!
//! let config = WalletConfig::from_file(Path::new("segwallet.toml"))?;
//! let client = ElectrumClient::new(&config.bitcoin.electrum_url, config.network())?;
//! let mut wallet: HdWallet<_> =
//!     HdWallet::from_mnemonic(phrase, config.network(), Arc::new(client), config.discovery)?;
//!
//! let receive = wallet.next_free_address().await?;
//! let balance = wallet.fetch_balance().await?;
//! ```

pub mod balance;
pub mod config;
pub mod discovery;
mod query;
pub mod signer;
pub mod spend;
pub mod wallet;

pub use balance::BalanceSnapshot;
pub use config::{DiscoveryConfig, WalletConfig};
pub use discovery::Discovery;
pub use signer::P2wpkhSigner;
pub use spend::{SignerError, SigningInput, TransactionSigner};
pub use wallet::HdWallet;

pub use segwallet_core::{Chain, Credential, KeyError};
pub use segwallet_electrum::{AddressUtxo, ChainOracle};
pub use tokio_util::sync::CancellationToken;

use thiserror::Error;

/// Errors from wallet operations
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    #[error("Oracle unavailable: {0}")]
    OracleUnavailable(#[from] segwallet_electrum::Error),

    #[error("Address not derived by this wallet: {0}")]
    UnknownAddress(String),

    #[error("Watch-only wallet has no signing credentials")]
    WatchOnly,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Amount overflow")]
    AmountOverflow,

    #[error("Signer error: {0}")]
    Signer(#[from] SignerError),

    #[error("Oracle task failed: {0}")]
    Task(String),
}
