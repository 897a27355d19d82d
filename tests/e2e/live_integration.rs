//! Live Integration Tests: Electrum
//!
//! These tests make REAL network calls. No mocks.
//! Run with: cargo test -p segwallet-e2e --test live_integration -- --ignored --nocapture
//!
//! Test wallet (mainnet): the BIP-84 reference mnemonic
//! "abandon ... about", whose first receive address has public history.

use bitcoin::Network;
use segwallet_core::Chain;
use segwallet_electrum::{default_server, ChainOracle, ElectrumClient};
use segwallet_hd::{DiscoveryConfig, HdWallet};
use std::sync::Arc;

const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

fn connect_mainnet() -> ElectrumClient {
    let server = default_server(Network::Bitcoin);
    println!("  Connecting to {}...", server);
    ElectrumClient::new(server, Network::Bitcoin).expect("No mainnet Electrum server available")
}

#[test]
#[ignore = "requires network access - mainnet Electrum"]
fn test1_reference_address_has_history() {
    let client = connect_mainnet();
    let wallet: HdWallet<ElectrumClient> = HdWallet::from_mnemonic(
        ABANDON,
        Network::Bitcoin,
        Arc::new(connect_mainnet()),
        DiscoveryConfig::default(),
    )
    .unwrap();

    let address = wallet.address_for(Chain::External, 0).unwrap();
    let history = client.transactions_for_address(&address).unwrap();
    println!("  {} has {} transactions", address, history.len());
    assert!(!history.is_empty());
}

#[tokio::test]
#[ignore = "requires network access - mainnet Electrum"]
async fn test2_discovery_skips_used_addresses() {
    let mut wallet: HdWallet<ElectrumClient> = HdWallet::from_mnemonic(
        ABANDON,
        Network::Bitcoin,
        Arc::new(connect_mainnet()),
        DiscoveryConfig {
            max_in_flight: 4,
            ..Default::default()
        },
    )
    .unwrap();

    let receive = wallet.next_free_address().await.unwrap();
    println!(
        "  Next free receive address: {} (index {})",
        receive,
        wallet.next_free_address_index()
    );
    assert!(wallet.next_free_address_index() > 0);

    let change = wallet.next_free_change_address().await.unwrap();
    println!(
        "  Next free change address: {} (index {})",
        change,
        wallet.next_free_change_address_index()
    );
}

#[tokio::test]
#[ignore = "requires network access - mainnet Electrum"]
async fn test3_balance_and_utxos() {
    let mut wallet: HdWallet<ElectrumClient> = HdWallet::from_mnemonic(
        ABANDON,
        Network::Bitcoin,
        Arc::new(connect_mainnet()),
        DiscoveryConfig::default(),
    )
    .unwrap();

    wallet.next_free_address().await.unwrap();
    let balance = wallet.fetch_balance().await.unwrap();
    let utxos = wallet.fetch_utxo().await.unwrap();
    println!("  Balance: {} across {} UTXOs", balance, utxos.len());
    assert!(wallet.balance_snapshot().is_fetched());

    let utxo_sum: u64 = utxos.iter().map(|u| u.amount.to_sat()).sum();
    println!("  UTXO sum: {} sats", utxo_sum);
}
