//! Discover the next free receive and change address of a wallet and print
//! its balance.
//!
//! # Usage
//!
//! ```bash
//! SEGWALLET_MNEMONIC="abandon ... about" cargo run --example discover -- --config segwallet.toml
//! cargo run --example discover -- --zpub zpub6rFR7y4Q2AijBEqTUqu...
//! ```
//!
//! Ctrl-C cancels a running scan.

use anyhow::{Context, Result};
use segwallet_electrum::ElectrumClient;
use segwallet_hd::{CancellationToken, HdWallet, WalletConfig};
use std::path::PathBuf;
use std::sync::Arc;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut zpub: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                let path = args.get(i).context("--config requires a path argument")?;
                config_path = Some(PathBuf::from(path));
            }
            "--zpub" => {
                i += 1;
                zpub = Some(args.get(i).context("--zpub requires a key")?.clone());
            }
            other => anyhow::bail!("Unknown argument: {}", other),
        }
        i += 1;
    }

    let mut config = match config_path {
        Some(path) => WalletConfig::from_file(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => WalletConfig::default(),
    };
    config.apply_env_overrides();
    config
        .validate()
        .context("Configuration validation failed")?;

    std::env::set_var("RUST_LOG", &config.logging.log_level);
    env_logger::init();

    let network = config.network();
    let client = Arc::new(ElectrumClient::new(&config.bitcoin.electrum_url, network)?);

    let mut wallet: HdWallet<ElectrumClient> = match zpub {
        Some(key) => HdWallet::watch_only(&key, network, client, config.discovery.clone())?,
        None => {
            let phrase = std::env::var("SEGWALLET_MNEMONIC")
                .context("Set SEGWALLET_MNEMONIC or pass --zpub")?;
            HdWallet::from_mnemonic(&phrase, network, client, config.discovery.clone())?
        }
    };

    println!("Account key: {}", wallet.account_key());

    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let cancel = CancellationToken::new();

    rt.block_on(async {
        let trigger = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("Received shutdown signal, cancelling scan");
                trigger.cancel();
            }
        });

        let receive = wallet.next_free_address_with_cancel(&cancel).await?;
        println!(
            "Receive: {} (index {})",
            receive,
            wallet.next_free_address_index()
        );

        let change = wallet.next_free_change_address_with_cancel(&cancel).await?;
        println!(
            "Change:  {} (index {})",
            change,
            wallet.next_free_change_address_index()
        );

        let balance = wallet.fetch_balance().await?;
        println!("Balance: {}", balance);
        Ok::<_, anyhow::Error>(())
    })
}
