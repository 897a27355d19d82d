//! Gap-limit discovery of the next free address on a chain.
//!
//! Starting at the chain's cursor, up to `lookahead` consecutive addresses
//! are checked for history in ascending batches of `max_in_flight`. The
//! lowest offset without history wins. If every address in the window has
//! history, the cursor jumps past the window and the first unchecked address
//! is handed out.
//!
//! Answers are walked in offset order once a batch completes, so a failure
//! above the winner is ignored and the result does not depend on
//! `max_in_flight`.

use bitcoin::Address;
use segwallet_core::{Chain, KeyError, Scheme};
use segwallet_electrum::ChainOracle;
use tokio_util::sync::CancellationToken;

use crate::query::query_each;
use crate::wallet::HdWallet;
use crate::WalletError;

/// Outcome of a discovery run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    /// An address without history was found at `index`
    Free { address: Address, index: u32 },
    /// Every address in the window had history; `address` was not checked
    Exhausted { address: Address, index: u32 },
}

impl Discovery {
    pub fn address(&self) -> &Address {
        match self {
            Discovery::Free { address, .. } | Discovery::Exhausted { address, .. } => address,
        }
    }

    pub fn index(&self) -> u32 {
        match self {
            Discovery::Free { index, .. } | Discovery::Exhausted { index, .. } => *index,
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, Discovery::Free { .. })
    }

    pub fn into_address(self) -> Address {
        match self {
            Discovery::Free { address, .. } | Discovery::Exhausted { address, .. } => address,
        }
    }
}

fn offset_index(start: u32, offset: u32) -> Result<u32, KeyError> {
    start
        .checked_add(offset)
        .ok_or(KeyError::InvalidIndex(start as u64 + offset as u64))
}

impl<O: ChainOracle + 'static, S: Scheme> HdWallet<O, S> {
    /// Next receive address without history
    pub async fn next_free_address(&mut self) -> Result<Address, WalletError> {
        self.next_free_address_with_cancel(&CancellationToken::new())
            .await
    }

    pub async fn next_free_address_with_cancel(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Address, WalletError> {
        Ok(self.discover(Chain::External, cancel).await?.into_address())
    }

    /// Next change address without history
    pub async fn next_free_change_address(&mut self) -> Result<Address, WalletError> {
        self.next_free_change_address_with_cancel(&CancellationToken::new())
            .await
    }

    pub async fn next_free_change_address_with_cancel(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Address, WalletError> {
        Ok(self.discover(Chain::Internal, cancel).await?.into_address())
    }

    /// Scan window for `chain`: the configured default, widened to the
    /// number of addresses already known to be used.
    pub fn lookahead(&self, chain: Chain) -> u32 {
        let default = match chain {
            Chain::External => self.config.external_lookahead,
            Chain::Internal => self.config.internal_lookahead,
        };
        let used = u32::try_from(self.used.len()).unwrap_or(u32::MAX);
        default.max(used).max(1)
    }

    /// Advance the cursor of `chain` to its first address without history.
    ///
    /// The cursor is written once, after the scan completes. An oracle
    /// failure below the first free offset, or a cancellation, leaves it at
    /// its previous value.
    pub async fn discover(
        &mut self,
        chain: Chain,
        cancel: &CancellationToken,
    ) -> Result<Discovery, WalletError> {
        let start = self.cursor(chain);
        let lookahead = self.lookahead(chain);
        let max_in_flight = self.config.max_in_flight.max(1);
        let batch = u32::try_from(max_in_flight).unwrap_or(u32::MAX);
        let mut seen_used = Vec::new();

        log::debug!(
            "Discovering {} chain from index {} (lookahead {})",
            chain,
            start,
            lookahead
        );

        let mut offset = 0u32;
        while offset < lookahead {
            if cancel.is_cancelled() {
                return Err(WalletError::Cancelled);
            }

            let end = offset.saturating_add(batch).min(lookahead);
            let mut addresses = Vec::with_capacity((end - offset) as usize);
            for o in offset..end {
                addresses.push(self.cache.address_for(chain, offset_index(start, o)?)?);
            }

            let answers = query_each(
                &self.oracle,
                addresses.clone(),
                max_in_flight,
                cancel,
                |oracle, address| oracle.transactions_for_address(address),
            )
            .await?;

            for (address, (o, answer)) in addresses.into_iter().zip((offset..end).zip(answers)) {
                let index = start + o;
                let history = answer.map_err(|e| {
                    log::warn!("History query for {} index {} failed: {}", chain, index, e);
                    WalletError::from(e)
                })?;
                if history.is_empty() {
                    self.used.extend(seen_used);
                    self.set_cursor(chain, index);
                    log::debug!("Free {} address at index {}: {}", chain, index, address);
                    return Ok(Discovery::Free { address, index });
                }
                seen_used.push((chain, index));
            }

            offset = end;
        }

        let index = offset_index(start, lookahead)?;
        let address = self.cache.address_for(chain, index)?;
        self.used.extend(seen_used);
        self.set_cursor(chain, index);
        log::info!(
            "All {} {} addresses from index {} have history, moving to {}",
            lookahead,
            chain,
            start,
            index
        );
        Ok(Discovery::Exhausted { address, index })
    }
}
