//! Spend preparation
//!
//! Attaches a signing credential to every input, picks the change address
//! and hands the rest to a [`TransactionSigner`].

use bitcoin::{Address, Amount};
use segwallet_core::keys::signing_credential_for_address;
use segwallet_core::{Chain, Credential, Scheme};
use segwallet_electrum::AddressUtxo;
use thiserror::Error;

use crate::wallet::HdWallet;
use crate::WalletError;

/// Errors raised while assembling and signing a transaction
#[derive(Error, Debug)]
pub enum SignerError {
    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Amount, available: Amount },

    #[error("Output of {0} is below the dust limit")]
    DustOutput(Amount),

    #[error("Signing failed: {0}")]
    SigningError(String),
}

/// An unspent output together with the key that can spend it
#[derive(Debug)]
pub struct SigningInput {
    pub utxo: AddressUtxo,
    pub credential: Credential,
}

/// Builds and signs a transaction from prepared inputs.
pub trait TransactionSigner {
    /// Pay `total_output - fee` to `destination`, sending any leftover to
    /// `change`. Returns the consensus-serialized signed transaction.
    fn build_signed_transaction(
        &self,
        inputs: &[SigningInput],
        destination: &Address,
        total_output: Amount,
        fee: Amount,
        change: &Address,
    ) -> Result<Vec<u8>, SignerError>;
}

impl<O, S: Scheme> HdWallet<O, S> {
    /// Prepare `utxos` for spending `amount` to `destination` and sign.
    ///
    /// Change goes to the internal address at the current change cursor;
    /// it is not rescanned here.
    pub fn create_transaction<T: TransactionSigner + ?Sized>(
        &self,
        utxos: &[AddressUtxo],
        amount: Amount,
        fee: Amount,
        destination: &Address,
        signer: &T,
    ) -> Result<Vec<u8>, WalletError> {
        let positions = utxos
            .iter()
            .map(|u| {
                self.lookup(&u.address)
                    .ok_or_else(|| WalletError::UnknownAddress(u.address.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let master = self.master_key()?;
        let inputs = utxos
            .iter()
            .zip(positions)
            .map(|(utxo, (chain, index))| {
                Ok(SigningInput {
                    utxo: utxo.clone(),
                    credential: signing_credential_for_address::<S>(&master, chain, index)?,
                })
            })
            .collect::<Result<Vec<_>, WalletError>>()?;

        let total_output = amount
            .checked_add(fee)
            .ok_or(WalletError::AmountOverflow)?;
        let change = self.address_for(Chain::Internal, self.next_free_change_address_index)?;

        log::debug!(
            "Signing {} inputs paying {} (fee {}) to {}",
            inputs.len(),
            amount,
            fee,
            destination
        );
        Ok(signer.build_signed_transaction(&inputs, destination, total_output, fee, &change)?)
    }
}
