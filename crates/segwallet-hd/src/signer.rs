//! Reference P2WPKH signer
//!
//! Inputs are taken in the order given until they cover the total output.
//! Change smaller than three times the fee, or below the dust limit, is
//! left to the miner.

use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{All, Message, Secp256k1};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::{
    absolute, transaction, Address, Amount, CompressedPublicKey, OutPoint, ScriptBuf, Sequence,
    Transaction, TxIn, TxOut, Witness,
};

use crate::spend::{SignerError, SigningInput, TransactionSigner};

/// Change is kept only if it is worth at least this many fees
const CHANGE_FEE_MULTIPLE: u64 = 3;

/// Signs native segwit v0 inputs with `SIGHASH_ALL`.
pub struct P2wpkhSigner {
    secp: Secp256k1<All>,
}

impl Default for P2wpkhSigner {
    fn default() -> Self {
        Self::new()
    }
}

impl P2wpkhSigner {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
        }
    }

    fn witness(
        &self,
        cache: &mut SighashCache<&Transaction>,
        idx: usize,
        input: &SigningInput,
    ) -> Result<Witness, SignerError> {
        let private_key = input
            .credential
            .to_private_key()
            .map_err(|e| SignerError::SigningError(e.to_string()))?;
        let public_key = CompressedPublicKey::from_private_key(&self.secp, &private_key)
            .map_err(|e| SignerError::SigningError(e.to_string()))?;

        let script_pubkey = ScriptBuf::new_p2wpkh(&public_key.wpubkey_hash());
        if script_pubkey != input.utxo.address.script_pubkey() {
            return Err(SignerError::SigningError(format!(
                "credential does not match {}",
                input.utxo.address
            )));
        }

        let sighash = cache
            .p2wpkh_signature_hash(
                idx,
                &script_pubkey,
                input.utxo.amount,
                EcdsaSighashType::All,
            )
            .map_err(|e| SignerError::SigningError(e.to_string()))?;

        let msg = Message::from_digest(sighash.to_byte_array());
        let sig = self.secp.sign_ecdsa(&msg, &private_key.inner);

        // P2WPKH witness: [signature + sighash_type, pubkey]
        let mut sig_bytes = sig.serialize_der().to_vec();
        sig_bytes.push(EcdsaSighashType::All as u8);

        Ok(Witness::from_slice(&[
            sig_bytes,
            public_key.to_bytes().to_vec(),
        ]))
    }
}

impl TransactionSigner for P2wpkhSigner {
    fn build_signed_transaction(
        &self,
        inputs: &[SigningInput],
        destination: &Address,
        total_output: Amount,
        fee: Amount,
        change: &Address,
    ) -> Result<Vec<u8>, SignerError> {
        let mut selected = Vec::new();
        let mut available = Amount::ZERO;
        for input in inputs {
            if available >= total_output {
                break;
            }
            available = available
                .checked_add(input.utxo.amount)
                .ok_or_else(|| SignerError::SigningError("input sum overflows".to_string()))?;
            selected.push(input);
        }
        if available < total_output || selected.is_empty() {
            return Err(SignerError::InsufficientFunds {
                needed: total_output,
                available,
            });
        }

        let send = total_output
            .checked_sub(fee)
            .ok_or_else(|| SignerError::SigningError("fee exceeds total output".to_string()))?;
        let destination_script = destination.script_pubkey();
        if send < destination_script.minimal_non_dust() {
            return Err(SignerError::DustOutput(send));
        }

        let mut output = vec![TxOut {
            value: send,
            script_pubkey: destination_script,
        }];

        let leftover = available - total_output;
        let change_script = change.script_pubkey();
        let keep_change = fee
            .checked_mul(CHANGE_FEE_MULTIPLE)
            .is_some_and(|min| leftover >= min)
            && leftover >= change_script.minimal_non_dust();
        if keep_change {
            output.push(TxOut {
                value: leftover,
                script_pubkey: change_script,
            });
        } else if leftover > Amount::ZERO {
            log::debug!("Folding {} of change into the fee", leftover);
        }

        let mut tx = Transaction {
            version: transaction::Version::ONE,
            lock_time: absolute::LockTime::ZERO,
            input: selected
                .iter()
                .map(|i| TxIn {
                    previous_output: OutPoint {
                        txid: i.utxo.txid,
                        vout: i.utxo.vout,
                    },
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::MAX,
                    witness: Witness::new(),
                })
                .collect(),
            output,
        };

        let witnesses = {
            let mut cache = SighashCache::new(&tx);
            selected
                .iter()
                .enumerate()
                .map(|(idx, input)| self.witness(&mut cache, idx, input))
                .collect::<Result<Vec<_>, _>>()?
        };
        for (txin, witness) in tx.input.iter_mut().zip(witnesses) {
            txin.witness = witness;
        }

        log::debug!(
            "Signed {} ({} inputs, {} outputs)",
            tx.compute_txid(),
            tx.input.len(),
            tx.output.len()
        );
        Ok(bitcoin::consensus::serialize(&tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiscoveryConfig;
    use crate::wallet::HdWallet;
    use bitcoin::Network;
    use segwallet_core::Chain;
    use segwallet_electrum::test_utils::{test_txid, StubOracle};
    use segwallet_electrum::AddressUtxo;
    use std::sync::Arc;

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn wallet() -> HdWallet<StubOracle> {
        HdWallet::from_mnemonic(
            ABANDON,
            Network::Bitcoin,
            Arc::new(StubOracle::new()),
            DiscoveryConfig::default(),
        )
        .unwrap()
    }

    fn input(w: &HdWallet<StubOracle>, index: u32, sats: u64) -> SigningInput {
        let address = w.address_for(Chain::External, index).unwrap();
        SigningInput {
            utxo: AddressUtxo {
                txid: test_txid(index as u8 + 1),
                vout: 0,
                amount: Amount::from_sat(sats),
                confirmations: 1,
                address,
            },
            credential: w.signing_credential_for_address(Chain::External, index).unwrap(),
        }
    }

    fn sign(inputs: &[SigningInput], amount: u64, fee: u64) -> Result<Transaction, SignerError> {
        let w = wallet();
        let destination = w.address_for(Chain::External, 5).unwrap();
        let change = w.address_for(Chain::Internal, 0).unwrap();
        let raw = P2wpkhSigner::new().build_signed_transaction(
            inputs,
            &destination,
            Amount::from_sat(amount + fee),
            Amount::from_sat(fee),
            &change,
        )?;
        Ok(bitcoin::consensus::deserialize(&raw).unwrap())
    }

    #[test]
    fn test_change_output_kept() {
        let w = wallet();
        let tx = sign(&[input(&w, 0, 100_000)], 50_000, 1_000).unwrap();

        assert_eq!(tx.version, transaction::Version::ONE);
        assert_eq!(tx.lock_time, absolute::LockTime::ZERO);
        assert_eq!(tx.input.len(), 1);
        assert_eq!(tx.input[0].sequence, Sequence::MAX);
        assert_eq!(tx.output.len(), 2);
        assert_eq!(tx.output[0].value, Amount::from_sat(50_000));
        assert_eq!(tx.output[1].value, Amount::from_sat(49_000));
        assert_eq!(
            tx.output[1].script_pubkey,
            w.address_for(Chain::Internal, 0).unwrap().script_pubkey()
        );
    }

    #[test]
    fn test_small_change_folded_into_fee() {
        let w = wallet();
        // 1_000 left over is less than 3x the fee
        let tx = sign(&[input(&w, 0, 52_000)], 50_000, 1_000).unwrap();
        assert_eq!(tx.output.len(), 1);
        assert_eq!(tx.output[0].value, Amount::from_sat(50_000));
    }

    #[test]
    fn test_inputs_selected_in_order() {
        let w = wallet();
        let inputs = [input(&w, 0, 60_000), input(&w, 1, 60_000)];
        let tx = sign(&inputs, 50_000, 1_000).unwrap();
        assert_eq!(tx.input.len(), 1);
        assert_eq!(tx.input[0].previous_output.txid, test_txid(1));
    }

    #[test]
    fn test_witness_shape() {
        let w = wallet();
        let tx = sign(&[input(&w, 0, 100_000), input(&w, 1, 1_000)], 99_500, 1_000).unwrap();
        assert_eq!(tx.input.len(), 2);
        for txin in &tx.input {
            assert!(txin.script_sig.is_empty());
            assert_eq!(txin.witness.len(), 2);
            let sig = txin.witness.nth(0).unwrap();
            assert_eq!(*sig.last().unwrap(), EcdsaSighashType::All as u8);
            assert_eq!(txin.witness.nth(1).unwrap().len(), 33);
        }
    }

    #[test]
    fn test_signature_verifies() {
        let w = wallet();
        let signing = input(&w, 0, 100_000);
        let tx = sign(std::slice::from_ref(&signing), 50_000, 1_000).unwrap();

        let secp = Secp256k1::new();
        let sk = signing.credential.to_private_key().unwrap();
        let pk = CompressedPublicKey::from_private_key(&secp, &sk).unwrap();
        let sighash = SighashCache::new(&tx)
            .p2wpkh_signature_hash(
                0,
                &signing.utxo.address.script_pubkey(),
                signing.utxo.amount,
                EcdsaSighashType::All,
            )
            .unwrap();
        let msg = Message::from_digest(sighash.to_byte_array());
        let der = tx.input[0].witness.nth(0).unwrap();
        let sig =
            bitcoin::secp256k1::ecdsa::Signature::from_der(&der[..der.len() - 1]).unwrap();
        assert!(secp.verify_ecdsa(&msg, &sig, &pk.0).is_ok());
    }

    #[test]
    fn test_insufficient_funds() {
        let w = wallet();
        let result = sign(&[input(&w, 0, 10_000)], 50_000, 1_000);
        assert!(matches!(
            result,
            Err(SignerError::InsufficientFunds { needed, available })
                if needed == Amount::from_sat(51_000) && available == Amount::from_sat(10_000)
        ));
    }

    #[test]
    fn test_no_inputs() {
        assert!(matches!(
            sign(&[], 0, 0),
            Err(SignerError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn test_dust_destination() {
        let w = wallet();
        let result = sign(&[input(&w, 0, 10_000)], 100, 1_000);
        assert!(matches!(result, Err(SignerError::DustOutput(_))));
    }

    #[test]
    fn test_credential_address_mismatch() {
        let w = wallet();
        let mut wrong = input(&w, 0, 100_000);
        wrong.credential = w.signing_credential_for_address(Chain::External, 1).unwrap();
        assert!(matches!(
            sign(&[wrong], 50_000, 1_000),
            Err(SignerError::SigningError(_))
        ));
    }
}
