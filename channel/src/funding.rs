use std::collections::HashSet;

use dependencies::bitcoin::{
    EcdsaSighashType, OutPoint, PackedLockTime, Script, Sequence, Transaction, TxIn, TxOut,
    Witness,
};
use dependencies::bitcoin::util::sighash::SighashCache;
use dependencies::bitcoin_hashes::Hash;
use dependencies::secp256k1::{
    ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey, Signing, Verification,
};
use thiserror::Error;

use crate::bip69::reorder_tx;
use crate::tools::{new_2x2_multisig, p2wpkh_script_code, v0_p2wpkh};

// Virtual sizes used to charge each side for its part of the funding
// transaction. Inputs are assumed to spend p2wpkh outputs.
pub const INPUT_VSIZE: u64 = 68;
pub const CHANGE_OUTPUT_VSIZE: u64 = 31;
pub const FUNDING_OUTPUT_VSIZE: u64 = 43;
pub const TX_OVERHEAD_VSIZE: u64 = 11;

pub fn contribution_vsize(inputs: usize, change_outputs: usize) -> u64 {
    (inputs as u64) * INPUT_VSIZE + (change_outputs as u64) * CHANGE_OUTPUT_VSIZE
}

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum FundingError {
    #[error("funding transaction has no inputs")]
    NoInputs,
    #[error("channel capacity must be positive")]
    ZeroCapacity,
    #[error("outpoint {0} is spent more than once")]
    DuplicateInput(OutPoint),
    #[error("input {0} is out of range")]
    InputOutOfRange(usize),
    #[error("input {0} does not spend a p2wpkh output")]
    NotP2wpkh(usize),
    #[error("expected {expected} witnesses, got {actual}")]
    WitnessCount { expected: usize, actual: usize },
    #[error("failed to compute sighash: {0}")]
    Sighash(String),
}

/// Coin offered by one side of the channel. Carries the output being spent,
/// its value and script are needed both for the sighash and for checking
/// that a side contributes what it promised.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct FundingInput {
    pub previous_output: OutPoint,
    pub prev_out: TxOut,
}

impl FundingInput {
    pub fn new(previous_output: OutPoint, prev_out: TxOut) -> Self {
        FundingInput {
            previous_output,
            prev_out,
        }
    }

    pub fn value(&self) -> u64 {
        self.prev_out.value
    }

    pub fn to_txin(&self) -> TxIn {
        TxIn {
            previous_output: self.previous_output,
            script_sig: Script::new(),
            sequence: Sequence(0xFFFFFFFF),
            witness: Witness::new(),
        }
    }
}

/// Both contributions to a channel funding transaction.
#[derive(Debug, Clone)]
pub struct FundingTx {
    pub capacity: u64,
    pub local_funding_pubkey: PublicKey,
    pub remote_funding_pubkey: PublicKey,
    pub local_inputs: Vec<FundingInput>,
    pub local_change: Vec<TxOut>,
    pub remote_inputs: Vec<FundingInput>,
    pub remote_change: Vec<TxOut>,
}

/// Unsigned funding transaction in BIP-69 order.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AssembledFunding {
    pub tx: Transaction,
    /// spent outputs, aligned with `tx.input`
    pub prev_outs: Vec<TxOut>,
    /// canonical indexes of our inputs, ascending
    pub local_input_positions: Vec<usize>,
    /// canonical indexes of their inputs, ascending
    pub remote_input_positions: Vec<usize>,
    pub funding_output_index: u32,
}

impl FundingTx {
    pub fn witness_script(&self) -> Script {
        new_2x2_multisig(
            &self.local_funding_pubkey.serialize(),
            &self.remote_funding_pubkey.serialize(),
        )
    }

    pub fn lock_script(&self) -> Script {
        self.witness_script().to_v0_p2wsh()
    }

    pub fn assemble(&self) -> Result<AssembledFunding, FundingError> {
        if self.capacity == 0 {
            return Err(FundingError::ZeroCapacity);
        }

        let inputs = self.local_inputs.iter()
            .chain(self.remote_inputs.iter())
            .collect::<Vec<_>>();
        if inputs.is_empty() {
            return Err(FundingError::NoInputs);
        }

        let mut seen = HashSet::new();
        for input in inputs.iter() {
            if !seen.insert(input.previous_output) {
                return Err(FundingError::DuplicateInput(input.previous_output));
            }
        }

        let funding_output = TxOut {
            value: self.capacity,
            script_pubkey: self.lock_script(),
        };
        let output = Some(funding_output).into_iter()
            .chain(self.local_change.iter().cloned())
            .chain(self.remote_change.iter().cloned())
            .collect();

        let mut tx = Transaction {
            version: 2,
            lock_time: PackedLockTime(0),
            input: inputs.iter().map(|i| i.to_txin()).collect(),
            output: output,
        };
        let reordering = reorder_tx(&mut tx);

        let prev_outs = reordering.inputs.iter()
            .map(|&i| inputs[i as usize].prev_out.clone())
            .collect();

        let local_count = self.local_inputs.len();
        let mut local_input_positions = Vec::with_capacity(local_count);
        let mut remote_input_positions = Vec::with_capacity(self.remote_inputs.len());
        for (position, &original) in reordering.inputs.iter().enumerate() {
            if (original as usize) < local_count {
                local_input_positions.push(position);
            } else {
                remote_input_positions.push(position);
            }
        }

        let funding_output_index = reordering.new_output_position(0)
            .unwrap_or_default() as u32;

        Ok(AssembledFunding {
            tx,
            prev_outs,
            local_input_positions,
            remote_input_positions,
            funding_output_index,
        })
    }
}

impl AssembledFunding {
    pub fn funding_outpoint(&self) -> OutPoint {
        OutPoint {
            txid: self.tx.txid(),
            vout: self.funding_output_index,
        }
    }

    /// Fully signed transaction. Witnesses of each side follow the order of
    /// that side's inputs in the canonical ordering.
    pub fn signed(&self, local: &[Witness], remote: &[Witness]) -> Result<Transaction, FundingError> {
        let check = |positions: &[usize], witnesses: &[Witness]| {
            if positions.len() != witnesses.len() {
                return Err(FundingError::WitnessCount {
                    expected: positions.len(),
                    actual: witnesses.len(),
                });
            }
            Ok(())
        };
        check(&self.local_input_positions, local)?;
        check(&self.remote_input_positions, remote)?;

        let mut tx = self.tx.clone();
        let placed = self.local_input_positions.iter().zip(local.iter())
            .chain(self.remote_input_positions.iter().zip(remote.iter()));
        for (&position, witness) in placed {
            tx.input[position].witness = witness.clone();
        }
        Ok(tx)
    }
}

fn p2wpkh_sighash(tx: &Transaction, index: usize, prev_out: &TxOut) -> Result<Message, FundingError> {
    if index >= tx.input.len() {
        return Err(FundingError::InputOutOfRange(index));
    }
    let script_code = p2wpkh_script_code(&prev_out.script_pubkey)
        .ok_or(FundingError::NotP2wpkh(index))?;
    let sighash = SighashCache::new(tx)
        .segwit_signature_hash(index, &script_code, prev_out.value, EcdsaSighashType::All)
        .map_err(|e| FundingError::Sighash(e.to_string()))?;
    Message::from_slice(&sighash.into_inner()[..])
        .map_err(|e| FundingError::Sighash(e.to_string()))
}

/// Signs input `index` of `tx` which spends the p2wpkh output `prev_out`,
/// returns the witness `[<signature> <pubkey>]`.
pub fn sign_p2wpkh_input<C: Signing>(
    secp: &Secp256k1<C>,
    tx: &Transaction,
    index: usize,
    prev_out: &TxOut,
    key: &SecretKey,
) -> Result<Witness, FundingError> {
    let msg = p2wpkh_sighash(tx, index, prev_out)?;
    let pk = PublicKey::from_secret_key(secp, key);
    if v0_p2wpkh(&pk) != prev_out.script_pubkey {
        return Err(FundingError::NotP2wpkh(index));
    }

    let mut sig = secp.sign_ecdsa(&msg, key).serialize_der().to_vec();
    sig.push(EcdsaSighashType::All.to_u32() as u8);
    Ok(Witness::from_vec(vec![sig, pk.serialize().to_vec()]))
}

pub fn verify_p2wpkh_input<C: Verification>(
    secp: &Secp256k1<C>,
    tx: &Transaction,
    index: usize,
    prev_out: &TxOut,
    witness: &Witness,
) -> bool {
    let items = witness.to_vec();
    if items.len() != 2 {
        return false;
    }
    let (sig, pk) = (&items[0], &items[1]);

    let pk = match PublicKey::from_slice(pk) {
        Ok(pk) => pk,
        Err(_) => return false,
    };
    if v0_p2wpkh(&pk) != prev_out.script_pubkey {
        return false;
    }

    match sig.split_last() {
        Some((&ty, der)) if ty as u32 == EcdsaSighashType::All.to_u32() => {
            let sig = match Signature::from_der(der) {
                Ok(sig) => sig,
                Err(_) => return false,
            };
            match p2wpkh_sighash(tx, index, prev_out) {
                Ok(msg) => secp.verify_ecdsa(&msg, &sig, &pk).is_ok(),
                Err(_) => false,
            }
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{s2txid, new_2x2_wsh_lock_script};
    use dependencies::secp256k1::{Secp256k1, SecretKey, PublicKey};

    fn key(b: u8) -> SecretKey {
        SecretKey::from_slice(&[b; 32]).unwrap()
    }

    fn pubkey(b: u8) -> PublicKey {
        PublicKey::from_secret_key(&Secp256k1::new(), &key(b))
    }

    fn input(txid: &str, vout: u32, value: u64, owner: u8) -> FundingInput {
        FundingInput::new(
            OutPoint { txid: s2txid(txid), vout: vout },
            TxOut { value: value, script_pubkey: v0_p2wpkh(&pubkey(owner)) },
        )
    }

    const TXID_A: &str = "0e53ec5dfb2cb8a71fec32dc9a634a35b7e24799295ddd5278217822e0b31f57";
    const TXID_B: &str = "7a1de137cbafb5c70405455c49c5104ca3057a1f1243e6563bb9245c9c88c191";
    const TXID_C: &str = "f320832a9d2e2452af63154bc687493484a0e7745ebd3aaf9ca19eb80834ad60";

    fn funding() -> FundingTx {
        FundingTx {
            capacity: 200_000,
            local_funding_pubkey: pubkey(10),
            remote_funding_pubkey: pubkey(20),
            local_inputs: vec![
                input(TXID_C, 0, 80_000, 1),
                input(TXID_A, 1, 50_000, 1),
            ],
            local_change: vec![TxOut { value: 29_000, script_pubkey: v0_p2wpkh(&pubkey(2)) }],
            remote_inputs: vec![input(TXID_B, 0, 120_000, 3)],
            remote_change: vec![TxOut { value: 19_500, script_pubkey: v0_p2wpkh(&pubkey(4)) }],
        }
    }

    #[test]
    fn contribution_size() {
        assert_eq!(contribution_vsize(1, 1), 99);
        assert_eq!(contribution_vsize(2, 0), 136);
        assert_eq!(contribution_vsize(0, 0), 0);
    }

    #[test]
    fn assemble_orders_inputs_and_outputs() {
        let funding = funding();
        let assembled = funding.assemble().unwrap();
        let tx = &assembled.tx;

        let prev = tx.input.iter().map(|i| i.previous_output.txid).collect::<Vec<_>>();
        assert_eq!(prev, vec![s2txid(TXID_A), s2txid(TXID_B), s2txid(TXID_C)]);
        assert_eq!(assembled.local_input_positions, vec![0, 2]);
        assert_eq!(assembled.remote_input_positions, vec![1]);
        assert_eq!(assembled.prev_outs[0].value, 50_000);
        assert_eq!(assembled.prev_outs[1].value, 120_000);

        let values = tx.output.iter().map(|o| o.value).collect::<Vec<_>>();
        assert_eq!(values, vec![19_500, 29_000, 200_000]);
        assert_eq!(assembled.funding_output_index, 2);

        let funding_output = &tx.output[2];
        let lock_script = new_2x2_wsh_lock_script(&pubkey(10).serialize(), &pubkey(20).serialize());
        assert_eq!(funding_output.script_pubkey, lock_script);
        assert_eq!(assembled.funding_outpoint(), OutPoint { txid: tx.txid(), vout: 2 });
        assert!(tx.input.iter().all(|i| i.witness.is_empty()));
    }

    #[test]
    fn assemble_is_deterministic() {
        let mut swapped = funding();
        swapped.local_inputs.reverse();
        assert_eq!(swapped.assemble().unwrap().tx.txid(), funding().assemble().unwrap().tx.txid());
    }

    #[test]
    fn assemble_rejects_double_spend() {
        let mut funding = funding();
        funding.remote_inputs.push(input(TXID_A, 1, 50_000, 3));
        assert_eq!(
            funding.assemble(),
            Err(FundingError::DuplicateInput(OutPoint { txid: s2txid(TXID_A), vout: 1 }))
        );
    }

    #[test]
    fn assemble_rejects_empty() {
        let mut funding = funding();
        funding.local_inputs.clear();
        funding.remote_inputs.clear();
        assert_eq!(funding.assemble(), Err(FundingError::NoInputs));

        let mut funding = self::funding();
        funding.capacity = 0;
        assert_eq!(funding.assemble(), Err(FundingError::ZeroCapacity));
    }

    #[test]
    fn sign_and_verify() {
        let secp = Secp256k1::new();
        let assembled = funding().assemble().unwrap();
        let tx = &assembled.tx;

        let witness = sign_p2wpkh_input(&secp, tx, 1, &assembled.prev_outs[1], &key(3)).unwrap();
        assert_eq!(witness.len(), 2);
        assert!(verify_p2wpkh_input(&secp, tx, 1, &assembled.prev_outs[1], &witness));

        // same witness does not fit another input
        assert!(!verify_p2wpkh_input(&secp, tx, 0, &assembled.prev_outs[0], &witness));

        // amount is committed to by the sighash
        let mut prev_out = assembled.prev_outs[1].clone();
        prev_out.value += 1;
        assert!(!verify_p2wpkh_input(&secp, tx, 1, &prev_out, &witness));

        // and so are the outputs
        let mut tampered = tx.clone();
        tampered.output[0].value -= 1;
        assert!(!verify_p2wpkh_input(&secp, &tampered, 1, &assembled.prev_outs[1], &witness));

        assert!(!verify_p2wpkh_input(&secp, tx, 1, &assembled.prev_outs[1], &Witness::new()));
    }

    #[test]
    fn sign_with_wrong_key() {
        let secp = Secp256k1::new();
        let assembled = funding().assemble().unwrap();
        assert_eq!(
            sign_p2wpkh_input(&secp, &assembled.tx, 1, &assembled.prev_outs[1], &key(1)),
            Err(FundingError::NotP2wpkh(1))
        );
        assert_eq!(
            sign_p2wpkh_input(&secp, &assembled.tx, 7, &assembled.prev_outs[1], &key(3)),
            Err(FundingError::InputOutOfRange(7))
        );
    }

    #[test]
    fn signed_places_witnesses() {
        let secp = Secp256k1::new();
        let assembled = funding().assemble().unwrap();
        let sign = |i: usize, k: u8| {
            sign_p2wpkh_input(&secp, &assembled.tx, i, &assembled.prev_outs[i], &key(k)).unwrap()
        };
        let local = vec![sign(0, 1), sign(2, 1)];
        let remote = vec![sign(1, 3)];

        assert_eq!(
            assembled.signed(&local, &[]),
            Err(FundingError::WitnessCount { expected: 1, actual: 0 })
        );

        let tx = assembled.signed(&local, &remote).unwrap();
        assert_eq!(tx.txid(), assembled.tx.txid());
        assert_eq!(tx.input[1].witness, remote[0]);
        for (i, input) in tx.input.iter().enumerate() {
            assert!(verify_p2wpkh_input(&secp, &tx, i, &assembled.prev_outs[i], &input.witness));
        }
    }
}
