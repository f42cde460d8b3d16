use channel::funding::verify_p2wpkh_input;
use channel::{FundingError, FundingInput};
use dependencies::bitcoin::util::bip32;
use dependencies::bitcoin::{Script, Transaction, TxOut, Witness};
use dependencies::secp256k1::{SecretKey, SECP256K1};
use thiserror::Error;
use wire::{Satoshi, SatoshiPerVByte};

/// Coins chosen to fund our share of a channel.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct SelectedCoins {
    pub inputs: Vec<FundingInput>,
    pub change: Vec<TxOut>,
}

impl SelectedCoins {
    pub fn total_in(&self) -> Satoshi {
        Satoshi::from(self.inputs.iter().map(FundingInput::value).sum::<u64>())
    }

    pub fn total_change(&self) -> Satoshi {
        Satoshi::from(self.change.iter().map(|o| o.value).sum::<u64>())
    }
}

#[derive(Debug, Error)]
pub enum FundsError {
    #[error("not enough coins: {available} available, {needed} needed")]
    NotEnoughCoins { available: Satoshi, needed: Satoshi },
    #[error("key derivation failed: {0}")]
    KeyDerivation(#[from] bip32::Error),
}

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("no key for script {0}")]
    UnknownScript(Script),
    #[error(transparent)]
    Funding(#[from] FundingError),
}

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("transaction rejected: {0}")]
    Rejected(String),
}

/// Coin control and key generation of the wallet.
pub trait FundsSource: Send {
    /// Selects and locks coins worth at least `amount` plus the fee of our
    /// part of the funding transaction at `fee_rate`.
    fn select_coins(&mut self, amount: Satoshi, fee_rate: SatoshiPerVByte) -> Result<SelectedCoins, FundsError>;

    /// Fresh key for the 2-of-2 funding output.
    fn new_multisig_key(&mut self) -> Result<SecretKey, FundsError>;

    /// Unlocks coins of an abandoned reservation.
    fn release(&mut self, inputs: &[FundingInput]);
}

pub trait Signer: Send {
    fn sign_input(&self, tx: &Transaction, index: usize, prev_out: &TxOut) -> Result<Witness, SignerError>;

    fn verify_input(&self, tx: &Transaction, index: usize, prev_out: &TxOut, witness: &Witness) -> bool {
        verify_p2wpkh_input(SECP256K1, tx, index, prev_out, witness)
    }
}

pub trait Broadcaster: Send {
    fn publish(&self, tx: &Transaction) -> Result<(), BroadcastError>;
}
