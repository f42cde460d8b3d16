use channel::{AssembledFunding, FundingInput};
use dependencies::bitcoin::{OutPoint, Transaction, TxOut, Txid, Witness};
use dependencies::parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use dependencies::secp256k1::{PublicKey, SecretKey, SECP256K1};
use wire::{Satoshi, SatoshiPerVByte};

use crate::error::WalletError;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FundingType {
    /// only the initiator puts coins into the channel
    SingleFunder,
    /// both sides put `funding_amount` each
    DualFunder,
}

/// Negotiation stage of a reservation.
///
/// `Created -> FundsPending -> FundsReceived -> SignaturesPending -> Completed`,
/// `Cancelled` is reachable from every non terminal state. `SignaturesPending`
/// means the counterparty signatures are verified and stored, but ours could
/// not be produced yet.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ReservationState {
    Created,
    FundsPending,
    FundsReceived,
    SignaturesPending,
    Completed,
    Cancelled,
}

impl Default for ReservationState {
    fn default() -> Self {
        ReservationState::Created
    }
}

/// Terms the channel is opened with, fixed for the lifetime of a reservation.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ReservationTerms {
    pub funding_type: FundingType,
    pub funding_amount: Satoshi,
    pub reserve_amount: Satoshi,
    pub min_fee_rate: SatoshiPerVByte,
}

impl ReservationTerms {
    pub fn new(
        funding_type: FundingType,
        funding_amount: Satoshi,
        reserve_amount: Satoshi,
        min_fee_rate: SatoshiPerVByte,
    ) -> Self {
        ReservationTerms {
            funding_type,
            funding_amount,
            reserve_amount,
            min_fee_rate,
        }
    }

    /// What we put into the channel.
    pub fn our_share(&self) -> Satoshi {
        self.funding_amount
    }

    /// What the counterparty has to put into the channel.
    pub fn their_share(&self) -> Satoshi {
        match self.funding_type {
            FundingType::SingleFunder => Satoshi::default(),
            FundingType::DualFunder => self.funding_amount,
        }
    }

    /// Value of the funding output, zero if it overflows.
    pub fn capacity(&self) -> Satoshi {
        self.our_share()
            .checked_add(self.their_share())
            .unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), WalletError> {
        if self.funding_amount == Satoshi::default() {
            return Err(WalletError::InvalidTerms("funding amount is zero".to_owned()));
        }
        if self.capacity() == Satoshi::default() {
            return Err(WalletError::InvalidTerms("capacity overflows".to_owned()));
        }
        if self.reserve_amount >= self.capacity() {
            return Err(WalletError::InvalidTerms(format!(
                "reserve {} is not below capacity {}",
                self.reserve_amount,
                self.capacity()
            )));
        }
        Ok(())
    }
}

/// Mutable part of a reservation, written by the coordinator only.
#[derive(Default)]
pub(crate) struct Negotiation {
    pub state: ReservationState,
    // both input lists are kept in the canonical order once the funding
    // transaction is assembled, signature lists follow the same order
    pub our_inputs: Vec<FundingInput>,
    pub our_change: Vec<TxOut>,
    pub our_multisig_key: Option<SecretKey>,
    pub their_inputs: Vec<FundingInput>,
    pub their_change: Vec<TxOut>,
    pub their_multisig_key: Option<PublicKey>,
    pub our_sigs: Vec<Witness>,
    pub their_sigs: Vec<Witness>,
    pub normalized_txid: Option<Txid>,
    pub funding: Option<AssembledFunding>,
    pub completed_funding_tx: Option<Transaction>,
}

/// One attempt to open a channel.
///
/// Accessors take the read lock only for the time of copying, they never wait
/// for the coordinator.
pub struct Reservation {
    id: u64,
    terms: ReservationTerms,
    negotiation: RwLock<Negotiation>,
}

impl Reservation {
    pub(crate) fn new(id: u64, terms: ReservationTerms) -> Self {
        Reservation {
            id,
            terms,
            negotiation: RwLock::new(Negotiation::default()),
        }
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Negotiation> {
        self.negotiation.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Negotiation> {
        self.negotiation.write()
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn terms(&self) -> ReservationTerms {
        self.terms
    }

    pub fn state(&self) -> ReservationState {
        self.read().state
    }

    pub fn our_funds(&self) -> (Vec<FundingInput>, Vec<TxOut>, Option<PublicKey>) {
        let n = self.read();
        let pk = n.our_multisig_key
            .as_ref()
            .map(|sk| PublicKey::from_secret_key(SECP256K1, sk));
        (n.our_inputs.clone(), n.our_change.clone(), pk)
    }

    pub fn their_funds(&self) -> (Vec<FundingInput>, Vec<TxOut>, Option<PublicKey>) {
        let n = self.read();
        (n.their_inputs.clone(), n.their_change.clone(), n.their_multisig_key)
    }

    pub fn our_sigs(&self) -> Vec<Witness> {
        self.read().our_sigs.clone()
    }

    pub fn their_sigs(&self) -> Vec<Witness> {
        self.read().their_sigs.clone()
    }

    /// Fully signed funding transaction, present once completed.
    pub fn final_funding_tx(&self) -> Option<Transaction> {
        self.read().completed_funding_tx.clone()
    }

    /// Unsigned funding transaction, present once both sides added funds.
    pub fn funding_tx(&self) -> Option<Transaction> {
        self.read().funding.as_ref().map(|f| f.tx.clone())
    }

    /// Txid of the funding transaction, witnesses do not change it.
    pub fn normalized_txid(&self) -> Option<Txid> {
        self.read().normalized_txid
    }

    pub fn funding_outpoint(&self) -> Option<OutPoint> {
        self.read().funding.as_ref().map(AssembledFunding::funding_outpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(funding_type: FundingType, amount: u64, reserve: u64) -> ReservationTerms {
        ReservationTerms::new(funding_type, Satoshi::from(amount), Satoshi::from(reserve), SatoshiPerVByte::from(1))
    }

    #[test]
    fn capacity_and_shares() {
        let single = terms(FundingType::SingleFunder, 100_000, 1_000);
        assert_eq!(single.capacity(), Satoshi::from(100_000));
        assert_eq!(single.their_share(), Satoshi::from(0));

        let dual = terms(FundingType::DualFunder, 100_000, 1_000);
        assert_eq!(dual.capacity(), Satoshi::from(200_000));
        assert_eq!(dual.their_share(), Satoshi::from(100_000));
    }

    #[test]
    fn terms_validation() {
        assert!(terms(FundingType::SingleFunder, 100_000, 10_000).validate().is_ok());
        assert!(terms(FundingType::DualFunder, 100_000, 150_000).validate().is_ok());

        let invalid = [
            terms(FundingType::SingleFunder, 0, 0),
            terms(FundingType::SingleFunder, 100_000, 100_000),
            terms(FundingType::DualFunder, u64::max_value(), 0),
        ];
        for t in invalid.iter() {
            match t.validate() {
                Err(WalletError::InvalidTerms(_)) => (),
                other => panic!("{:?} accepted: {:?}", t, other),
            }
        }
    }

    #[test]
    fn fresh_reservation() {
        let reservation = Reservation::new(1, terms(FundingType::SingleFunder, 100_000, 0));
        assert_eq!(reservation.state(), ReservationState::Created);
        assert!(reservation.final_funding_tx().is_none());
        assert!(reservation.funding_tx().is_none());
        assert!(reservation.normalized_txid().is_none());
        assert!(reservation.our_sigs().is_empty());
        let (inputs, change, key) = reservation.their_funds();
        assert!(inputs.is_empty() && change.is_empty() && key.is_none());
    }
}
