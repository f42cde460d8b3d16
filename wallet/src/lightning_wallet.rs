use std::ops::Deref;
use std::sync::Arc;

use channel::FundingInput;
use dependencies::bitcoin::{TxOut, Witness};
use dependencies::secp256k1::PublicKey;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use wire::{Satoshi, SatoshiPerVByte};

use crate::coordinator::{Command, Coordinator, Reply};
use crate::error::WalletError;
use crate::reservation::{FundingType, Reservation, ReservationState, ReservationTerms};

/// Handle to the funding coordinator. Cheap to clone, every clone talks to
/// the same coordinator task, which stops once all handles are dropped.
#[derive(Clone)]
pub struct LightningWallet {
    commands: mpsc::UnboundedSender<Command>,
}

impl LightningWallet {
    /// Spawns the coordinator on the current tokio runtime.
    pub fn spawn(coordinator: Coordinator) -> (Self, JoinHandle<()>) {
        let (commands, receiver) = mpsc::unbounded_channel();
        let handle = tokio::spawn(coordinator.run(receiver));
        (LightningWallet { commands }, handle)
    }

    async fn request<T, F>(&self, command: F) -> Result<T, WalletError>
    where
        F: FnOnce(Reply<T>) -> Command,
    {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| WalletError::WalletShutdown)?;
        response.await.map_err(|_| WalletError::WalletShutdown)?
    }

    /// Selects our coins and a multisig key for a new channel and registers
    /// the reservation.
    pub async fn init_funding_reserve(
        &self,
        funding_type: FundingType,
        funding_amount: Satoshi,
        reserve_amount: Satoshi,
        min_fee_rate: SatoshiPerVByte,
    ) -> Result<ChannelReservation, WalletError> {
        let terms = ReservationTerms::new(funding_type, funding_amount, reserve_amount, min_fee_rate);
        let reservation = self
            .request(|reply| Command::InitFundingReserve { terms, reply })
            .await?;
        Ok(ChannelReservation {
            reservation,
            wallet: self.clone(),
        })
    }

    pub async fn add_counterparty_funds(
        &self,
        id: u64,
        inputs: Vec<FundingInput>,
        change: Vec<TxOut>,
        multisig_key: PublicKey,
    ) -> Result<(), WalletError> {
        self.request(|reply| Command::AddCounterpartyFunds {
            id,
            inputs,
            change,
            multisig_key,
            reply,
        }).await
    }

    /// Returns `Completed` when the funding transaction is fully signed and
    /// handed to the broadcaster, `SignaturesPending` when our own signatures
    /// are still missing.
    pub async fn add_counterparty_sigs(&self, id: u64, sigs: Vec<Witness>) -> Result<ReservationState, WalletError> {
        self.request(|reply| Command::AddCounterpartySignatures { id, sigs, reply }).await
    }

    /// Succeeds for unknown and already finished reservations as well.
    pub async fn cancel_reservation(&self, id: u64) -> Result<(), WalletError> {
        self.request(|reply| Command::Cancel { id, reply }).await
    }
}

/// Reservation as seen by the code negotiating with the peer: read
/// accessors of [`Reservation`] plus the commands bound to its id.
pub struct ChannelReservation {
    reservation: Arc<Reservation>,
    wallet: LightningWallet,
}

impl ChannelReservation {
    pub async fn add_funds(
        &self,
        inputs: Vec<FundingInput>,
        change: Vec<TxOut>,
        multisig_key: PublicKey,
    ) -> Result<(), WalletError> {
        self.wallet
            .add_counterparty_funds(self.reservation.id(), inputs, change, multisig_key)
            .await
    }

    pub async fn complete_reservation(&self, sigs: Vec<Witness>) -> Result<ReservationState, WalletError> {
        self.wallet.add_counterparty_sigs(self.reservation.id(), sigs).await
    }

    pub async fn cancel(&self) -> Result<(), WalletError> {
        self.wallet.cancel_reservation(self.reservation.id()).await
    }
}

impl Deref for ChannelReservation {
    type Target = Reservation;

    fn deref(&self) -> &Self::Target {
        &self.reservation
    }
}
