use std::cmp;
use std::collections::HashSet;
use std::sync::Arc;

use channel::{AssembledFunding, FundingInput, FundingTx};
use channel::funding::contribution_vsize;
use dependencies::bitcoin::{Transaction, TxOut, Witness};
use dependencies::secp256k1::{PublicKey, SECP256K1};
use dependencies::tracing::{debug, info, warn};
use tokio::sync::{mpsc, oneshot};
use wire::Satoshi;

use crate::config::WalletConfig;
use crate::error::WalletError;
use crate::fee_estimator::FeeEstimator;
use crate::interface::{Broadcaster, FundsSource, Signer, SignerError};
use crate::registry::ReservationRegistry;
use crate::reservation::{Reservation, ReservationState, ReservationTerms};

pub(crate) type Reply<T> = oneshot::Sender<Result<T, WalletError>>;

/// Request to the coordinator. Each carries the channel its answer goes to.
pub(crate) enum Command {
    InitFundingReserve {
        terms: ReservationTerms,
        reply: Reply<Arc<Reservation>>,
    },
    AddCounterpartyFunds {
        id: u64,
        inputs: Vec<FundingInput>,
        change: Vec<TxOut>,
        multisig_key: PublicKey,
        reply: Reply<()>,
    },
    AddCounterpartySignatures {
        id: u64,
        sigs: Vec<Witness>,
        reply: Reply<ReservationState>,
    },
    Cancel {
        id: u64,
        reply: Reply<()>,
    },
}

/// The only writer of reservations. Processes commands one at a time in the
/// order they arrive.
pub struct Coordinator {
    config: WalletConfig,
    registry: ReservationRegistry,
    funds: Box<dyn FundsSource>,
    signer: Box<dyn Signer>,
    broadcaster: Box<dyn Broadcaster>,
    fee_estimator: Box<dyn FeeEstimator>,
}

impl Coordinator {
    pub fn new(
        config: WalletConfig,
        funds: Box<dyn FundsSource>,
        signer: Box<dyn Signer>,
        broadcaster: Box<dyn Broadcaster>,
        fee_estimator: Box<dyn FeeEstimator>,
    ) -> Self {
        Coordinator {
            registry: ReservationRegistry::new(config.max_pending_reservations),
            config,
            funds,
            signer,
            broadcaster,
            fee_estimator,
        }
    }

    pub(crate) async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        info!("funding coordinator started");
        while let Some(command) = commands.recv().await {
            self.handle(command);
        }
        info!("funding coordinator stopped, {} reservations left", self.registry.len());
    }

    // A caller which stopped waiting dropped its receiver, the reply is lost
    // then and that is fine.
    fn handle(&mut self, command: Command) {
        match command {
            Command::InitFundingReserve { terms, reply } => {
                let _ = reply.send(self.init_funding_reserve(terms));
            },
            Command::AddCounterpartyFunds { id, inputs, change, multisig_key, reply } => {
                let result = self.add_counterparty_funds(id, inputs, change, multisig_key);
                if let Err(ref e) = result {
                    warn!("reservation {}: counterparty funds rejected: {}", id, e);
                }
                let _ = reply.send(result);
            },
            Command::AddCounterpartySignatures { id, sigs, reply } => {
                let result = self.add_counterparty_sigs(id, sigs);
                if let Err(ref e) = result {
                    warn!("reservation {}: counterparty signatures rejected: {}", id, e);
                }
                let _ = reply.send(result);
            },
            Command::Cancel { id, reply } => {
                self.cancel(id);
                let _ = reply.send(Ok(()));
            },
        }
    }

    fn init_funding_reserve(&mut self, terms: ReservationTerms) -> Result<Arc<Reservation>, WalletError> {
        terms.validate()?;
        self.registry.check_limit()?;

        let estimated = self.fee_estimator.estimate(self.config.conf_target);
        let fee_rate = cmp::max(terms.min_fee_rate, estimated);
        let coins = self.funds.select_coins(terms.our_share(), fee_rate)?;
        let multisig_key = match self.funds.new_multisig_key() {
            Ok(key) => key,
            Err(e) => {
                self.funds.release(&coins.inputs);
                return Err(e.into());
            },
        };

        let reservation = match self.registry.register(terms) {
            Ok(reservation) => reservation,
            Err(e) => {
                self.funds.release(&coins.inputs);
                return Err(e);
            },
        };
        {
            let mut n = reservation.write();
            n.our_inputs = coins.inputs;
            n.our_change = coins.change;
            n.our_multisig_key = Some(multisig_key);
            n.state = ReservationState::FundsPending;
        }

        info!(
            "reservation {}: {:?} channel of {} at {}",
            reservation.id(), terms.funding_type, terms.capacity(), fee_rate
        );
        Ok(reservation)
    }

    fn reservation(&self, id: u64) -> Result<Arc<Reservation>, WalletError> {
        self.registry.get(id)
            .cloned()
            .ok_or(WalletError::UnknownReservation(id))
    }

    fn add_counterparty_funds(
        &mut self,
        id: u64,
        inputs: Vec<FundingInput>,
        change: Vec<TxOut>,
        multisig_key: PublicKey,
    ) -> Result<(), WalletError> {
        const COMMAND: &str = "AddCounterpartyFunds";

        let reservation = self.reservation(id)?;
        let terms = reservation.terms();

        let (our_inputs, our_change, our_key) = {
            let n = reservation.read();
            let invalid = WalletError::InvalidStateTransition { id, state: n.state, command: COMMAND };
            match n.state {
                ReservationState::Created | ReservationState::FundsPending => (),
                _ => return Err(invalid),
            }
            match n.our_multisig_key {
                Some(key) => (n.our_inputs.clone(), n.our_change.clone(), key),
                None => return Err(invalid),
            }
        };

        let mut seen = HashSet::new();
        for input in our_inputs.iter().chain(inputs.iter()) {
            if !seen.insert(input.previous_output) {
                return Err(WalletError::DuplicateInput(input.previous_output));
            }
        }

        let total_in = inputs.iter().fold(0u64, |acc, i| acc.saturating_add(i.value()));
        let total_change = change.iter().fold(0u64, |acc, o| acc.saturating_add(o.value));
        let contributed = Satoshi::from(total_in.saturating_sub(total_change));
        let fee = terms.min_fee_rate.fee_for(contribution_vsize(inputs.len(), change.len()));
        let required = terms.their_share()
            .checked_add(fee)
            .unwrap_or_else(|| Satoshi::from(u64::max_value()));
        if contributed < required {
            return Err(WalletError::InsufficientFunds { contributed, required });
        }

        let their_change = change.clone();
        let funding = FundingTx {
            capacity: terms.capacity().into(),
            local_funding_pubkey: PublicKey::from_secret_key(SECP256K1, &our_key),
            remote_funding_pubkey: multisig_key,
            local_inputs: our_inputs,
            local_change: our_change,
            remote_inputs: inputs,
            remote_change: change,
        }.assemble()?;
        let txid = funding.tx.txid();

        let our_sigs = match self.sign_local_inputs(&funding) {
            Ok(sigs) => sigs,
            Err(e) => {
                warn!("reservation {}: cannot sign our inputs yet: {}", id, e);
                Vec::new()
            },
        };

        {
            let mut n = reservation.write();
            n.our_inputs = canonical_inputs(&funding, &funding.local_input_positions);
            n.their_inputs = canonical_inputs(&funding, &funding.remote_input_positions);
            n.their_change = their_change;
            n.their_multisig_key = Some(multisig_key);
            n.our_sigs = our_sigs;
            n.normalized_txid = Some(txid);
            n.funding = Some(funding);
            n.state = ReservationState::FundsReceived;
        }

        info!("reservation {}: funds received, funding txid {}", id, txid);
        Ok(())
    }

    fn add_counterparty_sigs(&mut self, id: u64, sigs: Vec<Witness>) -> Result<ReservationState, WalletError> {
        const COMMAND: &str = "AddCounterpartySignatures";

        let reservation = self.reservation(id)?;
        let (funding, our_sigs) = {
            let n = reservation.read();
            let invalid = WalletError::InvalidStateTransition { id, state: n.state, command: COMMAND };
            match n.state {
                ReservationState::FundsReceived | ReservationState::SignaturesPending => (),
                _ => return Err(invalid),
            }
            match n.funding {
                Some(ref funding) => (funding.clone(), n.our_sigs.clone()),
                None => return Err(invalid),
            }
        };

        let expected = funding.remote_input_positions.len();
        if sigs.len() != expected {
            return Err(WalletError::SignatureCountMismatch { expected, actual: sigs.len() });
        }
        for (&index, witness) in funding.remote_input_positions.iter().zip(sigs.iter()) {
            if !self.signer.verify_input(&funding.tx, index, &funding.prev_outs[index], witness) {
                return Err(WalletError::SignatureVerificationFailed(index));
            }
        }

        let our_sigs = if our_sigs.len() == funding.local_input_positions.len() {
            Some(our_sigs)
        } else {
            match self.sign_local_inputs(&funding) {
                Ok(sigs) => Some(sigs),
                Err(e) => {
                    warn!("reservation {}: still cannot sign our inputs: {}", id, e);
                    None
                },
            }
        };

        let our_sigs = match our_sigs {
            Some(sigs) => sigs,
            None => {
                let mut n = reservation.write();
                n.their_sigs = sigs;
                n.state = ReservationState::SignaturesPending;
                return Ok(ReservationState::SignaturesPending);
            },
        };

        let tx = funding.signed(&our_sigs, &sigs)?;
        {
            let mut n = reservation.write();
            n.our_sigs = our_sigs;
            n.their_sigs = sigs;
            n.completed_funding_tx = Some(tx.clone());
            n.state = ReservationState::Completed;
        }
        self.registry.remove(id);
        info!("reservation {}: completed, publishing {}", id, tx.txid());

        self.publish(id, &tx);
        Ok(ReservationState::Completed)
    }

    fn cancel(&mut self, id: u64) {
        let reservation = match self.registry.remove(id) {
            Some(reservation) => reservation,
            None => {
                debug!("reservation {}: nothing to cancel", id);
                return;
            },
        };

        let inputs = {
            let mut n = reservation.write();
            n.state = ReservationState::Cancelled;
            n.our_inputs.clone()
        };
        self.funds.release(&inputs);
        info!("reservation {}: cancelled, {} inputs released", id, inputs.len());
    }

    fn sign_local_inputs(&self, funding: &AssembledFunding) -> Result<Vec<Witness>, SignerError> {
        funding.local_input_positions.iter()
            .map(|&i| self.signer.sign_input(&funding.tx, i, &funding.prev_outs[i]))
            .collect()
    }

    fn publish(&self, id: u64, tx: &Transaction) {
        if let Err(e) = self.broadcaster.publish(tx) {
            warn!("reservation {}: broadcast failed: {}", id, e);
        }
    }
}

fn canonical_inputs(funding: &AssembledFunding, positions: &[usize]) -> Vec<FundingInput> {
    positions.iter()
        .map(|&i| FundingInput::new(funding.tx.input[i].previous_output, funding.prev_outs[i].clone()))
        .collect()
}
