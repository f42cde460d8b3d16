use std::fs;
use std::io::Error as IoError;
use std::path::PathBuf;

use dependencies::bitcoin::consensus::encode::serialize_hex;
use dependencies::bitcoin::{OutPoint, Transaction, Txid, Witness};
use dependencies::bitcoin::util::bip32;
use dependencies::bitcoin_hashes::Hash;
use dependencies::rand;
use dependencies::secp256k1::{PublicKey, SECP256K1};
use dependencies::tracing::info;
use structopt::StructOpt;
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use wallet::{
    BroadcastError, Broadcaster, Coordinator, FundingType, FundsError, FundsSource, LightningWallet,
    Reservation, SelectedCoins, Signer, SignerError, StaticFeeEstimator, UtxoPool, WalletConfig,
    WalletError,
};
use wire::{ChannelLocator, Satoshi, SatoshiPerVByte, MAX_BLOCK_HEIGHT, MAX_TX_INDEX};

#[derive(Debug, Error)]
enum Error {
    #[error("cannot read {path:?}: {inner}")]
    ReadConfig { path: PathBuf, inner: IoError },
    #[error("invalid configuration: {0}")]
    ParseConfig(#[from] serde_json::Error),
    #[error(transparent)]
    Key(#[from] bip32::Error),
    #[error(transparent)]
    Funds(#[from] FundsError),
    #[error(transparent)]
    Signer(#[from] SignerError),
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error("funding transaction does not spend {0}")]
    MissingInput(OutPoint),
}

#[derive(StructOpt, Debug)]
#[structopt(name = "lpd-funding")]
/// Opens a channel between two in-process wallets and prints the signed
/// funding transaction.
struct Config {
    /// Wallet configuration in json, flags below take precedence
    #[structopt(long = "config", parse(from_os_str))]
    config: Option<PathBuf>,

    /// Amount put into the channel by the initiator, in satoshi
    #[structopt(long = "funding-amount", default_value = "100000")]
    funding_amount: u64,

    /// Channel reserve, in satoshi
    #[structopt(long = "reserve", default_value = "10000")]
    reserve_amount: u64,

    /// Minimal fee rate both sides agree on, sat/vbyte
    #[structopt(long = "min-fee-rate", default_value = "1")]
    min_fee_rate: u64,

    /// Rate of the static fee estimator, sat/vbyte
    #[structopt(long = "fee-rate")]
    fee_rate: Option<u64>,

    /// Counterparty matches the funding amount
    #[structopt(long = "dual-funder")]
    dual_funder: bool,

    /// Height the funding transaction is assumed to be mined at
    #[structopt(long = "block-height", default_value = "0", parse(try_from_str = parse_block_height))]
    block_height: u32,

    /// Index of the funding transaction within its block
    #[structopt(long = "tx-index", default_value = "0", parse(try_from_str = parse_tx_index))]
    tx_index: u32,

    /// Print configuration information and exit
    #[structopt(long = "print-config")]
    print_config: bool,
}

fn parse_bounded(s: &str, max: u32) -> Result<u32, String> {
    let value = s.parse::<u32>().map_err(|e| e.to_string())?;
    if value > max {
        return Err(format!("{} is above the maximum {}", value, max));
    }
    Ok(value)
}

fn parse_block_height(s: &str) -> Result<u32, String> {
    parse_bounded(s, MAX_BLOCK_HEIGHT)
}

fn parse_tx_index(s: &str) -> Result<u32, String> {
    parse_bounded(s, MAX_TX_INDEX)
}

impl Config {
    fn wallet_config(&self) -> Result<WalletConfig, Error> {
        let mut config = match self.config {
            Some(ref path) => {
                let data = fs::read_to_string(path)
                    .map_err(|inner| Error::ReadConfig { path: path.clone(), inner })?;
                serde_json::from_str(&data)?
            },
            None => WalletConfig::default(),
        };
        if let Some(rate) = self.fee_rate {
            config.fee_rate = SatoshiPerVByte::from(rate);
        }
        Ok(config)
    }
}

struct StdoutBroadcaster;

impl Broadcaster for StdoutBroadcaster {
    fn publish(&self, tx: &Transaction) -> Result<(), BroadcastError> {
        info!("publishing funding transaction {}", tx.txid());
        println!("{}", serialize_hex(tx));
        Ok(())
    }
}

// a coin of `value` in a transaction nobody has seen
fn fund(pool: &mut UtxoPool, value: u64) -> Result<(), Error> {
    let outpoint = OutPoint {
        txid: Txid::from_inner(rand::random()),
        vout: 0,
    };
    pool.receive(outpoint, Satoshi::from(value))?;
    Ok(())
}

fn input_position(tx: &Transaction, outpoint: &OutPoint) -> Result<usize, Error> {
    tx.input.iter()
        .position(|i| i.previous_output == *outpoint)
        .ok_or(Error::MissingInput(*outpoint))
}

fn sign_remote(reservation: &Reservation, signer: &dyn Signer) -> Result<Vec<Witness>, Error> {
    let (tx, (inputs, _, _)) = match reservation.funding_tx() {
        Some(tx) => (tx, reservation.their_funds()),
        None => return Ok(Vec::new()),
    };
    let mut sigs = Vec::with_capacity(inputs.len());
    for input in inputs {
        let index = input_position(&tx, &input.previous_output)?;
        sigs.push(signer.sign_input(&tx, index, &input.prev_out)?);
    }
    Ok(sigs)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Config::from_args();
    let config = args.wallet_config()?;
    if args.print_config {
        println!("{:#?}\n{:#?}", &args, &config);
        return Ok(());
    }

    let funding_type = if args.dual_funder {
        FundingType::DualFunder
    } else {
        FundingType::SingleFunder
    };

    let mut ours = UtxoPool::from_seed(&rand::random::<[u8; 32]>(), config.dust_limit)?;
    fund(&mut ours, args.funding_amount.saturating_mul(2))?;
    let our_signer = ours.signer();

    let mut theirs = UtxoPool::from_seed(&rand::random::<[u8; 32]>(), config.dust_limit)?;
    fund(&mut theirs, args.funding_amount.saturating_mul(2))?;
    let their_signer = theirs.signer();

    let coordinator = Coordinator::new(
        config.clone(),
        Box::new(ours),
        Box::new(our_signer),
        Box::new(StdoutBroadcaster),
        Box::new(StaticFeeEstimator::new(config.fee_rate)),
    );
    let (wallet, _) = LightningWallet::spawn(coordinator);

    let min_fee_rate = SatoshiPerVByte::from(args.min_fee_rate);
    let reservation = wallet
        .init_funding_reserve(
            funding_type,
            Satoshi::from(args.funding_amount),
            Satoshi::from(args.reserve_amount),
            min_fee_rate,
        )
        .await?;

    let their_key = PublicKey::from_secret_key(SECP256K1, &theirs.new_multisig_key()?);
    let contribution = match funding_type {
        FundingType::SingleFunder => SelectedCoins::default(),
        FundingType::DualFunder => theirs.select_coins(reservation.terms().their_share(), min_fee_rate)?,
    };
    reservation.add_funds(contribution.inputs, contribution.change, their_key).await?;
    info!("funding txid {:?}", reservation.normalized_txid());

    let sigs = sign_remote(&reservation, &their_signer)?;
    let state = reservation.complete_reservation(sigs).await?;
    info!("reservation {} is {:?}", reservation.id(), state);

    if let Some(outpoint) = reservation.funding_outpoint() {
        let locator = ChannelLocator::new(args.block_height, args.tx_index, outpoint.vout as u16);
        info!("funding output {} will be located at {} ({:#018x})", outpoint, locator, locator.to_u64());
    }
    Ok(())
}
