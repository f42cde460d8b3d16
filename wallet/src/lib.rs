#![forbid(unsafe_code)]

mod account_manager;
mod key_manager;
pub use self::account_manager::AccountManager;
pub use self::key_manager::{KeyManager, KeyScope, ScopedManager, BIP0084_KEY_SCOPE, MULTISIG_KEY_SCOPE, DEFAULT_ACCOUNT};

mod config;
pub use self::config::WalletConfig;

mod error;
pub use self::error::WalletError;

mod fee_estimator;
pub use self::fee_estimator::{FeeEstimator, StaticFeeEstimator};

mod interface;
pub use self::interface::{
    BroadcastError, Broadcaster, FundsError, FundsSource, SelectedCoins, Signer, SignerError,
};

mod utxo_pool;
pub use self::utxo_pool::{KeyStore, KeyStoreSigner, UtxoPool};

mod reservation;
pub use self::reservation::{FundingType, Reservation, ReservationState, ReservationTerms};

mod registry;
pub use self::registry::ReservationRegistry;

mod coordinator;
pub use self::coordinator::Coordinator;

mod lightning_wallet;
pub use self::lightning_wallet::{ChannelReservation, LightningWallet};
