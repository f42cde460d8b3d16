use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use channel::funding::{
    contribution_vsize, sign_p2wpkh_input, FUNDING_OUTPUT_VSIZE, TX_OVERHEAD_VSIZE,
};
use channel::tools::v0_p2wpkh;
use channel::FundingInput;
use dependencies::bitcoin::util::bip32;
use dependencies::bitcoin::{OutPoint, Script, Transaction, TxOut, Witness};
use dependencies::parking_lot::RwLock;
use dependencies::secp256k1::{PublicKey, SecretKey, SECP256K1};
use dependencies::tracing::debug;
use wire::{Satoshi, SatoshiPerVByte};

use crate::account_manager::AccountManager;
use crate::interface::{FundsError, FundsSource, SelectedCoins, Signer, SignerError};
use crate::key_manager::{KeyManager, BIP0084_KEY_SCOPE, DEFAULT_ACCOUNT, MULTISIG_KEY_SCOPE};

/// Keys of the p2wpkh outputs the wallet can spend, by output script.
pub type KeyStore = Arc<RwLock<HashMap<Script, SecretKey>>>;

struct Coin {
    prev_out: TxOut,
    locked: bool,
}

/// In-memory coin source. Coins handed to a reservation stay locked until
/// they are released.
pub struct UtxoPool {
    dust_limit: Satoshi,
    account: AccountManager,
    multisig: AccountManager,
    keys: KeyStore,
    coins: BTreeMap<OutPoint, Coin>,
}

impl UtxoPool {
    pub fn new(key_manager: &KeyManager, dust_limit: Satoshi) -> Result<Self, bip32::Error> {
        Ok(UtxoPool {
            dust_limit,
            account: key_manager.account_manager(&BIP0084_KEY_SCOPE, DEFAULT_ACCOUNT)?,
            multisig: key_manager.account_manager(&MULTISIG_KEY_SCOPE, DEFAULT_ACCOUNT)?,
            keys: Arc::new(RwLock::new(HashMap::new())),
            coins: BTreeMap::new(),
        })
    }

    pub fn from_seed(seed: &[u8], dust_limit: Satoshi) -> Result<Self, bip32::Error> {
        Self::new(&KeyManager::from_seed(seed)?, dust_limit)
    }

    /// Signer sharing this pool's keys.
    pub fn signer(&self) -> KeyStoreSigner {
        KeyStoreSigner::new(self.keys.clone())
    }

    /// Registers a coin paid to a fresh receiving address, returns the output.
    pub fn receive(&mut self, outpoint: OutPoint, value: Satoshi) -> Result<TxOut, FundsError> {
        let script_pubkey = self.new_script(false)?;
        let prev_out = TxOut {
            value: value.into(),
            script_pubkey,
        };
        self.coins.insert(outpoint, Coin {
            prev_out: prev_out.clone(),
            locked: false,
        });
        Ok(prev_out)
    }

    /// Sum of coins which are not locked.
    pub fn balance(&self) -> Satoshi {
        let total = self.coins.values()
            .filter(|c| !c.locked)
            .map(|c| c.prev_out.value)
            .sum::<u64>();
        Satoshi::from(total)
    }

    pub fn is_locked(&self, outpoint: &OutPoint) -> bool {
        self.coins.get(outpoint).map(|c| c.locked).unwrap_or(false)
    }

    fn new_script(&mut self, change: bool) -> Result<Script, FundsError> {
        let sk = if change {
            self.account.next_internal_key()?
        } else {
            self.account.next_external_key()?
        };
        let script = v0_p2wpkh(&PublicKey::from_secret_key(SECP256K1, &sk));
        self.keys.write().insert(script.clone(), sk);
        Ok(script)
    }
}

impl FundsSource for UtxoPool {
    fn select_coins(&mut self, amount: Satoshi, fee_rate: SatoshiPerVByte) -> Result<SelectedCoins, FundsError> {
        // largest first, ties resolved by outpoint to stay deterministic
        let mut candidates = self.coins.iter()
            .filter(|(_, c)| !c.locked)
            .map(|(o, c)| (*o, c.prev_out.clone()))
            .collect::<Vec<_>>();
        candidates.sort_by(|a, b| b.1.value.cmp(&a.1.value));

        let amount = u64::from(amount);
        let fee = |inputs: usize, change: usize| {
            u64::from(fee_rate.fee_for(TX_OVERHEAD_VSIZE + FUNDING_OUTPUT_VSIZE + contribution_vsize(inputs, change)))
        };

        let mut total = 0u64;
        let mut selected = Vec::new();
        for (outpoint, prev_out) in candidates {
            total = total.saturating_add(prev_out.value);
            selected.push(FundingInput::new(outpoint, prev_out));

            if total < amount.saturating_add(fee(selected.len(), 0)) {
                continue;
            }

            let change_value = total
                .checked_sub(amount.saturating_add(fee(selected.len(), 1)))
                .filter(|&v| v >= u64::from(self.dust_limit));
            let change = match change_value {
                Some(value) => vec![TxOut {
                    value,
                    script_pubkey: self.new_script(true)?,
                }],
                None => vec![],
            };

            for input in selected.iter() {
                if let Some(coin) = self.coins.get_mut(&input.previous_output) {
                    coin.locked = true;
                }
            }
            debug!("selected {} coins worth {} sat for {} sat", selected.len(), total, amount);
            return Ok(SelectedCoins {
                inputs: selected,
                change,
            });
        }

        let needed = amount.saturating_add(fee(selected.len().max(1), 0));
        Err(FundsError::NotEnoughCoins {
            available: Satoshi::from(total),
            needed: Satoshi::from(needed),
        })
    }

    fn new_multisig_key(&mut self) -> Result<SecretKey, FundsError> {
        Ok(self.multisig.next_external_key()?)
    }

    fn release(&mut self, inputs: &[FundingInput]) {
        for input in inputs {
            if let Some(coin) = self.coins.get_mut(&input.previous_output) {
                coin.locked = false;
            }
        }
        debug!("released {} coins", inputs.len());
    }
}

/// Signs inputs spending outputs whose keys are in the key store.
#[derive(Clone)]
pub struct KeyStoreSigner {
    keys: KeyStore,
}

impl KeyStoreSigner {
    pub fn new(keys: KeyStore) -> Self {
        KeyStoreSigner { keys }
    }
}

impl Signer for KeyStoreSigner {
    fn sign_input(&self, tx: &Transaction, index: usize, prev_out: &TxOut) -> Result<Witness, SignerError> {
        let key = self.keys.read()
            .get(&prev_out.script_pubkey)
            .cloned()
            .ok_or_else(|| SignerError::UnknownScript(prev_out.script_pubkey.clone()))?;
        Ok(sign_p2wpkh_input(SECP256K1, tx, index, prev_out, &key)?)
    }
}
