use dependencies::bitcoin::util::bip32::{self, ChildNumber, ExtendedPrivKey};
use dependencies::bitcoin::Network;
use dependencies::secp256k1::SECP256K1;

use crate::account_manager::AccountManager;

const BIP0084_PURPOSE: u32 = 84;

// Purpose of the scope which holds channel funding keys, these keys never
// receive coins directly, so they live apart from the BIP84 addresses.
const MULTISIG_PURPOSE: u32 = 1017;

// COIN_TYPE_BITCOIN specifies the BIP44 coin type for Bitcoin key
// derivation.
const COIN_TYPE_BITCOIN: u32 = 0;

pub const BIP0084_KEY_SCOPE: KeyScope = KeyScope {
    purpose: ChildNumber::Hardened { index: BIP0084_PURPOSE },
    coin: ChildNumber::Hardened { index: COIN_TYPE_BITCOIN },
};

pub const MULTISIG_KEY_SCOPE: KeyScope = KeyScope {
    purpose: ChildNumber::Hardened { index: MULTISIG_PURPOSE },
    coin: ChildNumber::Hardened { index: COIN_TYPE_BITCOIN },
};

pub const DEFAULT_ACCOUNT: ChildNumber = ChildNumber::Hardened { index: 0 };

// KeyScope represents a restricted key scope from the primary root key within
// the HD chain. From the root manager (m/) we can create a nearly arbitrary
// number of scoped managers of key derivation path: m/purpose'/cointype'.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct KeyScope {
    // first child of the master key
    pub purpose: ChildNumber,
    // child of the purpose key, any accounts are derived from it
    pub coin: ChildNumber,
}

pub struct KeyManager {
    master_key: ExtendedPrivKey,
}

impl KeyManager {
    pub fn from_seed(seed: &[u8]) -> Result<Self, bip32::Error> {
        Ok(KeyManager {
            master_key: ExtendedPrivKey::new_master(Network::Bitcoin, seed)?,
        })
    }

    pub fn scoped_manager(&self, scope: &KeyScope) -> Result<ScopedManager, bip32::Error> {
        let path = [scope.purpose, scope.coin];
        let scoped_key = self.master_key.derive_priv(SECP256K1, &path)?;
        Ok(ScopedManager { scoped_key })
    }

    /// Account `account` of `scope`, i.e. m/purpose'/cointype'/account.
    pub fn account_manager(&self, scope: &KeyScope, account: ChildNumber) -> Result<AccountManager, bip32::Error> {
        self.scoped_manager(scope)?.account_manager(account)
    }
}

// Key of m/purpose'/cointype', derivation of accounts starts from here.
pub struct ScopedManager {
    scoped_key: ExtendedPrivKey,
}

impl ScopedManager {
    pub fn account_manager(&self, account: ChildNumber) -> Result<AccountManager, bip32::Error> {
        let account_key = self.scoped_key.derive_priv(SECP256K1, &[account])?;
        Ok(AccountManager::from_account_key(account_key))
    }
}
