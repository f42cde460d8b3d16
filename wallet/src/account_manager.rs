use dependencies::bitcoin::util::bip32::{self, ChildNumber, ExtendedPrivKey};
use dependencies::secp256k1::{PublicKey, SecretKey, SECP256K1};

const EXTERNAL_BRANCH: u32 = 0;
const INTERNAL_BRANCH: u32 = 1;

/// Hands out keys of one account: the external branch for receiving, the
/// internal one for change. Indexes only grow.
pub struct AccountManager {
    account_key: ExtendedPrivKey,
    external_index: u32,
    internal_index: u32,
}

impl AccountManager {
    pub fn from_account_key(account_key: ExtendedPrivKey) -> Self {
        AccountManager {
            account_key,
            external_index: 0,
            internal_index: 0,
        }
    }

    pub fn next_external_key(&mut self) -> Result<SecretKey, bip32::Error> {
        let key = self.derive(EXTERNAL_BRANCH, self.external_index)?;
        self.external_index += 1;
        Ok(key)
    }

    pub fn next_internal_key(&mut self) -> Result<SecretKey, bip32::Error> {
        let key = self.derive(INTERNAL_BRANCH, self.internal_index)?;
        self.internal_index += 1;
        Ok(key)
    }

    pub fn next_external_pk(&mut self) -> Result<PublicKey, bip32::Error> {
        self.next_external_key()
            .map(|sk| PublicKey::from_secret_key(SECP256K1, &sk))
    }

    fn derive(&self, branch: u32, index: u32) -> Result<SecretKey, bip32::Error> {
        let path = [
            ChildNumber::from_normal_idx(branch)?,
            ChildNumber::from_normal_idx(index)?,
        ];
        let extended_priv_key = self.account_key.derive_priv(SECP256K1, &path)?;
        Ok(extended_priv_key.private_key)
    }
}
