use dependencies::bitcoin::blockdata::opcodes::all::*;
use dependencies::bitcoin::blockdata::script::{Builder, Script};
use dependencies::bitcoin_hashes::{hash160, Hash};
use dependencies::secp256k1::PublicKey;

#[cfg(any(test, feature = "testing"))]
use dependencies::{
    bitcoin::Txid,
    hex,
    secp256k1::SecretKey,
};

#[cfg(any(test, feature = "testing"))]
pub fn s2script(s: &str) -> Script {
    let b = match hex::decode(s) {
        Ok(r) => r,
        Err(e) => panic!("{}", e)
    };
    Script::from(b)
}

#[cfg(any(test, feature = "testing"))]
pub fn s2txid(s: &str) -> Txid {
    match s.parse() {
        Ok(h) => h,
        Err(e) => panic!("{}", e)
    }
}

#[cfg(any(test, feature = "testing"))]
pub fn s2privkey(s: &str) -> SecretKey {
    let b = hex::decode(s).unwrap();
    if !(b.len() == 32 || (b.len() == 33 && b[32] == 1)) {
        panic!("incorrect string size");
    }
    SecretKey::from_slice(&b[0..32]).unwrap()
}

#[cfg(any(test, feature = "testing"))]
pub fn s2pubkey(s: &str) -> PublicKey {
    let b = hex::decode(s).unwrap();
    PublicKey::from_slice(&b).unwrap()
}

// keys go into the multisig script in lexicographical order of their
// compressed serialization
pub fn ordered<'a>(pk1: &'a [u8], pk2: &'a [u8]) -> (&'a [u8], &'a [u8]) {
    if pk1 < pk2 {
        (pk1, pk2)
    } else {
        (pk2, pk1)
    }
}

pub fn new_2x2_multisig(pk1: &[u8], pk2: &[u8]) -> Script {
    let (pk1, pk2) = ordered(pk1, pk2);
    Builder::new()
        .push_opcode(OP_PUSHNUM_2)
        .push_slice(pk1)
        .push_slice(pk2)
        .push_opcode(OP_PUSHNUM_2)
        .push_opcode(OP_CHECKMULTISIG)
        .into_script()
}

pub fn new_2x2_wsh_lock_script(pk1: &[u8], pk2: &[u8]) -> Script {
    new_2x2_multisig(pk1, pk2).to_v0_p2wsh()
}

fn pubkey_hash(pk: &PublicKey) -> hash160::Hash {
    hash160::Hash::hash(&pk.serialize()[..])
}

pub fn v0_p2wpkh(pk: &PublicKey) -> Script {
    Builder::new()
        .push_opcode(OP_PUSHBYTES_0)
        .push_slice(&pubkey_hash(pk)[..])
        .into_script()
}

/// Script code for the BIP-143 sighash of an input spending `script_pubkey`,
/// `None` when the output is not a version 0 p2wpkh output.
pub fn p2wpkh_script_code(script_pubkey: &Script) -> Option<Script> {
    if !script_pubkey.is_v0_p2wpkh() {
        return None;
    }
    let hash = &script_pubkey.as_bytes()[2..];
    // OP_DUP OP_HASH160 <pubKeyHash> OP_EQUALVERIFY OP_CHECKSIG
    let sc = Builder::new()
        .push_opcode(OP_DUP)
        .push_opcode(OP_HASH160)
        .push_slice(hash)
        .push_opcode(OP_EQUALVERIFY)
        .push_opcode(OP_CHECKSIG)
        .into_script();
    Some(sc)
}
