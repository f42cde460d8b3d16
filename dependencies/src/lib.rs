#![forbid(unsafe_code)]

pub extern crate secp256k1;
pub extern crate bitcoin_hashes;
pub extern crate bitcoin;
pub extern crate rand;
pub extern crate hex;
pub extern crate byteorder;
pub extern crate tracing;
pub extern crate parking_lot;
