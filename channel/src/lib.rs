#![forbid(unsafe_code)]

pub mod bip69;
pub mod tools;
pub mod funding;

pub use self::funding::{FundingInput, FundingTx, AssembledFunding, FundingError};
