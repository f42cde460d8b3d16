#![forbid(unsafe_code)]

mod locator;
pub use self::locator::{ChannelLocator, ParseLocatorError, MAX_BLOCK_HEIGHT, MAX_TX_INDEX};

mod units;
pub use self::units::{Satoshi, SatoshiPerVByte};
