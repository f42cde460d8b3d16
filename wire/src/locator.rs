use std::fmt;
use std::str::FromStr;

use dependencies::byteorder::{BigEndian, ByteOrder};
use thiserror::Error;

/// Location of a funding output on chain, compact enough to travel in a
/// single `u64` instead of a full txid and output index.
///
/// Packing, from the most significant bit: 3 bytes of block height, 3 bytes
/// of transaction index within the block, 2 bytes of output index.
/// `block_height` and `tx_index` are limited to 24 bits, anything above is
/// dropped by the encoding.
#[derive(Eq, PartialEq, Hash, Debug, Clone, Copy, Default)]
pub struct ChannelLocator {
    pub block_height: u32,
    /// the transaction index within the block
    pub tx_index: u32,
    /// the output index that pays to the channel
    pub output_index: u16,
}

const HEIGHT_BITS: u64 = 24;
const TX_INDEX_BITS: u64 = 24;
const OUTPUT_INDEX_BITS: u64 = 16;

pub const MAX_BLOCK_HEIGHT: u32 = (1 << HEIGHT_BITS) - 1;
pub const MAX_TX_INDEX: u32 = (1 << TX_INDEX_BITS) - 1;

impl ChannelLocator {
    pub fn new(block_height: u32, tx_index: u32, output_index: u16) -> Self {
        ChannelLocator {
            block_height,
            tx_index,
            output_index,
        }
    }

    pub fn encode(block_height: u32, tx_index: u32, output_index: u16) -> u64 {
        Self::new(block_height, tx_index, output_index).into()
    }

    pub fn decode(v: u64) -> Self {
        v.into()
    }

    pub fn to_u64(&self) -> u64 {
        (*self).into()
    }

    pub fn to_bytes(&self) -> [u8; 8] {
        let mut buf = [0u8; 8];
        BigEndian::write_u64(&mut buf, self.to_u64());
        buf
    }

    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        BigEndian::read_u64(&bytes).into()
    }
}

impl From<u64> for ChannelLocator {
    fn from(v: u64) -> Self {
        type Mask = (u64, u64);
        let mask = |size: u64, p: u64| (((1 << size) - 1) << p, p);
        let apply = |value: u64, (m, p): Mask| (value & m) >> p;

        ChannelLocator {
            block_height: apply(v, mask(HEIGHT_BITS, 40)) as _,
            tx_index: apply(v, mask(TX_INDEX_BITS, 16)) as _,
            output_index: apply(v, mask(OUTPUT_INDEX_BITS, 0)) as _,
        }
    }
}

impl From<ChannelLocator> for u64 {
    fn from(s: ChannelLocator) -> Self {
        type Mask = (u64, u64);
        let mask = |size: u64, p: u64| ((1 << size) - 1, p);
        let apply = |value: u64, (m, p): Mask| (value & m) << p;

        0
        | apply(s.block_height as _, mask(HEIGHT_BITS, 40))
        | apply(s.tx_index as _, mask(TX_INDEX_BITS, 16))
        | apply(s.output_index as _, mask(OUTPUT_INDEX_BITS, 0))
    }
}

impl fmt::Display for ChannelLocator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.block_height, self.tx_index, self.output_index)
    }
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum ParseLocatorError {
    #[error("expected <height>:<tx_index>:<output_index>, got {0:?}")]
    Format(String),
    #[error("{field} is not a number: {value:?}")]
    NotANumber { field: &'static str, value: String },
    #[error("{field} {value} does not fit into {bits} bits")]
    OutOfRange { field: &'static str, value: u64, bits: u64 },
}

impl FromStr for ChannelLocator {
    type Err = ParseLocatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s.split(':').collect::<Vec<_>>();
        if parts.len() != 3 {
            return Err(ParseLocatorError::Format(s.to_owned()));
        }

        let field = |name: &'static str, value: &str, bits: u64| {
            let v = value.parse::<u64>()
                .map_err(|_| ParseLocatorError::NotANumber { field: name, value: value.to_owned() })?;
            if v >> bits != 0 {
                return Err(ParseLocatorError::OutOfRange { field: name, value: v, bits: bits });
            }
            Ok(v)
        };

        Ok(ChannelLocator {
            block_height: field("block height", parts[0], HEIGHT_BITS)? as _,
            tx_index: field("tx index", parts[1], TX_INDEX_BITS)? as _,
            output_index: field("output index", parts[2], OUTPUT_INDEX_BITS)? as _,
        })
    }
}

mod serde_m {
    use super::ChannelLocator;

    use serde::Serialize;
    use serde::Serializer;
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::de::Visitor;
    use serde::de::Error;
    use std::fmt;

    impl Serialize for ChannelLocator {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error> where S: Serializer {
            serializer.serialize_u64(self.to_u64())
        }
    }

    impl<'de> Deserialize<'de> for ChannelLocator {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error> where D: Deserializer<'de> {
            struct V;

            impl<'de> Visitor<'de> for V {
                type Value = ChannelLocator;

                fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                    write!(formatter, "8 bytes unsigned integer")
                }

                fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> where E: Error, {
                    Ok(ChannelLocator::from(v))
                }
            }

            deserializer.deserialize_u64(V)
        }
    }
}
