use std::fmt;

use serde::{Serialize, Deserialize};

#[derive(Default, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize, Debug)]
#[serde(transparent)]
pub struct Satoshi {
    raw: u64,
}

#[derive(Default, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Serialize, Deserialize, Debug)]
#[serde(transparent)]
pub struct SatoshiPerVByte {
    raw: u64,
}

impl Satoshi {
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.raw.checked_add(rhs.raw).map(Satoshi::from)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.raw.checked_sub(rhs.raw).map(Satoshi::from)
    }
}

impl SatoshiPerVByte {
    /// Fee for a transaction fragment of `vsize` virtual bytes.
    pub fn fee_for(&self, vsize: u64) -> Satoshi {
        Satoshi::from(self.raw.saturating_mul(vsize))
    }
}

impl fmt::Display for Satoshi {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} sat", self.raw)
    }
}

impl fmt::Display for SatoshiPerVByte {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} sat/vbyte", self.raw)
    }
}

mod wrappers {
    use super::*;

    impl From<Satoshi> for u64 {
        fn from(s: Satoshi) -> Self {
            s.raw
        }
    }

    impl From<u64> for Satoshi {
        fn from(s: u64) -> Self {
            Satoshi { raw: s }
        }
    }

    impl From<SatoshiPerVByte> for u64 {
        fn from(s: SatoshiPerVByte) -> Self {
            s.raw
        }
    }

    impl From<u64> for SatoshiPerVByte {
        fn from(s: u64) -> Self {
            SatoshiPerVByte { raw: s }
        }
    }
}
