use wire::SatoshiPerVByte;

pub trait FeeEstimator: Send {
    fn estimate(&mut self, num_blocks: u32) -> SatoshiPerVByte;
}

/// Returns the same rate whatever the confirmation target is.
pub struct StaticFeeEstimator {
    rate: SatoshiPerVByte,
}

impl StaticFeeEstimator {
    pub fn new(rate: SatoshiPerVByte) -> Self {
        StaticFeeEstimator {
            rate: rate,
        }
    }
}

impl FeeEstimator for StaticFeeEstimator {
    fn estimate(&mut self, _num_blocks: u32) -> SatoshiPerVByte {
        self.rate
    }
}

#[cfg(test)]
mod tests {
    use super::{FeeEstimator, StaticFeeEstimator};
    use wire::SatoshiPerVByte;

    #[test]
    fn static_rate() {
        let mut estimator = StaticFeeEstimator::new(SatoshiPerVByte::from(7));
        assert_eq!(estimator.estimate(1), SatoshiPerVByte::from(7));
        assert_eq!(estimator.estimate(144), SatoshiPerVByte::from(7));
    }
}
