use serde::Deserialize;
use wire::{Satoshi, SatoshiPerVByte};

/// Settings of the wallet. Every field has a default, so a partial
/// configuration is enough.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// change below this value is given to fees instead of creating an output
    pub dust_limit: Satoshi,
    /// confirmation target passed to the fee estimator, in blocks
    pub conf_target: u32,
    pub max_pending_reservations: usize,
    /// rate used by the static fee estimator
    pub fee_rate: SatoshiPerVByte,
}

impl Default for WalletConfig {
    fn default() -> Self {
        WalletConfig {
            dust_limit: Satoshi::from(546),
            conf_target: 6,
            max_pending_reservations: 64,
            fee_rate: SatoshiPerVByte::from(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::WalletConfig;
    use pretty_assertions::assert_eq;
    use wire::{Satoshi, SatoshiPerVByte};

    #[test]
    fn partial_config() {
        let config: WalletConfig = serde_json::from_str(r#"{ "conf_target": 3, "fee_rate": 12 }"#).unwrap();
        assert_eq!(config, WalletConfig {
            conf_target: 3,
            fee_rate: SatoshiPerVByte::from(12),
            ..WalletConfig::default()
        });
        assert_eq!(config.dust_limit, Satoshi::from(546));
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let config: WalletConfig = serde_json::from_str(r#"{ "network": "regtest" }"#).unwrap();
        assert_eq!(config, WalletConfig::default());
    }
}
