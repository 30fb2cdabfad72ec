use std::path::Path;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunables for the market aggregator. Missing keys take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Size of `top_markets` in the overview.
    pub top_markets_limit: usize,
    /// Size of each recommendation list.
    pub recommendation_limit: usize,
    /// Average supply APY (percent) above which supplying is favoured.
    pub favorable_supply_rate: Decimal,
    /// Average supply APY (percent) below which alternatives are favoured.
    pub low_supply_rate: Decimal,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            top_markets_limit: 5,
            recommendation_limit: 3,
            favorable_supply_rate: dec!(5),
            low_supply_rate: dec!(2),
        }
    }
}

impl AnalyticsConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.low_supply_rate > self.favorable_supply_rate {
            return Err(ConfigError::Invalid(format!(
                "low_supply_rate {} above favorable_supply_rate {}",
                self.low_supply_rate, self.favorable_supply_rate
            )));
        }
        Ok(())
    }
}
