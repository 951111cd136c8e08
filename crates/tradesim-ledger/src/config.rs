use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Configuration for hash-tree insertion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Placement attempts per insert before giving up with
    /// [`LedgerError::KeyCollisionExhausted`]. Zero is treated as one.
    pub max_key_retries: u32,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_key_retries: 32,
        }
    }
}

impl TreeConfig {
    /// Effective attempt budget, never below one.
    pub fn attempts(&self) -> u32 {
        self.max_key_retries.max(1)
    }
}

/// Top-level ledger configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Settings applied to every block tree created through the ledger.
    pub tree: TreeConfig,
}

impl LedgerConfig {
    /// Parse a configuration from TOML. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, LedgerError> {
        toml::from_str(s).map_err(|e| LedgerError::Config(e.to_string()))
    }
}
