//! # Module Parameters
//!
//! Governance-controlled knobs of the permission engine. Parameters load
//! from YAML (genesis files, operator overrides) and every field has a
//! default, so a partial document is valid.
//!
//! ```yaml
//! trust_deposit_rate: "0.2"
//! bond_denom: uvna
//! module_account: perm
//! max_validator_chain_depth: 32
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use verana_core::Rate;

/// Rejected parameter document.
#[derive(Error, Debug)]
pub enum ParamsError {
    #[error("failed to parse params YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid param `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

/// Permission-engine parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermParams {
    /// Share of every fee diverted into trust deposits. Must be in `[0, 1]`.
    pub trust_deposit_rate: Rate,
    /// Denomination fees and deposits are paid in.
    pub bond_denom: String,
    /// Module account that escrows validation fees.
    pub module_account: String,
    /// Hop bound for validator-chain walks.
    pub max_validator_chain_depth: u32,
    /// Page size when a list query does not give one.
    pub default_response_max_size: u32,
    /// Largest page size a list query may ask for.
    pub max_response_max_size: u32,
}

impl Default for PermParams {
    fn default() -> Self {
        Self {
            // 0.2 = 2 / 10.
            trust_deposit_rate: Rate::from_parts(2, 1).unwrap_or(Rate::ZERO),
            bond_denom: "uvna".to_string(),
            module_account: "perm".to_string(),
            max_validator_chain_depth: 32,
            default_response_max_size: 64,
            max_response_max_size: 1024,
        }
    }
}

impl PermParams {
    /// Parse and validate a YAML parameter document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ParamsError> {
        let params: Self = serde_yaml::from_str(yaml)?;
        params.validate()?;
        Ok(params)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if !self.trust_deposit_rate.is_fraction() {
            return Err(ParamsError::Invalid {
                field: "trust_deposit_rate",
                reason: format!("{} is above 1", self.trust_deposit_rate),
            });
        }
        if self.bond_denom.is_empty() {
            return Err(invalid("bond_denom", "must not be empty"));
        }
        if self.module_account.is_empty() {
            return Err(invalid("module_account", "must not be empty"));
        }
        if self.max_validator_chain_depth == 0 {
            return Err(invalid("max_validator_chain_depth", "must be at least 1"));
        }
        if self.default_response_max_size == 0
            || self.default_response_max_size > self.max_response_max_size
        {
            return Err(invalid(
                "default_response_max_size",
                "must be between 1 and max_response_max_size",
            ));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ParamsError {
    ParamsError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
