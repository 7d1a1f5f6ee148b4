//! # Host Collaborators
//!
//! The permission engine owns only permission and session state. Balances,
//! trust deposits, credential schemas and trust registries belong to other
//! ledger modules and are reached through the traits below.
//!
//! Calls are synchronous and run inside the caller's transaction. The
//! [`Host`] supertrait adds a checkpoint/revert pair so the keeper can undo
//! collaborator side effects when a later step of the same transaction
//! fails.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use verana_core::Address;

use crate::types::PermManagementMode;

/// An amount in a single denomination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: u64,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u64) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }
}

impl std::fmt::Display for Coin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Identifier of a trust-deposit anchor (an account whose deposit backs
/// several operator accounts).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnchorId(pub String);

/// Read-only view of a credential schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSchemaInfo {
    pub id: u64,
    /// Owning trust registry.
    pub tr_id: u64,
    pub issuer_perm_management_mode: PermManagementMode,
    pub verifier_perm_management_mode: PermManagementMode,
    /// Validation-process validity in days, per applicant type. Zero means
    /// no ceiling.
    pub issuer_grantor_validation_validity_period: u32,
    pub verifier_grantor_validation_validity_period: u32,
    pub issuer_validation_validity_period: u32,
    pub verifier_validation_validity_period: u32,
    pub holder_validation_validity_period: u32,
}

/// Read-only view of a trust registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustRegistryInfo {
    pub id: u64,
    pub controller: Address,
}

/// Failure reported by a collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("insufficient balance on {account}: required {required}, available {available}")]
    InsufficientBalance {
        account: String,
        required: u64,
        available: u64,
    },

    #[error("trust deposit of {account} would go negative: balance {balance}, delta {delta}")]
    TrustDepositUnderflow {
        account: String,
        balance: u64,
        delta: i64,
    },

    #[error("amount {0} does not fit a signed trust-deposit delta")]
    DeltaOutOfRange(u64),

    #[error("collaborator rejected the call: {0}")]
    Rejected(String),
}

// ─── Collaborator traits ─────────────────────────────────────────────

/// Token transfers.
pub trait Bank {
    /// Account to account.
    fn send_coins(&mut self, from: &Address, to: &Address, coin: &Coin) -> Result<(), HostError>;

    /// Account into a module account.
    fn send_coins_from_account_to_module(
        &mut self,
        from: &Address,
        module: &str,
        coin: &Coin,
    ) -> Result<(), HostError>;

    /// Module account back to an account.
    fn send_coins_from_module_to_account(
        &mut self,
        module: &str,
        to: &Address,
        coin: &Coin,
    ) -> Result<(), HostError>;

    /// Balance available for transfers.
    fn spendable_balance(&self, account: &Address, denom: &str) -> u64;
}

/// The trust-deposit ledger. Anchor-aware routing of adjustments is its
/// business; the engine only decides how much to adjust.
pub trait TrustDeposit {
    /// Positive `delta` locks funds into the account's trust deposit;
    /// negative releases them to its claimable balance.
    fn adjust_trust_deposit(&mut self, account: &Address, delta: i64) -> Result<(), HostError>;

    /// Burn a slashed amount from the account's trust deposit.
    fn burn_slashed_trust_deposit(&mut self, account: &Address, amount: u64)
        -> Result<(), HostError>;

    fn is_anchor(&self, account: &Address) -> bool;

    fn anchor_for_operator(&self, account: &Address) -> Option<AnchorId>;

    /// Module account that receives repayments of slashed deposits.
    fn module_account(&self) -> &str;
}

/// Credential-schema registry lookups.
pub trait CredentialSchemas {
    fn credential_schema(&self, id: u64) -> Option<CredentialSchemaInfo>;
}

/// Trust-registry lookups.
pub trait TrustRegistries {
    fn trust_registry(&self, id: u64) -> Option<TrustRegistryInfo>;

    /// Price of one trust unit in the bond denomination.
    fn trust_unit_price(&self) -> u64;
}

/// Everything the keeper needs from the host ledger, plus transactional
/// undo of collaborator side effects.
pub trait Host: Bank + TrustDeposit + CredentialSchemas + TrustRegistries {
    /// Opaque saved state.
    type Checkpoint;

    /// Capture collaborator state before a transaction runs.
    fn checkpoint(&self) -> Self::Checkpoint;

    /// Restore collaborator state captured by [`Host::checkpoint`].
    fn revert(&mut self, checkpoint: Self::Checkpoint);
}

/// Convert an unsigned amount into a trust-deposit delta.
pub(crate) fn signed_delta(amount: u64) -> Result<i64, HostError> {
    i64::try_from(amount).map_err(|_| HostError::DeltaOutOfRange(amount))
}
