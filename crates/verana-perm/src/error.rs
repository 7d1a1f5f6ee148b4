//! # Error Types: Permission Engine
//!
//! Every handler returns [`PermError`]. Any error aborts the whole
//! transaction: the keeper restores the store, the event buffer and the host
//! collaborators before handing the error back.
//!
//! ## Design
//!
//! - Validation errors carry the rejected value.
//! - State errors carry the permission id, the current state and the
//!   attempted transition.
//! - Economic errors carry the account and the amounts involved.

use thiserror::Error;
use verana_core::{Address, PermissionId, Timestamp, ValidationError};

use crate::host::HostError;
use crate::params::ParamsError;
use crate::types::{PermManagementMode, PermissionType, ValidationState};

/// Coarse classification of a [`PermError`], mirroring how a client should
/// react: fix the request, re-read state, or fund the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Malformed request, rejected before any state is read.
    Validation,
    /// The request conflicts with current state or the caller's authority.
    State,
    /// Not enough funds, escrow or deposit.
    Economic,
}

/// Errors returned by permission handlers and queries.
#[derive(Error, Debug)]
pub enum PermError {
    /// A field failed syntax validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A request is well-formed field by field but inconsistent as a whole.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Loaded parameters are unusable.
    #[error(transparent)]
    Params(#[from] ParamsError),

    #[error("permission {0} not found")]
    PermissionNotFound(PermissionId),

    #[error("permission session {0:?} not found")]
    SessionNotFound(String),

    /// `validator_perm_id` is zero or points at no permission.
    #[error("validator permission {0} not found")]
    ValidatorNotFound(u64),

    /// The validator exists but cannot validate right now.
    #[error("validator permission {id} is not eligible: {reason}")]
    ValidatorNotEligible {
        id: PermissionId,
        reason: String,
    },

    /// The validator's type cannot validate the requested type under the
    /// schema's management mode.
    #[error("{validator_type} permission {validator} cannot validate a {requested} permission: {reason}")]
    InvalidValidatorType {
        validator: PermissionId,
        validator_type: PermissionType,
        requested: PermissionType,
        reason: String,
    },

    #[error("credential schema {0} not found")]
    CredentialSchemaNotFound(u64),

    #[error("trust registry {0} not found")]
    TrustRegistryNotFound(u64),

    #[error("schema {schema_id} is in {mode} mode: {reason}")]
    ManagementModeMismatch {
        schema_id: u64,
        mode: PermManagementMode,
        reason: String,
    },

    #[error("no active ECOSYSTEM permission for schema {0}")]
    EcosystemPermissionNotFound(u64),

    /// The permission has the wrong type for the role it is used in.
    #[error("permission {id} is {found}, expected {expected}")]
    InvalidPermissionType {
        id: PermissionId,
        found: PermissionType,
        expected: PermissionType,
    },

    /// A participant permission is revoked, terminated, slashed or outside
    /// its effective window.
    #[error("permission {id} is not active: {reason}")]
    PermissionNotActive {
        id: PermissionId,
        reason: String,
    },

    // ── state machine ──

    /// Attempted transition is not valid from the current state.
    #[error("permission {id}: invalid transition {from} -> {to}")]
    InvalidTransition {
        id: PermissionId,
        from: ValidationState,
        to: ValidationState,
    },

    /// The operation requires a VALIDATED permission.
    #[error("permission {id} is {state}, expected VALIDATED")]
    NotValidated {
        id: PermissionId,
        state: ValidationState,
    },

    /// Renewal tried to change a fee.
    #[error("permission {id}: {field} cannot change on renewal ({current} -> {requested})")]
    RenewalFeeMismatch {
        id: PermissionId,
        field: &'static str,
        current: u64,
        requested: u64,
    },

    /// Renewal tried to change the country.
    #[error("permission {id}: country cannot change on renewal")]
    RenewalCountryMismatch { id: PermissionId },

    /// `effective_until` supplied at validation is out of bounds.
    #[error("permission {id}: invalid effective_until {requested}: {reason}")]
    InvalidEffectiveUntil {
        id: PermissionId,
        requested: Timestamp,
        reason: String,
    },

    #[error("permission {id}: extension to {requested} is not after current effective_until {current:?}")]
    ExtensionNotAfterCurrent {
        id: PermissionId,
        current: Option<Timestamp>,
        requested: Timestamp,
    },

    #[error("permission {id}: extension to {requested} exceeds validation window ending {vp_exp}")]
    ExtensionExceedsValidationWindow {
        id: PermissionId,
        vp_exp: Timestamp,
        requested: Timestamp,
    },

    #[error("permission {0} is already revoked")]
    AlreadyRevoked(PermissionId),

    /// The validator chain did not reach a root within the hop bound.
    #[error("validator chain from permission {start} exceeds {max_depth} hops or loops back on itself")]
    ValidatorChainCycle {
        start: PermissionId,
        max_depth: u32,
    },

    /// The caller is not the grantee, validator or controller the action requires.
    #[error("{caller} is not authorized to {action}")]
    Unauthorized {
        caller: Address,
        action: &'static str,
    },

    #[error("session {session_id:?} already holds this authorization")]
    DuplicateAuthorization { session_id: String },

    #[error("permission {0} has no slashed deposit to repay")]
    NothingToRepay(PermissionId),

    // ── economic ──

    #[error("insufficient funds on {account}: required {required}, available {available}")]
    InsufficientFunds {
        account: Address,
        required: u64,
        available: u64,
    },

    #[error("permission {id}: slash of {amount} exceeds unslashed deposit {available}")]
    SlashExceedsDeposit {
        id: PermissionId,
        amount: u64,
        available: u64,
    },

    /// A fee or deposit computation left the `u64` range.
    #[error("amount overflow while computing {0}")]
    AmountOverflow(&'static str),

    /// A bank or trust-deposit collaborator rejected the call.
    #[error("host collaborator error: {0}")]
    Host(#[from] HostError),
}

impl PermError {
    /// How a client should treat this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) | Self::InvalidRequest(_) | Self::Params(_) => {
                ErrorCategory::Validation
            }
            Self::InsufficientFunds { .. }
            | Self::SlashExceedsDeposit { .. }
            | Self::AmountOverflow(_)
            | Self::Host(_) => ErrorCategory::Economic,
            _ => ErrorCategory::State,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        let v: PermError = ValidationError::MissingField("id").into();
        assert_eq!(v.category(), ErrorCategory::Validation);

        let s = PermError::RenewalFeeMismatch {
            id: PermissionId(3),
            field: "issuance_fees",
            current: 5,
            requested: 6,
        };
        assert_eq!(s.category(), ErrorCategory::State);
        assert_eq!(
            s.to_string(),
            "permission 3: issuance_fees cannot change on renewal (5 -> 6)"
        );

        let e = PermError::AmountOverflow("fees_in_denom");
        assert_eq!(e.category(), ErrorCategory::Economic);
    }

    #[test]
    fn test_transition_message_names_states() {
        let e = PermError::InvalidTransition {
            id: PermissionId(9),
            from: ValidationState::Validated,
            to: ValidationState::Terminated,
        };
        assert_eq!(e.to_string(), "permission 9: invalid transition VALIDATED -> TERMINATED");
    }
}
