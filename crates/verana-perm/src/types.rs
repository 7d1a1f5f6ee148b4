//! # Permission Types
//!
//! The records kept by the permission store and the enums that classify
//! them.
//!
//! ## Validation-Process States
//!
//! ```text
//!               ┌──────── RenewPermissionVP ────────┐
//!               ▼                                   │
//! Start ──▶ PENDING ──▶ SetPermissionVPToValidated ──▶ VALIDATED ──▶ TERMINATION_REQUESTED ──▶ TERMINATED
//!               │                                   ▲
//!               ├── Cancel (first request) ──▶ TERMINATED
//!               └── Cancel (renewal) ───────────────┘
//! ```
//!
//! `revoked`, `extended` and `slashed` are orthogonal markers, not states.
//! Rows are never deleted; a dead permission is archived in place.

use serde::{Deserialize, Serialize};
use verana_core::{Address, CountryCode, Did, DigestSri, PermissionId, Rate, Timestamp};

// ─── Permission Type ─────────────────────────────────────────────────

/// The role a permission grants under its credential schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionType {
    /// Root of a schema's permission tree, held by the ecosystem governance.
    Ecosystem,
    /// Trust-registry level permission.
    TrustRegistry,
    /// May validate ISSUER permissions.
    IssuerGrantor,
    /// May issue credentials.
    Issuer,
    /// May validate VERIFIER permissions.
    VerifierGrantor,
    /// May request credential presentations.
    Verifier,
    /// May hold credentials.
    Holder,
}

impl std::fmt::Display for PermissionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ecosystem => "ECOSYSTEM",
            Self::TrustRegistry => "TRUST_REGISTRY",
            Self::IssuerGrantor => "ISSUER_GRANTOR",
            Self::Issuer => "ISSUER",
            Self::VerifierGrantor => "VERIFIER_GRANTOR",
            Self::Verifier => "VERIFIER",
            Self::Holder => "HOLDER",
        };
        f.write_str(s)
    }
}

// ─── Validation State ────────────────────────────────────────────────

/// Where a permission stands in its validation process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationState {
    /// A request (first or renewal) awaits the validator.
    Pending,
    /// Validated and usable.
    Validated,
    /// The grantee asked to terminate; the validator has not confirmed yet.
    TerminationRequested,
    /// Archived (terminal).
    Terminated,
}

impl ValidationState {
    /// Whether this state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

impl std::fmt::Display for ValidationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Validated => "VALIDATED",
            Self::TerminationRequested => "TERMINATION_REQUESTED",
            Self::Terminated => "TERMINATED",
        };
        f.write_str(s)
    }
}

// ─── Perm Management Mode ────────────────────────────────────────────

/// How a credential schema admits issuers or verifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermManagementMode {
    /// Anyone may self-create the permission; the ecosystem root is paid.
    Open,
    /// A grantor permission validates applicants.
    GrantorValidation,
    /// The ecosystem root validates applicants directly.
    TrustRegistryValidation,
}

impl std::fmt::Display for PermManagementMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Open => "OPEN",
            Self::GrantorValidation => "GRANTOR_VALIDATION",
            Self::TrustRegistryValidation => "TRUST_REGISTRY_VALIDATION",
        };
        f.write_str(s)
    }
}

// ─── Permission ──────────────────────────────────────────────────────

/// A permission row.
///
/// Fee fields are in trust units; multiply by the trust-unit price to get
/// the bond denomination. `deposit`, `slashed_deposit` and the `vp_*`
/// amounts are already in the bond denomination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Ledger-assigned identifier.
    pub id: PermissionId,
    /// Credential schema this permission applies to.
    pub schema_id: u64,
    /// Granted role.
    #[serde(rename = "type")]
    pub perm_type: PermissionType,
    /// Subject DID.
    pub did: Did,
    /// Account that owns this permission.
    pub grantee: Address,
    /// Country restriction, if any.
    pub country: Option<CountryCode>,
    /// The permission that validated this one. `None` for roots.
    pub validator_perm_id: Option<PermissionId>,

    pub created: Timestamp,
    pub created_by: Address,
    pub modified: Timestamp,

    /// Start of validity. `None` until the first validation.
    pub effective_from: Option<Timestamp>,
    /// End of validity. `None` means no expiry.
    pub effective_until: Option<Timestamp>,

    /// Charged to applicants this permission validates.
    pub validation_fees: u64,
    /// Charged per credential issued under this permission's chain.
    pub issuance_fees: u64,
    /// Charged per presentation verified under this permission's chain.
    pub verification_fees: u64,
    /// Fraction of issuance fees waived for this grantee.
    pub issuance_fee_discount: Rate,
    /// Fraction of verification fees waived for this grantee.
    pub verification_fee_discount: Rate,

    /// Trust deposit attributed to this permission.
    pub deposit: u64,
    /// Slashed and not yet repaid. Non-zero excludes the permission from
    /// beneficiary resolution.
    pub slashed_deposit: u64,
    /// Total repaid over the permission's life.
    pub repaid_deposit: u64,

    pub revoked: Option<Timestamp>,
    pub revoked_by: Option<Address>,
    pub terminated: Option<Timestamp>,
    pub terminated_by: Option<Address>,
    pub extended: Option<Timestamp>,
    pub extended_by: Option<Address>,
    pub slashed: Option<Timestamp>,
    pub slashed_by: Option<Address>,
    pub repaid: Option<Timestamp>,
    pub repaid_by: Option<Address>,

    pub vp_state: ValidationState,
    pub vp_last_state_change: Timestamp,
    /// Ceiling for `effective_until`.
    pub vp_exp: Option<Timestamp>,
    /// Audit field; the phase itself lives in `vp_state`.
    pub vp_term_requested: Option<Timestamp>,
    /// Validation fees escrowed in the module account while PENDING.
    pub vp_current_fees: u64,
    /// Trust deposit committed by the applicant while PENDING.
    pub vp_current_deposit: u64,
    pub vp_summary_digest_sri: Option<DigestSri>,
    /// Trust deposit the validator accrued by validating this permission.
    /// Released when this permission terminates.
    pub vp_validator_deposit: u64,
}

impl Permission {
    /// A fresh row with every optional marker unset and zero amounts.
    pub fn new(
        id: PermissionId,
        schema_id: u64,
        perm_type: PermissionType,
        did: Did,
        grantee: Address,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            schema_id,
            perm_type,
            did,
            created_by: grantee.clone(),
            grantee,
            country: None,
            validator_perm_id: None,
            created: now,
            modified: now,
            effective_from: None,
            effective_until: None,
            validation_fees: 0,
            issuance_fees: 0,
            verification_fees: 0,
            issuance_fee_discount: Rate::ZERO,
            verification_fee_discount: Rate::ZERO,
            deposit: 0,
            slashed_deposit: 0,
            repaid_deposit: 0,
            revoked: None,
            revoked_by: None,
            terminated: None,
            terminated_by: None,
            extended: None,
            extended_by: None,
            slashed: None,
            slashed_by: None,
            repaid: None,
            repaid_by: None,
            vp_state: ValidationState::Pending,
            vp_last_state_change: now,
            vp_exp: None,
            vp_term_requested: None,
            vp_current_fees: 0,
            vp_current_deposit: 0,
            vp_summary_digest_sri: None,
            vp_validator_deposit: 0,
        }
    }

    /// Revoked, terminated or carrying an unrepaid slash. Excluded
    /// permissions never receive fees.
    pub fn is_excluded(&self) -> bool {
        self.revoked.is_some() || self.terminated.is_some() || self.slashed_deposit != 0
    }

    /// Whether this permission has ever been validated. A PENDING row with
    /// `effective_from` set is a renewal request.
    pub fn was_validated(&self) -> bool {
        self.effective_from.is_some()
    }

    /// Not excluded and inside its effective window at `when`.
    pub fn is_active_at(&self, when: Timestamp) -> bool {
        if self.is_excluded() {
            return false;
        }
        let started = self.effective_from.is_some_and(|from| from <= when);
        let not_expired = self.effective_until.map_or(true, |until| when < until);
        started && not_expired
    }

    /// Why this permission cannot act at `when`, or `None` if it can.
    pub fn inactive_reason(&self, when: Timestamp) -> Option<&'static str> {
        if self.revoked.is_some() {
            Some("revoked")
        } else if self.terminated.is_some() {
            Some("terminated")
        } else if self.slashed_deposit != 0 {
            Some("slashed")
        } else if !self.effective_from.is_some_and(|from| from <= when) {
            Some("not yet effective")
        } else if self.effective_until.is_some_and(|until| when >= until) {
            Some("expired")
        } else {
            None
        }
    }

    /// A country-restricted permission only serves the same country.
    pub fn serves_country(&self, country: Option<CountryCode>) -> bool {
        match (self.country, country) {
            (Some(mine), Some(theirs)) => mine == theirs,
            _ => true,
        }
    }

    /// Stamp `vp_state` and its audit timestamps.
    pub(crate) fn set_vp_state(&mut self, state: ValidationState, now: Timestamp) {
        self.vp_state = state;
        self.vp_last_state_change = now;
        self.modified = now;
    }
}

// ─── Permission Session ──────────────────────────────────────────────

/// One authorization inside a session: which permission executed the
/// exchange, which one it served, and through which wallet agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAuthz {
    pub executor_perm_id: Option<PermissionId>,
    pub beneficiary_perm_id: Option<PermissionId>,
    pub wallet_agent_perm_id: Option<PermissionId>,
}

/// Groups the permissions involved in one or more credential exchanges.
/// `authz` is append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSession {
    /// Caller-supplied identifier, typically a UUID.
    pub id: String,
    /// The only account allowed to append.
    pub controller: Address,
    pub agent_perm_id: PermissionId,
    pub created: Timestamp,
    pub modified: Timestamp,
    pub authz: Vec<SessionAuthz>,
}

impl PermissionSession {
    /// Whether an identical authorization is already recorded.
    pub fn contains(&self, authz: &SessionAuthz) -> bool {
        self.authz.iter().any(|a| a == authz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    fn perm() -> Permission {
        Permission::new(
            PermissionId(1),
            10,
            PermissionType::Issuer,
            Did::new("did:web:issuer.example").unwrap(),
            Address::new("verana1qqqqqqqq").unwrap(),
            ts("2026-01-01T00:00:00Z"),
        )
    }

    #[test]
    fn test_new_permission_is_pending_and_inactive() {
        let p = perm();
        assert_eq!(p.vp_state, ValidationState::Pending);
        assert!(!p.was_validated());
        assert!(!p.is_excluded());
        assert!(!p.is_active_at(ts("2026-06-01T00:00:00Z")));
        assert_eq!(p.inactive_reason(ts("2026-06-01T00:00:00Z")), Some("not yet effective"));
    }

    #[test]
    fn test_effective_window() {
        let mut p = perm();
        p.effective_from = Some(ts("2026-01-01T00:00:00Z"));
        p.effective_until = Some(ts("2027-01-01T00:00:00Z"));
        assert!(p.is_active_at(ts("2026-01-01T00:00:00Z")));
        assert!(p.is_active_at(ts("2026-12-31T23:59:59Z")));
        assert!(!p.is_active_at(ts("2027-01-01T00:00:00Z")));
        assert_eq!(p.inactive_reason(ts("2027-01-01T00:00:00Z")), Some("expired"));
    }

    #[test]
    fn test_exclusion_markers() {
        let mut p = perm();
        p.slashed_deposit = 1;
        assert!(p.is_excluded());
        p.slashed_deposit = 0;
        p.revoked = Some(ts("2026-02-01T00:00:00Z"));
        assert!(p.is_excluded());
        assert_eq!(p.inactive_reason(ts("2026-03-01T00:00:00Z")), Some("revoked"));
    }

    #[test]
    fn test_country_restriction() {
        let mut p = perm();
        let us = CountryCode::new("US").unwrap();
        let fr = CountryCode::new("FR").unwrap();
        assert!(p.serves_country(Some(us)));
        p.country = Some(us);
        assert!(p.serves_country(Some(us)));
        assert!(!p.serves_country(Some(fr)));
        assert!(p.serves_country(None));
    }

    #[test]
    fn test_state_display_and_serde() {
        assert_eq!(ValidationState::TerminationRequested.to_string(), "TERMINATION_REQUESTED");
        assert!(ValidationState::Terminated.is_terminal());
        assert!(!ValidationState::Validated.is_terminal());
        let json = serde_json::to_string(&PermissionType::VerifierGrantor).unwrap();
        assert_eq!(json, "\"VERIFIER_GRANTOR\"");
    }

    #[test]
    fn test_permission_json_uses_type_key() {
        let value = serde_json::to_value(perm()).unwrap();
        assert_eq!(value["type"], "ISSUER");
        assert_eq!(value["vp_state"], "PENDING");
        let back: Permission = serde_json::from_value(value).unwrap();
        assert_eq!(back, perm());
    }

    #[test]
    fn test_session_contains() {
        let authz = SessionAuthz {
            executor_perm_id: Some(PermissionId(42)),
            beneficiary_perm_id: None,
            wallet_agent_perm_id: None,
        };
        let mut s = PermissionSession {
            id: "s1".into(),
            controller: Address::new("verana1qqqqqqqq").unwrap(),
            agent_perm_id: PermissionId(7),
            created: ts("2026-01-01T00:00:00Z"),
            modified: ts("2026-01-01T00:00:00Z"),
            authz: vec![],
        };
        assert!(!s.contains(&authz));
        s.authz.push(authz);
        assert!(s.contains(&authz));
    }
}
