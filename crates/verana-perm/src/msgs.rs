//! # Messages
//!
//! Transaction messages accepted by the keeper. String-typed wire fields
//! (addresses, DIDs, countries, digests) are already validated newtypes, so
//! a message that deserialized is syntactically sound. [`Msg::validate_basic`]
//! adds the stateless checks that span fields: mandatory ids, ordering of
//! timestamps, rate bounds.
//!
//! Permission ids travel as raw `u64` where `0` means "not given".

use serde::{Deserialize, Serialize};
use verana_core::{Address, CountryCode, Did, DigestSri, PermissionId, Rate, Timestamp, ValidationError};

use crate::error::PermError;
use crate::params::PermParams;
use crate::types::PermissionType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgStartPermissionVp {
    pub creator: Address,
    #[serde(rename = "type")]
    pub perm_type: PermissionType,
    pub validator_perm_id: u64,
    pub did: Did,
    pub country: Option<CountryCode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRenewPermissionVp {
    pub creator: Address,
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSetPermissionVpToValidated {
    pub creator: Address,
    pub id: u64,
    pub effective_until: Option<Timestamp>,
    pub validation_fees: u64,
    pub issuance_fees: u64,
    pub verification_fees: u64,
    pub country: Option<CountryCode>,
    pub issuance_fee_discount: Rate,
    pub verification_fee_discount: Rate,
    pub vp_summary_digest_sri: Option<DigestSri>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgExtendPermission {
    pub creator: Address,
    pub id: u64,
    pub effective_until: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRevokePermission {
    pub creator: Address,
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCancelPermissionVpLastRequest {
    pub creator: Address,
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRequestPermissionVpTermination {
    pub creator: Address,
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgConfirmPermissionVpTermination {
    pub creator: Address,
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCreateRootPermission {
    pub creator: Address,
    pub schema_id: u64,
    pub did: Did,
    pub country: Option<CountryCode>,
    pub effective_from: Option<Timestamp>,
    pub effective_until: Option<Timestamp>,
    pub validation_fees: u64,
    pub issuance_fees: u64,
    pub verification_fees: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCreatePermission {
    pub creator: Address,
    pub schema_id: u64,
    #[serde(rename = "type")]
    pub perm_type: PermissionType,
    pub did: Did,
    pub country: Option<CountryCode>,
    pub effective_from: Option<Timestamp>,
    pub effective_until: Option<Timestamp>,
    pub verification_fees: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCreateOrUpdatePermissionSession {
    pub creator: Address,
    pub id: String,
    pub issuer_perm_id: u64,
    pub verifier_perm_id: u64,
    pub agent_perm_id: u64,
    pub wallet_agent_perm_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSlashPermissionTrustDeposit {
    pub creator: Address,
    pub id: u64,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRepayPermissionSlashedTrustDeposit {
    pub creator: Address,
    pub id: u64,
}

/// Governance replaces the module parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUpdateParams {
    pub authority: Address,
    pub params: PermParams,
}

/// Every message the keeper accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@type", rename_all = "snake_case")]
pub enum Msg {
    StartPermissionVp(MsgStartPermissionVp),
    RenewPermissionVp(MsgRenewPermissionVp),
    SetPermissionVpToValidated(MsgSetPermissionVpToValidated),
    ExtendPermission(MsgExtendPermission),
    RevokePermission(MsgRevokePermission),
    CancelPermissionVpLastRequest(MsgCancelPermissionVpLastRequest),
    RequestPermissionVpTermination(MsgRequestPermissionVpTermination),
    ConfirmPermissionVpTermination(MsgConfirmPermissionVpTermination),
    CreateRootPermission(MsgCreateRootPermission),
    CreatePermission(MsgCreatePermission),
    CreateOrUpdatePermissionSession(MsgCreateOrUpdatePermissionSession),
    SlashPermissionTrustDeposit(MsgSlashPermissionTrustDeposit),
    RepayPermissionSlashedTrustDeposit(MsgRepayPermissionSlashedTrustDeposit),
    UpdateParams(MsgUpdateParams),
}

/// Successful handler output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MsgResponse {
    /// A permission row was created.
    PermissionCreated(PermissionId),
    /// A session was created or extended.
    SessionUpdated { id: String, authz_count: usize },
    /// The handler has nothing to report beyond success.
    Empty,
}

impl Msg {
    /// The account signing the message.
    pub fn signer(&self) -> &Address {
        match self {
            Self::StartPermissionVp(m) => &m.creator,
            Self::RenewPermissionVp(m) => &m.creator,
            Self::SetPermissionVpToValidated(m) => &m.creator,
            Self::ExtendPermission(m) => &m.creator,
            Self::RevokePermission(m) => &m.creator,
            Self::CancelPermissionVpLastRequest(m) => &m.creator,
            Self::RequestPermissionVpTermination(m) => &m.creator,
            Self::ConfirmPermissionVpTermination(m) => &m.creator,
            Self::CreateRootPermission(m) => &m.creator,
            Self::CreatePermission(m) => &m.creator,
            Self::CreateOrUpdatePermissionSession(m) => &m.creator,
            Self::SlashPermissionTrustDeposit(m) => &m.creator,
            Self::RepayPermissionSlashedTrustDeposit(m) => &m.creator,
            Self::UpdateParams(m) => &m.authority,
        }
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartPermissionVp(_) => "start_permission_vp",
            Self::RenewPermissionVp(_) => "renew_permission_vp",
            Self::SetPermissionVpToValidated(_) => "set_permission_vp_to_validated",
            Self::ExtendPermission(_) => "extend_permission",
            Self::RevokePermission(_) => "revoke_permission",
            Self::CancelPermissionVpLastRequest(_) => "cancel_permission_vp_last_request",
            Self::RequestPermissionVpTermination(_) => "request_permission_vp_termination",
            Self::ConfirmPermissionVpTermination(_) => "confirm_permission_vp_termination",
            Self::CreateRootPermission(_) => "create_root_permission",
            Self::CreatePermission(_) => "create_permission",
            Self::CreateOrUpdatePermissionSession(_) => "create_or_update_permission_session",
            Self::SlashPermissionTrustDeposit(_) => "slash_permission_trust_deposit",
            Self::RepayPermissionSlashedTrustDeposit(_) => "repay_permission_slashed_trust_deposit",
            Self::UpdateParams(_) => "update_params",
        }
    }

    /// Stateless checks. Runs before any state is read.
    pub fn validate_basic(&self) -> Result<(), PermError> {
        match self {
            Self::StartPermissionVp(m) => {
                if m.perm_type == PermissionType::Ecosystem {
                    return Err(PermError::InvalidRequest(
                        "ECOSYSTEM permissions are created with CreateRootPermission".into(),
                    ));
                }
                Ok(())
            }
            Self::RenewPermissionVp(m) => require_id(m.id),
            Self::SetPermissionVpToValidated(m) => {
                require_id(m.id)?;
                for (field, rate) in [
                    ("issuance_fee_discount", m.issuance_fee_discount),
                    ("verification_fee_discount", m.verification_fee_discount),
                ] {
                    if !rate.is_fraction() {
                        return Err(PermError::InvalidRequest(format!(
                            "{field} must be between 0 and 1, got {rate}"
                        )));
                    }
                }
                Ok(())
            }
            Self::ExtendPermission(m) => require_id(m.id),
            Self::RevokePermission(m) => require_id(m.id),
            Self::CancelPermissionVpLastRequest(m) => require_id(m.id),
            Self::RequestPermissionVpTermination(m) => require_id(m.id),
            Self::ConfirmPermissionVpTermination(m) => require_id(m.id),
            Self::CreateRootPermission(m) => {
                require_nonzero("schema_id", m.schema_id)?;
                check_window(m.effective_from, m.effective_until)
            }
            Self::CreatePermission(m) => {
                require_nonzero("schema_id", m.schema_id)?;
                if !matches!(m.perm_type, PermissionType::Issuer | PermissionType::Verifier) {
                    return Err(PermError::InvalidRequest(format!(
                        "self-created permissions must be ISSUER or VERIFIER, got {}",
                        m.perm_type
                    )));
                }
                check_window(m.effective_from, m.effective_until)
            }
            Self::CreateOrUpdatePermissionSession(m) => {
                if m.id.trim().is_empty() {
                    return Err(ValidationError::MissingField("id").into());
                }
                if m.issuer_perm_id == 0 && m.verifier_perm_id == 0 {
                    return Err(PermError::InvalidRequest(
                        "at least one of issuer_perm_id or verifier_perm_id must be provided".into(),
                    ));
                }
                require_nonzero("agent_perm_id", m.agent_perm_id)
            }
            Self::SlashPermissionTrustDeposit(m) => {
                require_id(m.id)?;
                require_nonzero("amount", m.amount)
            }
            Self::RepayPermissionSlashedTrustDeposit(m) => require_id(m.id),
            Self::UpdateParams(m) => m.params.validate().map_err(PermError::from),
        }
    }
}

fn require_id(id: u64) -> Result<(), PermError> {
    require_nonzero("id", id)
}

fn require_nonzero(field: &'static str, value: u64) -> Result<(), PermError> {
    if value == 0 {
        return Err(ValidationError::MissingField(field).into());
    }
    Ok(())
}

fn check_window(from: Option<Timestamp>, until: Option<Timestamp>) -> Result<(), PermError> {
    if let (Some(from), Some(until)) = (from, until) {
        if until <= from {
            return Err(PermError::InvalidRequest(format!(
                "effective_until {until} must be after effective_from {from}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creator() -> Address {
        Address::new("verana1qqqqqqqq").unwrap()
    }

    #[test]
    fn test_zero_id_rejected() {
        let msg = Msg::RevokePermission(MsgRevokePermission { creator: creator(), id: 0 });
        assert!(matches!(
            msg.validate_basic(),
            Err(PermError::Validation(ValidationError::MissingField("id")))
        ));
    }

    #[test]
    fn test_session_needs_issuer_or_verifier() {
        let msg = Msg::CreateOrUpdatePermissionSession(MsgCreateOrUpdatePermissionSession {
            creator: creator(),
            id: "s1".into(),
            issuer_perm_id: 0,
            verifier_perm_id: 0,
            agent_perm_id: 3,
            wallet_agent_perm_id: 0,
        });
        assert!(matches!(msg.validate_basic(), Err(PermError::InvalidRequest(_))));
    }

    #[test]
    fn test_create_permission_type_restricted() {
        let msg = Msg::CreatePermission(MsgCreatePermission {
            creator: creator(),
            schema_id: 1,
            perm_type: PermissionType::Holder,
            did: Did::new("did:example:h").unwrap(),
            country: None,
            effective_from: None,
            effective_until: None,
            verification_fees: 0,
        });
        assert!(msg.validate_basic().is_err());
    }

    #[test]
    fn test_root_window_ordering() {
        let t = |s: &str| Some(Timestamp::parse(s).unwrap());
        let msg = Msg::CreateRootPermission(MsgCreateRootPermission {
            creator: creator(),
            schema_id: 1,
            did: Did::new("did:example:eco").unwrap(),
            country: None,
            effective_from: t("2027-01-01T00:00:00Z"),
            effective_until: t("2027-01-01T00:00:00Z"),
            validation_fees: 0,
            issuance_fees: 0,
            verification_fees: 0,
        });
        assert!(matches!(msg.validate_basic(), Err(PermError::InvalidRequest(_))));
    }

    #[test]
    fn test_discount_above_one_rejected() {
        let msg = Msg::SetPermissionVpToValidated(MsgSetPermissionVpToValidated {
            creator: creator(),
            id: 1,
            effective_until: None,
            validation_fees: 0,
            issuance_fees: 0,
            verification_fees: 0,
            country: None,
            issuance_fee_discount: Rate::parse("1.1").unwrap(),
            verification_fee_discount: Rate::ZERO,
            vp_summary_digest_sri: None,
        });
        assert!(msg.validate_basic().is_err());
    }

    #[test]
    fn test_json_wire_form_validates_fields() {
        let ok = r#"{"@type":"renew_permission_vp","creator":"verana1qqqqqqqq","id":4}"#;
        let msg: Msg = serde_json::from_str(ok).unwrap();
        assert_eq!(msg.name(), "renew_permission_vp");
        assert_eq!(msg.signer().as_str(), "verana1qqqqqqqq");

        let bad = r#"{"@type":"renew_permission_vp","creator":"NOT-AN-ADDRESS","id":4}"#;
        assert!(serde_json::from_str::<Msg>(bad).is_err());
    }
}
