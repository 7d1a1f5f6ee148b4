//! # Ledger Events
//!
//! Typed key/value events emitted by handlers for indexers and clients.
//! The keeper buffers them per transaction and drops the buffer's tail when
//! the transaction aborts, so only committed effects are ever observed.

use serde::{Deserialize, Serialize};

pub const EVENT_START_PERMISSION_VP: &str = "start_permission_vp";
pub const EVENT_RENEW_PERMISSION_VP: &str = "renew_permission_vp";
pub const EVENT_SET_PERMISSION_VP_TO_VALIDATED: &str = "set_permission_vp_to_validated";
pub const EVENT_CANCEL_PERMISSION_VP_LAST_REQUEST: &str = "cancel_permission_vp_last_request";
pub const EVENT_REQUEST_PERMISSION_VP_TERMINATION: &str = "request_permission_vp_termination";
pub const EVENT_CONFIRM_PERMISSION_VP_TERMINATION: &str = "confirm_permission_vp_termination";
pub const EVENT_EXTEND_PERMISSION: &str = "extend_permission";
pub const EVENT_REVOKE_PERMISSION: &str = "revoke_permission";
pub const EVENT_CREATE_ROOT_PERMISSION: &str = "create_root_permission";
pub const EVENT_CREATE_PERMISSION: &str = "create_permission";
pub const EVENT_CREATE_OR_UPDATE_PERMISSION_SESSION: &str = "create_or_update_permission_session";
pub const EVENT_SLASH_PERMISSION_TRUST_DEPOSIT: &str = "slash_permission_trust_deposit";
pub const EVENT_REPAY_PERMISSION_SLASHED_TRUST_DEPOSIT: &str =
    "repay_permission_slashed_trust_deposit";
pub const EVENT_SETTLE_FEE: &str = "settle_fee";
pub const EVENT_UPDATE_PARAMS: &str = "update_params";

pub const ATTR_PERMISSION_ID: &str = "permission_id";
pub const ATTR_CREATOR: &str = "creator";
pub const ATTR_VALIDATOR_PERM_ID: &str = "validator_perm_id";
pub const ATTR_TYPE: &str = "type";
pub const ATTR_SCHEMA_ID: &str = "schema_id";
pub const ATTR_COUNTRY: &str = "country";
pub const ATTR_FEES: &str = "fees";
pub const ATTR_DEPOSIT: &str = "deposit";
pub const ATTR_VP_STATE: &str = "vp_state";
pub const ATTR_EFFECTIVE_UNTIL: &str = "effective_until";
pub const ATTR_SESSION_ID: &str = "session_id";
pub const ATTR_FEE_KIND: &str = "fee_kind";
pub const ATTR_BENEFICIARY_PERM_ID: &str = "beneficiary_perm_id";
pub const ATTR_EXECUTOR_PERM_ID: &str = "executor_perm_id";
pub const ATTR_DIRECT_AMOUNT: &str = "direct_amount";
pub const ATTR_TRUST_DEPOSIT_AMOUNT: &str = "trust_deposit_amount";
pub const ATTR_AMOUNT: &str = "amount";
pub const ATTR_TIMESTAMP: &str = "timestamp";

/// One ledger event: a type and its attributes in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: String,
    pub attributes: Vec<(String, String)>,
}

impl Event {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            attributes: Vec::new(),
        }
    }

    /// Append an attribute (builder style).
    pub fn attr(mut self, key: &str, value: impl ToString) -> Self {
        self.attributes.push((key.to_string(), value.to_string()));
        self
    }

    /// First value recorded under `key`.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}
