//! # Permission Sessions
//!
//! A session groups the permissions taking part in one or more credential
//! exchanges under a caller-chosen id. The first call creates it and makes
//! the caller its controller; later calls from the controller append one
//! authorization each.
//!
//! Every appended authorization settles the fees it implies: verification
//! fees when a verifier is involved, issuance fees otherwise, paid by the
//! caller to the beneficiaries the resolver returns.

use verana_core::{Address, PermissionId, Timestamp, ValidationError};

use crate::beneficiary::find_beneficiaries;
use crate::error::PermError;
use crate::events::{self, Event};
use crate::host::Host;
use crate::keeper::Keeper;
use crate::msgs::{MsgCreateOrUpdatePermissionSession, MsgResponse};
use crate::settlement::{self, FeeKind, Payer, SettlementRequest};
use crate::store::PermissionStore;
use crate::types::{PermissionSession, PermissionType, SessionAuthz};

/// Load a session participant and check its type and that it can act now.
fn participant(
    store: &PermissionStore,
    id: PermissionId,
    expected: PermissionType,
    now: Timestamp,
) -> Result<(), PermError> {
    let perm = store.require(id)?;
    if perm.perm_type != expected {
        return Err(PermError::InvalidPermissionType {
            id,
            found: perm.perm_type,
            expected,
        });
    }
    if let Some(reason) = perm.inactive_reason(now) {
        return Err(PermError::PermissionNotActive {
            id,
            reason: reason.to_string(),
        });
    }
    Ok(())
}

impl<H: Host> Keeper<H> {
    pub(crate) fn create_or_update_permission_session(
        &mut self,
        msg: MsgCreateOrUpdatePermissionSession,
        now: Timestamp,
    ) -> Result<MsgResponse, PermError> {
        let issuer = PermissionId::from_wire(msg.issuer_perm_id);
        let verifier = PermissionId::from_wire(msg.verifier_perm_id);
        let wallet_agent = PermissionId::from_wire(msg.wallet_agent_perm_id);
        let agent = PermissionId::from_wire(msg.agent_perm_id)
            .ok_or(ValidationError::MissingField("agent_perm_id"))?;

        for (id, expected) in [
            (issuer, PermissionType::Issuer),
            (verifier, PermissionType::Verifier),
            (Some(agent), PermissionType::Issuer),
            (wallet_agent, PermissionType::Issuer),
        ] {
            if let Some(id) = id {
                participant(&self.store, id, expected, now)?;
            }
        }

        let authz = SessionAuthz {
            executor_perm_id: issuer,
            beneficiary_perm_id: verifier,
            wallet_agent_perm_id: wallet_agent,
        };

        let mut session = match self.store.session(&msg.id) {
            Some(existing) => {
                if existing.controller != msg.creator {
                    return Err(PermError::Unauthorized {
                        caller: msg.creator,
                        action: "update this permission session",
                    });
                }
                if existing.contains(&authz) {
                    return Err(PermError::DuplicateAuthorization {
                        session_id: msg.id,
                    });
                }
                existing.clone()
            }
            None => PermissionSession {
                id: msg.id.clone(),
                controller: msg.creator.clone(),
                agent_perm_id: agent,
                created: now,
                modified: now,
                authz: Vec::new(),
            },
        };

        self.settle_session_fees(&msg.creator, issuer, verifier)?;

        session.authz.push(authz);
        session.modified = now;
        let authz_count = session.authz.len();
        self.store.put_session(session);

        self.emit(
            Event::new(events::EVENT_CREATE_OR_UPDATE_PERMISSION_SESSION)
                .attr(events::ATTR_SESSION_ID, &msg.id)
                .attr(events::ATTR_CREATOR, &msg.creator)
                .attr(
                    events::ATTR_EXECUTOR_PERM_ID,
                    issuer.map(|id| id.to_string()).unwrap_or_default(),
                )
                .attr(
                    events::ATTR_BENEFICIARY_PERM_ID,
                    verifier.map(|id| id.to_string()).unwrap_or_default(),
                ),
        );
        tracing::info!(session_id = %msg.id, authz_count, "permission session updated");
        Ok(MsgResponse::SessionUpdated {
            id: msg.id,
            authz_count,
        })
    }

    /// Resolve beneficiaries for the exchange and pay them from `payer`.
    fn settle_session_fees(
        &mut self,
        payer: &Address,
        issuer: Option<PermissionId>,
        verifier: Option<PermissionId>,
    ) -> Result<(), PermError> {
        let beneficiaries = find_beneficiaries(
            &self.store,
            &self.host,
            issuer,
            verifier,
            self.params.max_validator_chain_depth,
        )?;
        let (kind, executor) = match verifier {
            Some(v) => (FeeKind::Verification, Some(v)),
            None => (FeeKind::Issuance, issuer),
        };

        let price = self.host.trust_unit_price();
        let required = settlement::required_amount(&beneficiaries, kind, price)?;
        let available = self.host.spendable_balance(payer, &self.params.bond_denom);
        if available < required {
            return Err(PermError::InsufficientFunds {
                account: payer.clone(),
                required,
                available,
            });
        }

        let req = SettlementRequest {
            kind,
            payer: Payer::Account(payer.clone()),
            executor,
            trust_unit_price: price,
            trust_deposit_rate: self.params.trust_deposit_rate,
            denom: &self.params.bond_denom,
            module_account: &self.params.module_account,
        };
        let receipt = settlement::settle(&mut self.store, &mut self.host, &req, &beneficiaries)?;

        self.events.extend(
            receipt
                .lines
                .iter()
                .map(|line| settlement::settle_event(line, kind, executor)),
        );
        tracing::debug!(
            kind = %kind,
            lines = receipt.lines.len(),
            charged = receipt.total_charged(),
            direct = receipt.total_direct(),
            trust_deposit = receipt.total_trust_deposit(),
            "session fees settled"
        );
        Ok(())
    }
}
