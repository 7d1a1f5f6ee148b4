//! # Validation-Process State Machine
//!
//! Handlers for every message that creates or mutates a permission row.
//!
//! ## Escrow
//!
//! Starting or renewing a validation process charges the applicant
//! `validator.validation_fees × trust_unit_price` plus the trust-deposit
//! share of that amount. Both go into the module account: the fees wait
//! there until the validator acts, and the deposit share is immediately
//! credited to the applicant's trust deposit. On validation the escrowed
//! fees are settled to the validator. On cancellation the fees are refunded
//! and the deposit is released back through the trust-deposit ledger.
//!
//! ## Authority
//!
//! | Action                         | Caller                                        |
//! |--------------------------------|-----------------------------------------------|
//! | start, renew, cancel, request  | applicant (grantee)                           |
//! | validate, extend, revoke,      | validator grantee, or the trust-registry      |
//! | confirm termination            | controller for a root permission              |
//! | slash                          | trust-registry controller or active ancestor  |
//! | repay                          | anyone                                        |

use verana_core::{Address, PermissionId, Timestamp};

use crate::beneficiary::{ecosystem_permission, walk_validator_chain};
use crate::error::PermError;
use crate::events::{self, Event};
use crate::host::{signed_delta, Coin, CredentialSchemaInfo, Host};
use crate::keeper::Keeper;
use crate::msgs::{
    MsgCancelPermissionVpLastRequest, MsgConfirmPermissionVpTermination, MsgCreatePermission,
    MsgCreateRootPermission, MsgExtendPermission, MsgRenewPermissionVp,
    MsgRepayPermissionSlashedTrustDeposit, MsgRequestPermissionVpTermination,
    MsgRevokePermission, MsgSetPermissionVpToValidated, MsgSlashPermissionTrustDeposit,
    MsgStartPermissionVp, MsgResponse,
};
use crate::settlement::{self, FeeKind, Payer, SettlementRequest};
use crate::types::{PermManagementMode, Permission, PermissionType, ValidationState};

/// Validity period in days the schema grants to a validated `perm_type`.
/// Zero means no ceiling.
pub fn validity_period_days(cs: &CredentialSchemaInfo, perm_type: PermissionType) -> u32 {
    match perm_type {
        PermissionType::IssuerGrantor => cs.issuer_grantor_validation_validity_period,
        PermissionType::VerifierGrantor => cs.verifier_grantor_validation_validity_period,
        PermissionType::Issuer => cs.issuer_validation_validity_period,
        PermissionType::Verifier => cs.verifier_validation_validity_period,
        PermissionType::Holder => cs.holder_validation_validity_period,
        PermissionType::Ecosystem | PermissionType::TrustRegistry => 0,
    }
}

/// Check that `validator` may run a validation process for `requested`
/// under the schema's management modes.
pub fn check_validator_type(
    validator: &Permission,
    requested: PermissionType,
    cs: &CredentialSchemaInfo,
) -> Result<(), PermError> {
    use PermManagementMode::{GrantorValidation, Open, TrustRegistryValidation};
    use PermissionType::*;

    let mismatch = |mode: PermManagementMode, reason: &str| PermError::ManagementModeMismatch {
        schema_id: cs.id,
        mode,
        reason: reason.to_string(),
    };
    let wrong_validator = |reason: &str| PermError::InvalidValidatorType {
        validator: validator.id,
        validator_type: validator.perm_type,
        requested,
        reason: reason.to_string(),
    };

    let expected = match requested {
        IssuerGrantor | VerifierGrantor => {
            let mode = if requested == IssuerGrantor {
                cs.issuer_perm_management_mode
            } else {
                cs.verifier_perm_management_mode
            };
            if mode != GrantorValidation {
                return Err(mismatch(mode, "grantors exist only under GRANTOR_VALIDATION"));
            }
            Ecosystem
        }
        Issuer | Verifier => {
            let (mode, grantor) = if requested == Issuer {
                (cs.issuer_perm_management_mode, IssuerGrantor)
            } else {
                (cs.verifier_perm_management_mode, VerifierGrantor)
            };
            match mode {
                Open => {
                    return Err(mismatch(mode, "self-create the permission with CreatePermission"))
                }
                GrantorValidation => grantor,
                TrustRegistryValidation => Ecosystem,
            }
        }
        Holder => Issuer,
        Ecosystem | TrustRegistry => {
            return Err(wrong_validator("this type cannot be requested through a validation process"))
        }
    };

    if validator.perm_type != expected {
        return Err(wrong_validator(&format!("validator must be {expected}")));
    }
    Ok(())
}

fn require_caller(caller: &Address, expected: &Address, action: &'static str) -> Result<(), PermError> {
    if caller != expected {
        return Err(PermError::Unauthorized {
            caller: caller.clone(),
            action,
        });
    }
    Ok(())
}

fn require_validated(perm: &Permission) -> Result<(), PermError> {
    if perm.vp_state != ValidationState::Validated {
        return Err(PermError::NotValidated {
            id: perm.id,
            state: perm.vp_state,
        });
    }
    Ok(())
}

fn require_state(perm: &Permission, expected: ValidationState, to: ValidationState) -> Result<(), PermError> {
    if perm.vp_state != expected {
        return Err(PermError::InvalidTransition {
            id: perm.id,
            from: perm.vp_state,
            to,
        });
    }
    Ok(())
}

fn validity_window_end(base: Timestamp, days: u32) -> Result<Option<Timestamp>, PermError> {
    if days == 0 {
        return Ok(None);
    }
    base.checked_add_days(days)
        .map(Some)
        .ok_or_else(|| PermError::InvalidRequest(format!("validity window from {base} overflows")))
}

impl<H: Host> Keeper<H> {
    // ── shared lookups ──

    pub(crate) fn load(&self, id: u64) -> Result<Permission, PermError> {
        self.store.require(PermissionId(id)).cloned()
    }

    pub(crate) fn schema(&self, id: u64) -> Result<CredentialSchemaInfo, PermError> {
        self.host
            .credential_schema(id)
            .ok_or(PermError::CredentialSchemaNotFound(id))
    }

    /// Controller of the trust registry owning `schema_id`.
    pub(crate) fn registry_controller(&self, schema_id: u64) -> Result<Address, PermError> {
        let cs = self.schema(schema_id)?;
        self.host
            .trust_registry(cs.tr_id)
            .map(|tr| tr.controller)
            .ok_or(PermError::TrustRegistryNotFound(cs.tr_id))
    }

    /// Account allowed to act as `perm`'s validator.
    fn validator_authority(&self, perm: &Permission) -> Result<Address, PermError> {
        match perm.validator_perm_id {
            Some(vid) => self
                .store
                .get(vid)
                .map(|v| v.grantee.clone())
                .ok_or(PermError::ValidatorNotFound(vid.get())),
            None => self.registry_controller(perm.schema_id),
        }
    }

    /// Load a validator and check it can act for an applicant in `country`.
    fn eligible_validator(
        &self,
        validator_id: PermissionId,
        country: Option<verana_core::CountryCode>,
        now: Timestamp,
    ) -> Result<Permission, PermError> {
        let validator = self
            .store
            .get(validator_id)
            .cloned()
            .ok_or(PermError::ValidatorNotFound(validator_id.get()))?;
        if let Some(reason) = validator.inactive_reason(now) {
            return Err(PermError::ValidatorNotEligible {
                id: validator_id,
                reason: reason.to_string(),
            });
        }
        if !validator.serves_country(country) {
            return Err(PermError::ValidatorNotEligible {
                id: validator_id,
                reason: format!(
                    "validator is restricted to {}",
                    validator.country.map(|c| c.to_string()).unwrap_or_default()
                ),
            });
        }
        Ok(validator)
    }

    /// Charge the applicant for a validation process and return
    /// `(fees, deposit)` in the bond denomination.
    fn escrow_validation(
        &mut self,
        applicant: &Address,
        validator: &Permission,
    ) -> Result<(u64, u64), PermError> {
        let price = self.host.trust_unit_price();
        let fees = settlement::fees_in_denom(validator.validation_fees, price)?;
        let deposit = settlement::split_fee(fees, self.params.trust_deposit_rate)?.trust_deposit;
        let total = fees
            .checked_add(deposit)
            .ok_or(PermError::AmountOverflow("validation escrow"))?;

        let available = self.host.spendable_balance(applicant, &self.params.bond_denom);
        if available < total {
            return Err(PermError::InsufficientFunds {
                account: applicant.clone(),
                required: total,
                available,
            });
        }
        if total > 0 {
            let coin = Coin::new(&self.params.bond_denom, total);
            self.host
                .send_coins_from_account_to_module(applicant, &self.params.module_account, &coin)?;
        }
        if deposit > 0 {
            self.host.adjust_trust_deposit(applicant, signed_delta(deposit)?)?;
        }
        Ok((fees, deposit))
    }

    // ── StartPermissionVP ──

    pub(crate) fn start_permission_vp(
        &mut self,
        msg: MsgStartPermissionVp,
        now: Timestamp,
    ) -> Result<MsgResponse, PermError> {
        let validator_id = PermissionId::from_wire(msg.validator_perm_id)
            .ok_or(PermError::ValidatorNotFound(0))?;
        let validator = self.eligible_validator(validator_id, msg.country, now)?;
        let cs = self.schema(validator.schema_id)?;
        check_validator_type(&validator, msg.perm_type, &cs)?;

        let (fees, deposit) = self.escrow_validation(&msg.creator, &validator)?;

        let id = self.store.next_permission_id()?;
        let mut perm = Permission::new(
            id,
            validator.schema_id,
            msg.perm_type,
            msg.did,
            msg.creator.clone(),
            now,
        );
        perm.country = msg.country;
        perm.validator_perm_id = Some(validator_id);
        perm.vp_current_fees = fees;
        perm.vp_current_deposit = deposit;
        perm.deposit = deposit;
        perm.vp_exp = validity_window_end(now, validity_period_days(&cs, msg.perm_type))?;
        self.store.insert(perm);

        self.emit(
            Event::new(events::EVENT_START_PERMISSION_VP)
                .attr(events::ATTR_PERMISSION_ID, id)
                .attr(events::ATTR_CREATOR, &msg.creator)
                .attr(events::ATTR_VALIDATOR_PERM_ID, validator_id)
                .attr(events::ATTR_TYPE, msg.perm_type)
                .attr(
                    events::ATTR_COUNTRY,
                    msg.country.map(|c| c.to_string()).unwrap_or_default(),
                )
                .attr(events::ATTR_FEES, fees)
                .attr(events::ATTR_DEPOSIT, deposit),
        );
        tracing::info!(perm_id = %id, validator = %validator_id, perm_type = %msg.perm_type, fees, deposit, "validation process started");
        Ok(MsgResponse::PermissionCreated(id))
    }

    // ── RenewPermissionVP ──

    pub(crate) fn renew_permission_vp(
        &mut self,
        msg: MsgRenewPermissionVp,
        now: Timestamp,
    ) -> Result<MsgResponse, PermError> {
        let mut perm = self.load(msg.id)?;
        require_caller(&msg.creator, &perm.grantee, "renew this permission")?;
        require_validated(&perm)?;
        let validator_id = perm
            .validator_perm_id
            .ok_or(PermError::ValidatorNotFound(0))?;
        let validator = self.eligible_validator(validator_id, perm.country, now)?;

        let (fees, deposit) = self.escrow_validation(&msg.creator, &validator)?;

        perm.vp_current_fees = fees;
        perm.vp_current_deposit = deposit;
        perm.deposit = perm
            .deposit
            .checked_add(deposit)
            .ok_or(PermError::AmountOverflow("permission deposit"))?;
        perm.set_vp_state(ValidationState::Pending, now);
        self.store.insert(perm);

        self.emit(
            Event::new(events::EVENT_RENEW_PERMISSION_VP)
                .attr(events::ATTR_PERMISSION_ID, msg.id)
                .attr(events::ATTR_CREATOR, &msg.creator)
                .attr(events::ATTR_FEES, fees)
                .attr(events::ATTR_DEPOSIT, deposit),
        );
        tracing::info!(perm_id = msg.id, fees, deposit, "validation process renewal requested");
        Ok(MsgResponse::Empty)
    }

    // ── SetPermissionVPToValidated ──

    pub(crate) fn set_permission_vp_to_validated(
        &mut self,
        msg: MsgSetPermissionVpToValidated,
        now: Timestamp,
    ) -> Result<MsgResponse, PermError> {
        let mut perm = self.load(msg.id)?;
        let authority = self.validator_authority(&perm)?;
        require_caller(&msg.creator, &authority, "validate this permission")?;
        require_state(&perm, ValidationState::Pending, ValidationState::Validated)?;

        let renewal = perm.was_validated();
        if renewal {
            for (field, current, requested) in [
                ("validation_fees", perm.validation_fees, msg.validation_fees),
                ("issuance_fees", perm.issuance_fees, msg.issuance_fees),
                ("verification_fees", perm.verification_fees, msg.verification_fees),
            ] {
                if current != requested {
                    return Err(PermError::RenewalFeeMismatch {
                        id: perm.id,
                        field,
                        current,
                        requested,
                    });
                }
            }
            if msg.country != perm.country {
                return Err(PermError::RenewalCountryMismatch { id: perm.id });
            }
        }
        if perm.perm_type == PermissionType::Holder && msg.vp_summary_digest_sri.is_some() {
            return Err(PermError::InvalidRequest(
                "vp_summary_digest_sri must be empty for HOLDER permissions".into(),
            ));
        }

        let cs = self.schema(perm.schema_id)?;
        let base = if renewal { perm.vp_exp.unwrap_or(now) } else { now };
        let vp_exp = validity_window_end(base, validity_period_days(&cs, perm.perm_type))?;

        if let Some(until) = msg.effective_until {
            let floor = if renewal { perm.effective_until } else { Some(now) };
            if let Some(floor) = floor {
                if until <= floor {
                    return Err(PermError::InvalidEffectiveUntil {
                        id: perm.id,
                        requested: until,
                        reason: format!("must be after {floor}"),
                    });
                }
            }
            if let Some(exp) = vp_exp {
                if until > exp {
                    return Err(PermError::InvalidEffectiveUntil {
                        id: perm.id,
                        requested: until,
                        reason: format!("must not exceed vp_exp {exp}"),
                    });
                }
            }
        }

        // Escrowed fees go to the validator; the applicant's matching
        // trust-deposit share was committed when the request was made.
        let mut validator_deposit = 0;
        if perm.vp_current_fees > 0 {
            let validator_id = perm
                .validator_perm_id
                .ok_or(PermError::ValidatorNotFound(0))?;
            let validator = self.store.require(validator_id)?.clone();
            let req = SettlementRequest {
                kind: FeeKind::Validation,
                payer: Payer::Escrow,
                executor: None,
                trust_unit_price: self.host.trust_unit_price(),
                trust_deposit_rate: self.params.trust_deposit_rate,
                denom: &self.params.bond_denom,
                module_account: &self.params.module_account,
            };
            let line = settlement::settle_line(
                &mut self.store,
                &mut self.host,
                &req,
                &validator,
                perm.vp_current_fees,
            )?;
            validator_deposit = line.split.trust_deposit;
            self.events
                .push(settlement::settle_event(&line, FeeKind::Validation, Some(perm.id)));
        }

        if !renewal {
            perm.effective_from = Some(now);
            perm.country = msg.country;
        }
        perm.effective_until = msg.effective_until.or(vp_exp);
        perm.validation_fees = msg.validation_fees;
        perm.issuance_fees = msg.issuance_fees;
        perm.verification_fees = msg.verification_fees;
        perm.issuance_fee_discount = msg.issuance_fee_discount;
        perm.verification_fee_discount = msg.verification_fee_discount;
        perm.vp_summary_digest_sri = msg.vp_summary_digest_sri;
        perm.vp_exp = vp_exp;
        perm.vp_validator_deposit = perm
            .vp_validator_deposit
            .checked_add(validator_deposit)
            .ok_or(PermError::AmountOverflow("vp_validator_deposit"))?;
        perm.vp_current_fees = 0;
        perm.vp_current_deposit = 0;
        perm.set_vp_state(ValidationState::Validated, now);

        let id = perm.id;
        let effective_until = perm.effective_until;
        self.store.insert(perm);

        self.emit(
            Event::new(events::EVENT_SET_PERMISSION_VP_TO_VALIDATED)
                .attr(events::ATTR_PERMISSION_ID, id)
                .attr(events::ATTR_CREATOR, &msg.creator)
                .attr(
                    events::ATTR_EFFECTIVE_UNTIL,
                    effective_until.map(|t| t.to_string()).unwrap_or_default(),
                )
                .attr(events::ATTR_VP_STATE, ValidationState::Validated),
        );
        tracing::info!(perm_id = %id, renewal, validator_deposit, "permission validated");
        Ok(MsgResponse::Empty)
    }

    // ── CancelPermissionVPLastRequest ──

    pub(crate) fn cancel_permission_vp_last_request(
        &mut self,
        msg: MsgCancelPermissionVpLastRequest,
        now: Timestamp,
    ) -> Result<MsgResponse, PermError> {
        let mut perm = self.load(msg.id)?;
        require_caller(&msg.creator, &perm.grantee, "cancel this request")?;
        let renewal = perm.was_validated();
        let target = if renewal {
            ValidationState::Validated
        } else {
            ValidationState::Terminated
        };
        require_state(&perm, ValidationState::Pending, target)?;

        // Fees come back from escrow; the committed deposit is released to
        // the trust-deposit module's claimable balance.
        let refund = perm.vp_current_fees;
        if refund > 0 {
            let coin = Coin::new(&self.params.bond_denom, refund);
            self.host
                .send_coins_from_module_to_account(&self.params.module_account, &perm.grantee, &coin)?;
        }
        if perm.vp_current_deposit > 0 {
            self.host
                .adjust_trust_deposit(&perm.grantee, -signed_delta(perm.vp_current_deposit)?)?;
            perm.deposit = perm.deposit.saturating_sub(perm.vp_current_deposit);
        }

        perm.vp_current_fees = 0;
        perm.vp_current_deposit = 0;
        if !renewal {
            perm.terminated = Some(now);
            perm.terminated_by = Some(msg.creator.clone());
        }
        perm.set_vp_state(target, now);
        self.store.insert(perm);

        self.emit(
            Event::new(events::EVENT_CANCEL_PERMISSION_VP_LAST_REQUEST)
                .attr(events::ATTR_PERMISSION_ID, msg.id)
                .attr(events::ATTR_CREATOR, &msg.creator)
                .attr(events::ATTR_VP_STATE, target),
        );
        tracing::info!(perm_id = msg.id, state = %target, refund, "validation request cancelled");
        Ok(MsgResponse::Empty)
    }

    // ── ExtendPermission ──

    pub(crate) fn extend_permission(
        &mut self,
        msg: MsgExtendPermission,
        now: Timestamp,
    ) -> Result<MsgResponse, PermError> {
        let mut perm = self.load(msg.id)?;
        let authority = self.validator_authority(&perm)?;
        require_caller(&msg.creator, &authority, "extend this permission")?;
        require_validated(&perm)?;
        if perm.revoked.is_some() {
            return Err(PermError::AlreadyRevoked(perm.id));
        }

        let requested = msg.effective_until;
        match perm.effective_until {
            Some(current) if requested > current => {}
            current => {
                return Err(PermError::ExtensionNotAfterCurrent {
                    id: perm.id,
                    current,
                    requested,
                })
            }
        }
        if let Some(vp_exp) = perm.vp_exp {
            if requested > vp_exp {
                return Err(PermError::ExtensionExceedsValidationWindow {
                    id: perm.id,
                    vp_exp,
                    requested,
                });
            }
        }

        perm.effective_until = Some(requested);
        perm.extended = Some(now);
        perm.extended_by = Some(msg.creator.clone());
        perm.modified = now;
        self.store.insert(perm);

        self.emit(
            Event::new(events::EVENT_EXTEND_PERMISSION)
                .attr(events::ATTR_PERMISSION_ID, msg.id)
                .attr(events::ATTR_CREATOR, &msg.creator)
                .attr(events::ATTR_EFFECTIVE_UNTIL, requested),
        );
        tracing::info!(perm_id = msg.id, until = %requested, "permission extended");
        Ok(MsgResponse::Empty)
    }

    // ── RevokePermission ──

    pub(crate) fn revoke_permission(
        &mut self,
        msg: MsgRevokePermission,
        now: Timestamp,
    ) -> Result<MsgResponse, PermError> {
        let mut perm = self.load(msg.id)?;
        let authority = self.validator_authority(&perm)?;
        require_caller(&msg.creator, &authority, "revoke this permission")?;
        require_validated(&perm)?;
        if perm.revoked.is_some() {
            return Err(PermError::AlreadyRevoked(perm.id));
        }

        perm.revoked = Some(now);
        perm.revoked_by = Some(msg.creator.clone());
        perm.modified = now;
        self.store.insert(perm);

        self.emit(
            Event::new(events::EVENT_REVOKE_PERMISSION)
                .attr(events::ATTR_PERMISSION_ID, msg.id)
                .attr(events::ATTR_CREATOR, &msg.creator)
                .attr(events::ATTR_TIMESTAMP, now),
        );
        tracing::info!(perm_id = msg.id, by = %msg.creator, "permission revoked");
        Ok(MsgResponse::Empty)
    }

    // ── RequestPermissionVPTermination ──

    pub(crate) fn request_permission_vp_termination(
        &mut self,
        msg: MsgRequestPermissionVpTermination,
        now: Timestamp,
    ) -> Result<MsgResponse, PermError> {
        let mut perm = self.load(msg.id)?;
        require_caller(&msg.creator, &perm.grantee, "request termination of this permission")?;
        require_validated(&perm)?;

        perm.vp_term_requested = Some(now);
        perm.set_vp_state(ValidationState::TerminationRequested, now);
        self.store.insert(perm);

        self.emit(
            Event::new(events::EVENT_REQUEST_PERMISSION_VP_TERMINATION)
                .attr(events::ATTR_PERMISSION_ID, msg.id)
                .attr(events::ATTR_CREATOR, &msg.creator)
                .attr(events::ATTR_TIMESTAMP, now),
        );
        tracing::info!(perm_id = msg.id, "termination requested");
        Ok(MsgResponse::Empty)
    }

    // ── ConfirmPermissionVPTermination ──

    pub(crate) fn confirm_permission_vp_termination(
        &mut self,
        msg: MsgConfirmPermissionVpTermination,
        now: Timestamp,
    ) -> Result<MsgResponse, PermError> {
        let mut perm = self.load(msg.id)?;
        let authority = self.validator_authority(&perm)?;
        require_caller(&msg.creator, &authority, "confirm termination of this permission")?;
        require_state(
            &perm,
            ValidationState::TerminationRequested,
            ValidationState::Terminated,
        )?;

        // Slashed units were already burned from the host ledger.
        let released = perm.deposit.saturating_sub(perm.slashed_deposit);
        if released > 0 {
            self.host
                .adjust_trust_deposit(&perm.grantee, -signed_delta(released)?)?;
        }
        perm.deposit = 0;

        // This row's deposit holds its shares of the validations it ran, so
        // they leave with it. Children must not release them again.
        let children: Vec<PermissionId> = self
            .store
            .permissions()
            .filter(|c| c.validator_perm_id == Some(perm.id) && c.vp_validator_deposit > 0)
            .map(|c| c.id)
            .collect();
        for child in &children {
            self.store.try_update(*child, |c| {
                c.vp_validator_deposit = 0;
                Ok(())
            })?;
        }

        let validator_released = perm.vp_validator_deposit;
        if validator_released > 0 {
            // Validator authority resolved above, so the row exists.
            if let Some(vid) = perm.validator_perm_id {
                self.host
                    .adjust_trust_deposit(&authority, -signed_delta(validator_released)?)?;
                self.store.try_update(vid, |v| {
                    v.deposit = v.deposit.saturating_sub(validator_released);
                    Ok(())
                })?;
            }
            perm.vp_validator_deposit = 0;
        }

        perm.terminated = Some(now);
        perm.terminated_by = Some(msg.creator.clone());
        perm.set_vp_state(ValidationState::Terminated, now);
        self.store.insert(perm);

        self.emit(
            Event::new(events::EVENT_CONFIRM_PERMISSION_VP_TERMINATION)
                .attr(events::ATTR_PERMISSION_ID, msg.id)
                .attr(events::ATTR_CREATOR, &msg.creator)
                .attr(events::ATTR_DEPOSIT, released),
        );
        tracing::info!(
            perm_id = msg.id,
            released,
            validator_released,
            shares_released = children.len(),
            "permission terminated"
        );
        Ok(MsgResponse::Empty)
    }

    // ── CreateRootPermission ──

    pub(crate) fn create_root_permission(
        &mut self,
        msg: MsgCreateRootPermission,
        now: Timestamp,
    ) -> Result<MsgResponse, PermError> {
        let controller = self.registry_controller(msg.schema_id)?;
        require_caller(&msg.creator, &controller, "create a root permission for this schema")?;
        check_future_window(msg.effective_from, msg.effective_until, now)?;

        let id = self.store.next_permission_id()?;
        let mut perm = Permission::new(
            id,
            msg.schema_id,
            PermissionType::Ecosystem,
            msg.did,
            msg.creator.clone(),
            now,
        );
        perm.country = msg.country;
        perm.effective_from = Some(msg.effective_from.unwrap_or(now));
        perm.effective_until = msg.effective_until;
        perm.validation_fees = msg.validation_fees;
        perm.issuance_fees = msg.issuance_fees;
        perm.verification_fees = msg.verification_fees;
        perm.set_vp_state(ValidationState::Validated, now);
        self.store.insert(perm);

        self.emit(
            Event::new(events::EVENT_CREATE_ROOT_PERMISSION)
                .attr(events::ATTR_PERMISSION_ID, id)
                .attr(events::ATTR_SCHEMA_ID, msg.schema_id)
                .attr(events::ATTR_CREATOR, &msg.creator),
        );
        tracing::info!(perm_id = %id, schema_id = msg.schema_id, "root permission created");
        Ok(MsgResponse::PermissionCreated(id))
    }

    // ── CreatePermission ──

    pub(crate) fn create_permission(
        &mut self,
        msg: MsgCreatePermission,
        now: Timestamp,
    ) -> Result<MsgResponse, PermError> {
        let cs = self.schema(msg.schema_id)?;
        let mode = match msg.perm_type {
            PermissionType::Issuer => cs.issuer_perm_management_mode,
            _ => cs.verifier_perm_management_mode,
        };
        if mode != PermManagementMode::Open {
            return Err(PermError::ManagementModeMismatch {
                schema_id: cs.id,
                mode,
                reason: format!("{} permissions must go through a validation process", msg.perm_type),
            });
        }
        check_future_window(msg.effective_from, msg.effective_until, now)?;
        let ecosystem = ecosystem_permission(&self.store, msg.schema_id)
            .map(|p| p.id)
            .ok_or(PermError::EcosystemPermissionNotFound(msg.schema_id))?;

        let id = self.store.next_permission_id()?;
        let mut perm = Permission::new(
            id,
            msg.schema_id,
            msg.perm_type,
            msg.did,
            msg.creator.clone(),
            now,
        );
        perm.country = msg.country;
        perm.validator_perm_id = Some(ecosystem);
        perm.effective_from = Some(msg.effective_from.unwrap_or(now));
        perm.effective_until = msg.effective_until;
        perm.verification_fees = msg.verification_fees;
        perm.set_vp_state(ValidationState::Validated, now);
        self.store.insert(perm);

        self.emit(
            Event::new(events::EVENT_CREATE_PERMISSION)
                .attr(events::ATTR_PERMISSION_ID, id)
                .attr(events::ATTR_SCHEMA_ID, msg.schema_id)
                .attr(events::ATTR_TYPE, msg.perm_type)
                .attr(events::ATTR_CREATOR, &msg.creator),
        );
        tracing::info!(perm_id = %id, perm_type = %msg.perm_type, "open-mode permission created");
        Ok(MsgResponse::PermissionCreated(id))
    }

    // ── SlashPermissionTrustDeposit ──

    pub(crate) fn slash_permission_trust_deposit(
        &mut self,
        msg: MsgSlashPermissionTrustDeposit,
        now: Timestamp,
    ) -> Result<MsgResponse, PermError> {
        let mut perm = self.load(msg.id)?;

        let mut authorized = self.registry_controller(perm.schema_id)? == msg.creator;
        if !authorized {
            if let Some(parent) = perm.validator_perm_id {
                walk_validator_chain(
                    &self.store,
                    parent,
                    self.params.max_validator_chain_depth,
                    |ancestor| {
                        if ancestor.grantee == msg.creator && ancestor.is_active_at(now) {
                            authorized = true;
                        }
                    },
                )?;
            }
        }
        if !authorized {
            return Err(PermError::Unauthorized {
                caller: msg.creator,
                action: "slash this permission",
            });
        }

        let available = perm.deposit.saturating_sub(perm.slashed_deposit);
        if msg.amount > available {
            return Err(PermError::SlashExceedsDeposit {
                id: perm.id,
                amount: msg.amount,
                available,
            });
        }

        self.host
            .burn_slashed_trust_deposit(&perm.grantee, msg.amount)?;
        perm.slashed_deposit += msg.amount;
        perm.slashed = Some(now);
        perm.slashed_by = Some(msg.creator.clone());
        perm.modified = now;
        self.store.insert(perm);

        self.emit(
            Event::new(events::EVENT_SLASH_PERMISSION_TRUST_DEPOSIT)
                .attr(events::ATTR_PERMISSION_ID, msg.id)
                .attr(events::ATTR_AMOUNT, msg.amount)
                .attr(events::ATTR_CREATOR, &msg.creator)
                .attr(events::ATTR_TIMESTAMP, now),
        );
        tracing::info!(perm_id = msg.id, amount = msg.amount, by = %msg.creator, "permission deposit slashed");
        Ok(MsgResponse::Empty)
    }

    // ── RepayPermissionSlashedTrustDeposit ──

    pub(crate) fn repay_permission_slashed_trust_deposit(
        &mut self,
        msg: MsgRepayPermissionSlashedTrustDeposit,
        now: Timestamp,
    ) -> Result<MsgResponse, PermError> {
        let mut perm = self.load(msg.id)?;
        let amount = perm.slashed_deposit;
        if amount == 0 {
            return Err(PermError::NothingToRepay(perm.id));
        }

        let available = self.host.spendable_balance(&msg.creator, &self.params.bond_denom);
        if available < amount {
            return Err(PermError::InsufficientFunds {
                account: msg.creator,
                required: amount,
                available,
            });
        }
        let td_module = self.host.module_account().to_string();
        let coin = Coin::new(&self.params.bond_denom, amount);
        self.host
            .send_coins_from_account_to_module(&msg.creator, &td_module, &coin)?;
        self.host
            .adjust_trust_deposit(&perm.grantee, signed_delta(amount)?)?;

        perm.slashed_deposit = 0;
        perm.repaid_deposit = perm
            .repaid_deposit
            .checked_add(amount)
            .ok_or(PermError::AmountOverflow("repaid_deposit"))?;
        perm.repaid = Some(now);
        perm.repaid_by = Some(msg.creator.clone());
        perm.modified = now;
        self.store.insert(perm);

        self.emit(
            Event::new(events::EVENT_REPAY_PERMISSION_SLASHED_TRUST_DEPOSIT)
                .attr(events::ATTR_PERMISSION_ID, msg.id)
                .attr(events::ATTR_AMOUNT, amount)
                .attr(events::ATTR_CREATOR, &msg.creator)
                .attr(events::ATTR_TIMESTAMP, now),
        );
        tracing::info!(perm_id = msg.id, amount, "slashed deposit repaid");
        Ok(MsgResponse::Empty)
    }
}

/// `effective_from`, when given, must lie in the future; `effective_until`
/// must lie after both it and now.
fn check_future_window(
    from: Option<Timestamp>,
    until: Option<Timestamp>,
    now: Timestamp,
) -> Result<(), PermError> {
    if let Some(from) = from {
        if from <= now {
            return Err(PermError::InvalidRequest(format!(
                "effective_from {from} must be in the future"
            )));
        }
    }
    if let Some(until) = until {
        if until <= from.unwrap_or(now) {
            return Err(PermError::InvalidRequest(format!(
                "effective_until {until} must be after effective_from"
            )));
        }
    }
    Ok(())
}
