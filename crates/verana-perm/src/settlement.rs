//! # Fee & Deposit Settlement
//!
//! Moves the money owed when a permission validates an applicant or when a
//! credential is issued or verified under a permission chain.
//!
//! ## Split
//!
//! ```text
//! fees_in_denom  = fees × trust_unit_price
//! trust_deposit  = floor(fees_in_denom × trust_deposit_rate)
//! direct         = fees_in_denom − trust_deposit
//! ```
//!
//! `direct + trust_deposit == fees_in_denom` always holds. Truncation rounds
//! the trust-deposit share down, so any remainder unit goes to the direct
//! payment.
//!
//! ## Effects per line
//!
//! 1. `direct > 0`: transfer from the payer to the beneficiary's grantee.
//! 2. `trust_deposit > 0`: move it into the module account (skipped when the
//!    payer already is the module escrow), then credit it to the
//!    beneficiary's trust deposit and, when an executor is given, to the
//!    executor's as well. `Permission.deposit` grows on both rows.

use serde::{Deserialize, Serialize};
use verana_core::{Address, PermissionId, Rate};

use crate::error::PermError;
use crate::events::{self, Event};
use crate::host::{signed_delta, AnchorId, Bank, Coin, TrustDeposit};
use crate::store::PermissionStore;
use crate::types::Permission;

/// Which fee field of a beneficiary applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeKind {
    /// Charged by a validator for running a validation process.
    Validation,
    /// Charged per credential issued.
    Issuance,
    /// Charged per presentation verified.
    Verification,
}

impl FeeKind {
    /// The fee this permission charges for the action, in trust units.
    pub fn fee_of(&self, perm: &Permission) -> u64 {
        match self {
            Self::Validation => perm.validation_fees,
            Self::Issuance => perm.issuance_fees,
            Self::Verification => perm.verification_fees,
        }
    }
}

impl std::fmt::Display for FeeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::Issuance => "issuance",
            Self::Verification => "verification",
        };
        f.write_str(s)
    }
}

/// Where the funds come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payer {
    /// An account pays at settlement time.
    Account(Address),
    /// Funds already sit in the module escrow account.
    Escrow,
}

/// The arithmetic result for one fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    pub fees_in_denom: u64,
    pub trust_deposit: u64,
    pub direct: u64,
}

/// `fees × trust_unit_price`, checked.
pub fn fees_in_denom(fees: u64, trust_unit_price: u64) -> Result<u64, PermError> {
    fees.checked_mul(trust_unit_price)
        .ok_or(PermError::AmountOverflow("fees_in_denom"))
}

/// Split an amount into its trust-deposit and direct parts.
pub fn split_fee(fees_in_denom: u64, trust_deposit_rate: Rate) -> Result<FeeSplit, PermError> {
    let trust_deposit = trust_deposit_rate
        .mul_floor(fees_in_denom)
        .filter(|td| *td <= fees_in_denom)
        .ok_or(PermError::AmountOverflow("trust_deposit_amount"))?;
    Ok(FeeSplit {
        fees_in_denom,
        trust_deposit,
        direct: fees_in_denom - trust_deposit,
    })
}

/// Fixed inputs of one settlement run.
#[derive(Debug, Clone)]
pub struct SettlementRequest<'a> {
    pub kind: FeeKind,
    pub payer: Payer,
    /// Permission performing the action. Credited alongside each beneficiary.
    pub executor: Option<PermissionId>,
    pub trust_unit_price: u64,
    pub trust_deposit_rate: Rate,
    pub denom: &'a str,
    pub module_account: &'a str,
}

/// What one beneficiary received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementLine {
    pub beneficiary: PermissionId,
    pub grantee: Address,
    pub split: FeeSplit,
    /// Anchor the trust-deposit collaborator routes this grantee's deposit to.
    pub anchor: Option<AnchorId>,
}

/// Everything a settlement run moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReceipt {
    pub kind: FeeKind,
    pub executor: Option<PermissionId>,
    pub lines: Vec<SettlementLine>,
}

impl SettlementReceipt {
    /// Total charged to the payer.
    pub fn total_charged(&self) -> u64 {
        self.lines.iter().map(|l| l.split.fees_in_denom).sum()
    }

    /// Total sent directly to beneficiaries.
    pub fn total_direct(&self) -> u64 {
        self.lines.iter().map(|l| l.split.direct).sum()
    }

    /// Total diverted into trust deposits (counted once per line).
    pub fn total_trust_deposit(&self) -> u64 {
        self.lines.iter().map(|l| l.split.trust_deposit).sum()
    }
}

/// The `settle_fee` event for one settled line.
pub fn settle_event(line: &SettlementLine, kind: FeeKind, executor: Option<PermissionId>) -> Event {
    let mut e = Event::new(events::EVENT_SETTLE_FEE)
        .attr(events::ATTR_FEE_KIND, kind)
        .attr(events::ATTR_BENEFICIARY_PERM_ID, line.beneficiary)
        .attr(events::ATTR_DIRECT_AMOUNT, line.split.direct)
        .attr(events::ATTR_TRUST_DEPOSIT_AMOUNT, line.split.trust_deposit);
    if let Some(executor) = executor {
        e = e.attr(events::ATTR_EXECUTOR_PERM_ID, executor);
    }
    e
}

/// Sum of `fees × trust_unit_price` over the beneficiaries. The payer must
/// hold at least this much before settlement starts. This is exactly what
/// [`settle`] debits: the trust-deposit share is carved out of each fee and
/// no agent reward is added on top.
pub fn required_amount(
    beneficiaries: &[Permission],
    kind: FeeKind,
    trust_unit_price: u64,
) -> Result<u64, PermError> {
    beneficiaries.iter().try_fold(0u64, |acc, b| {
        let owed = fees_in_denom(kind.fee_of(b), trust_unit_price)?;
        acc.checked_add(owed)
            .ok_or(PermError::AmountOverflow("required_amount"))
    })
}

/// Settle `kind` fees for every beneficiary, in order, skipping zero fees.
pub fn settle<H: Bank + TrustDeposit + ?Sized>(
    store: &mut PermissionStore,
    host: &mut H,
    req: &SettlementRequest<'_>,
    beneficiaries: &[Permission],
) -> Result<SettlementReceipt, PermError> {
    let mut lines = Vec::with_capacity(beneficiaries.len());
    for b in beneficiaries {
        let fees = req.kind.fee_of(b);
        if fees == 0 {
            continue;
        }
        let amount = fees_in_denom(fees, req.trust_unit_price)?;
        lines.push(settle_line(store, host, req, b, amount)?);
    }
    Ok(SettlementReceipt {
        kind: req.kind,
        executor: req.executor,
        lines,
    })
}

/// Settle a single amount already expressed in the bond denomination.
pub fn settle_line<H: Bank + TrustDeposit + ?Sized>(
    store: &mut PermissionStore,
    host: &mut H,
    req: &SettlementRequest<'_>,
    beneficiary: &Permission,
    amount: u64,
) -> Result<SettlementLine, PermError> {
    let split = split_fee(amount, req.trust_deposit_rate)?;

    if split.direct > 0 {
        let coin = Coin::new(req.denom, split.direct);
        match &req.payer {
            Payer::Account(from) => host.send_coins(from, &beneficiary.grantee, &coin)?,
            Payer::Escrow => host.send_coins_from_module_to_account(
                req.module_account,
                &beneficiary.grantee,
                &coin,
            )?,
        }
    }

    if split.trust_deposit > 0 {
        if let Payer::Account(from) = &req.payer {
            let coin = Coin::new(req.denom, split.trust_deposit);
            host.send_coins_from_account_to_module(from, req.module_account, &coin)?;
        }
        let delta = signed_delta(split.trust_deposit)?;

        host.adjust_trust_deposit(&beneficiary.grantee, delta)?;
        add_deposit(store, beneficiary.id, split.trust_deposit)?;

        if let Some(executor) = req.executor {
            let executor_grantee = store.require(executor)?.grantee.clone();
            host.adjust_trust_deposit(&executor_grantee, delta)?;
            add_deposit(store, executor, split.trust_deposit)?;
        }
    }

    let anchor = host.anchor_for_operator(&beneficiary.grantee);
    tracing::debug!(
        kind = %req.kind,
        beneficiary = %beneficiary.id,
        direct = split.direct,
        trust_deposit = split.trust_deposit,
        anchored = anchor.is_some(),
        "fee settled"
    );

    Ok(SettlementLine {
        beneficiary: beneficiary.id,
        grantee: beneficiary.grantee.clone(),
        split,
        anchor,
    })
}

fn add_deposit(store: &mut PermissionStore, id: PermissionId, amount: u64) -> Result<(), PermError> {
    store.try_update(id, |p| {
        p.deposit = p
            .deposit
            .checked_add(amount)
            .ok_or(PermError::AmountOverflow("permission deposit"))?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rate(s: &str) -> Rate {
        Rate::parse(s).unwrap()
    }

    #[test]
    fn test_split_half_rounds_trust_deposit_down() {
        let split = split_fee(fees_in_denom(5, 1).unwrap(), rate("0.5")).unwrap();
        assert_eq!(split.trust_deposit, 2);
        assert_eq!(split.direct, 3);
        assert_eq!(split.fees_in_denom, 5);
    }

    #[test]
    fn test_split_default_rate() {
        let split = split_fee(fees_in_denom(5, 1_000_000).unwrap(), rate("0.2")).unwrap();
        assert_eq!(split.fees_in_denom, 5_000_000);
        assert_eq!(split.trust_deposit, 1_000_000);
        assert_eq!(split.direct, 4_000_000);
    }

    #[test]
    fn test_split_edges() {
        assert_eq!(split_fee(9, Rate::ZERO).unwrap().direct, 9);
        assert_eq!(split_fee(9, Rate::ONE).unwrap().trust_deposit, 9);
        assert_eq!(split_fee(0, rate("0.3")).unwrap().direct, 0);
    }

    #[test]
    fn test_rate_above_one_is_rejected() {
        assert!(split_fee(10, rate("1.5")).is_err());
    }

    #[test]
    fn test_price_overflow() {
        assert!(matches!(
            fees_in_denom(u64::MAX, 2),
            Err(PermError::AmountOverflow("fees_in_denom"))
        ));
    }

    #[test]
    fn test_fee_kind_selects_field() {
        let mut p = Permission::new(
            PermissionId(1),
            1,
            crate::types::PermissionType::Issuer,
            verana_core::Did::new("did:example:a").unwrap(),
            Address::new("verana1qqqqqqqq").unwrap(),
            verana_core::Timestamp::parse("2026-01-01T00:00:00Z").unwrap(),
        );
        p.validation_fees = 7;
        p.issuance_fees = 5;
        p.verification_fees = 2;
        assert_eq!(FeeKind::Validation.fee_of(&p), 7);
        assert_eq!(FeeKind::Issuance.fee_of(&p), 5);
        assert_eq!(FeeKind::Verification.fee_of(&p), 2);
        assert_eq!(
            required_amount(&[p.clone(), p], FeeKind::Issuance, 10).unwrap(),
            100
        );
    }

    #[test]
    fn test_settle_event_attributes() {
        let line = SettlementLine {
            beneficiary: PermissionId(3),
            grantee: Address::new("verana1qqqqqqqq").unwrap(),
            split: split_fee(10, rate("0.2")).unwrap(),
            anchor: None,
        };
        let e = settle_event(&line, FeeKind::Verification, Some(PermissionId(9)));
        assert_eq!(e.kind, events::EVENT_SETTLE_FEE);
        assert_eq!(e.attribute(events::ATTR_FEE_KIND), Some("verification"));
        assert_eq!(e.attribute(events::ATTR_DIRECT_AMOUNT), Some("8"));
        assert_eq!(e.attribute(events::ATTR_TRUST_DEPOSIT_AMOUNT), Some("2"));
        assert_eq!(e.attribute(events::ATTR_EXECUTOR_PERM_ID), Some("9"));
        assert_eq!(
            settle_event(&line, FeeKind::Issuance, None).attribute(events::ATTR_EXECUTOR_PERM_ID),
            None
        );
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn split_conserves_every_unit(
                fees in 0u64..=1_000_000_000,
                price in 1u64..=1_000_000,
                millis in 0u128..=1000,
            ) {
                let r = Rate::from_parts(millis, 3).unwrap();
                let total = fees_in_denom(fees, price).unwrap();
                let split = split_fee(total, r).unwrap();
                prop_assert_eq!(split.direct + split.trust_deposit, total);
                // floor(total * millis / 1000)
                let expected = (u128::from(total) * millis / 1000) as u64;
                prop_assert_eq!(split.trust_deposit, expected);
            }
        }
    }
}
