//! # Safety Tests
//!
//! Malformed validator chains, transaction atomicity when a collaborator
//! fails halfway, and the read-only queries over a populated store.

mod common;

use common::*;
use verana_core::PermissionId;
use verana_perm::query::{FindPermissionsWithDid, PageRequest};
use verana_perm::{
    Msg, PermError, PermManagementMode::*, PermParams, Permission, PermissionType,
    ValidationState,
};

/// Insert a VALIDATED chain `1 ← 2 ← … ← len` straight into the store.
fn seed_chain(f: &mut Fixture, len: u64, excluded: &[bool]) {
    for i in 1..=len {
        let id = f.keeper.store_mut().next_permission_id().unwrap();
        let perm_type = if i == 1 {
            PermissionType::Ecosystem
        } else {
            PermissionType::Issuer
        };
        let mut p = Permission::new(id, SCHEMA_ID, perm_type, did("n"), controller(), f.now);
        p.validator_perm_id = (i > 1).then(|| PermissionId(i - 1));
        p.effective_from = Some(f.now);
        p.vp_state = ValidationState::Validated;
        if excluded.get(i as usize - 1).copied().unwrap_or(false) {
            p.slashed_deposit = 1;
        }
        f.keeper.store_mut().insert(p);
    }
}

// ─── Chain safety ────────────────────────────────────────────────────

#[test]
fn cyclic_chain_fails_closed() {
    let mut f = Fixture::new(TrustRegistryValidation, TrustRegistryValidation);
    let root = f.create_root(0, 3, 0);
    let iss = f.validated(&controller(), root, &issuer(), PermissionType::Issuer, (0, 2, 0));
    let agent_perm = f.validated(&controller(), root, &agent(), PermissionType::Issuer, (0, 0, 0));

    f.keeper
        .store_mut()
        .try_update(root, |p| {
            p.validator_perm_id = Some(iss);
            Ok(())
        })
        .unwrap();

    assert!(matches!(
        f.keeper.find_beneficiaries(iss.get(), 0),
        Err(PermError::ValidatorChainCycle { .. })
    ));

    let err = f
        .deliver(Msg::CreateOrUpdatePermissionSession(
            verana_perm::msgs::MsgCreateOrUpdatePermissionSession {
                creator: agent(),
                id: "loop".into(),
                issuer_perm_id: iss.get(),
                verifier_perm_id: 0,
                agent_perm_id: agent_perm.get(),
                wallet_agent_perm_id: 0,
            },
        ))
        .unwrap_err();
    assert!(matches!(err, PermError::ValidatorChainCycle { .. }));
    assert_eq!(f.host().balance(&agent()), FUNDING);
}

#[test]
fn overlong_chain_hits_depth_bound() {
    let params = PermParams {
        max_validator_chain_depth: 4,
        ..PermParams::default()
    };
    let mut f = Fixture::with_params(TrustRegistryValidation, TrustRegistryValidation, params, 1);
    seed_chain(&mut f, 10, &[]);
    assert!(matches!(
        f.keeper.find_beneficiaries(10, 0),
        Err(PermError::ValidatorChainCycle { max_depth: 4, .. })
    ));
    assert_eq!(f.keeper.find_beneficiaries(5, 0).unwrap().len(), 5);
}

// ─── Atomicity ───────────────────────────────────────────────────────

#[test]
fn start_rolls_back_transfer_when_deposit_adjustment_fails() {
    let mut f = Fixture::new(TrustRegistryValidation, TrustRegistryValidation);
    let root = f.create_root(10, 0, 0);
    let events_before = f.keeper.events().len();
    let next_id = f.keeper.store().counter("permission");
    f.keeper.host_mut().reject_trust_deposit_for(&issuer());

    let err = f
        .start(&issuer(), PermissionType::Issuer, root, None)
        .unwrap_err();
    assert!(matches!(err, PermError::Host(_)));
    assert_eq!(f.host().balance(&issuer()), FUNDING);
    assert_eq!(f.host().module_balance("perm"), 0);
    assert_eq!(f.keeper.store().counter("permission"), next_id);
    assert_eq!(f.keeper.events().len(), events_before);
}

#[test]
fn validation_rolls_back_payout_when_settlement_fails() {
    let mut f = Fixture::new(TrustRegistryValidation, TrustRegistryValidation);
    let root = f.create_root(10, 0, 0);
    let id = f.start(&issuer(), PermissionType::Issuer, root, None).unwrap();
    f.keeper.host_mut().reject_trust_deposit_for(&controller());

    // The direct share is paid before the deposit credit fails.
    assert!(f.validate(&controller(), id, (0, 0, 0), None, None).is_err());
    let p = f.perm(id);
    assert_eq!(p.vp_state, ValidationState::Pending);
    assert_eq!(p.vp_current_fees, 10);
    assert_eq!(f.host().balance(&controller()), FUNDING);
    assert_eq!(f.host().module_balance("perm"), 12);
    assert_eq!(f.perm(root).deposit, 0);
}

// ─── Queries ─────────────────────────────────────────────────────────

#[test]
fn find_permissions_with_did_respects_window_and_country() {
    let mut f = Fixture::new(TrustRegistryValidation, TrustRegistryValidation);
    let root = f.create_root(0, 0, 0);
    let id = f
        .start(&issuer(), PermissionType::Issuer, root, Some(country("DE")))
        .unwrap();
    f.validate(
        &controller(),
        id,
        (0, 0, 0),
        Some(ts("2026-06-01T00:00:00Z")),
        Some(country("DE")),
    )
    .unwrap();

    let query = |country_code: Option<&str>, when: Option<&str>| FindPermissionsWithDid {
        did: did("ssssssss"),
        perm_type: PermissionType::Issuer,
        schema_id: SCHEMA_ID,
        country: country_code.map(country),
        when: when.map(ts),
    };
    let now = f.now;
    assert_eq!(f.keeper.find_permissions_with_did(&query(None, None), now).len(), 1);
    assert_eq!(f.keeper.find_permissions_with_did(&query(Some("DE"), None), now).len(), 1);
    assert!(f.keeper.find_permissions_with_did(&query(Some("FR"), None), now).is_empty());
    assert!(f
        .keeper
        .find_permissions_with_did(&query(None, Some("2026-06-01T00:00:00Z")), now)
        .is_empty());
    assert!(f
        .keeper
        .find_permissions_with_did(&query(None, Some("2025-12-31T00:00:00Z")), now)
        .is_empty());
}

#[test]
fn list_permissions_orders_by_modification() {
    let mut f = Fixture::new(TrustRegistryValidation, TrustRegistryValidation);
    let root = f.create_root(0, 0, 0);
    let a = f.start(&issuer(), PermissionType::Issuer, root, None).unwrap();
    f.advance_days(1);
    let b = f.start(&verifier(), PermissionType::Verifier, root, None).unwrap();
    f.advance_days(1);
    f.validate(&controller(), a, (0, 0, 0), None, None).unwrap();

    let ids: Vec<_> = f
        .keeper
        .list_permissions(&PageRequest::default())
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(ids, vec![root, b, a]);

    let page = f
        .keeper
        .list_permissions(&PageRequest {
            modified_after: Some(ts(T0)),
            response_max_size: Some(10),
        })
        .unwrap();
    assert_eq!(page.len(), 2);
    assert!(f
        .keeper
        .list_permissions(&PageRequest {
            modified_after: None,
            response_max_size: Some(5000),
        })
        .is_err());
}

#[test]
fn params_update_requires_governance() {
    let mut f = Fixture::new(Open, Open);
    let params = PermParams {
        max_validator_chain_depth: 8,
        ..PermParams::default()
    };
    let msg = |authority| {
        Msg::UpdateParams(verana_perm::msgs::MsgUpdateParams {
            authority,
            params: params.clone(),
        })
    };
    assert!(matches!(f.deliver(msg(outsider())), Err(PermError::Unauthorized { .. })));
    f.deliver(msg(governance())).unwrap();
    assert_eq!(f.keeper.params().max_validator_chain_depth, 8);
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn chain_resolution_skips_exactly_the_excluded(
            excluded in proptest::collection::vec(any::<bool>(), 1..12),
        ) {
            let mut f = Fixture::new(TrustRegistryValidation, TrustRegistryValidation);
            let len = excluded.len() as u64;
            seed_chain(&mut f, len, &excluded);

            let found: Vec<u64> = f
                .keeper
                .find_beneficiaries(len, 0)
                .unwrap()
                .iter()
                .map(|p| p.id.get())
                .collect();
            let expected: Vec<u64> = (1..=len)
                .rev()
                .filter(|i| !excluded[*i as usize - 1])
                .collect();
            prop_assert_eq!(found, expected);
        }
    }
}
