//! Shared fixture for the keeper integration tests: one trust registry, one
//! credential schema, funded accounts and a controllable block clock.

#![allow(dead_code)]

use verana_core::{Address, CountryCode, Did, PermissionId, Rate, Timestamp};
use verana_perm::mock::MockHost;
use verana_perm::msgs::{
    MsgCreatePermission, MsgCreateRootPermission, MsgSetPermissionVpToValidated,
    MsgStartPermissionVp,
};
use verana_perm::{
    BlockContext, CredentialSchemaInfo, Keeper, Msg, MsgResponse, PermError, PermManagementMode,
    PermParams, Permission, PermissionType, TrustRegistryInfo,
};

pub const SCHEMA_ID: u64 = 1;
pub const TR_ID: u64 = 1;
pub const FUNDING: u64 = 1_000_000;
pub const T0: &str = "2026-01-01T00:00:00Z";

pub fn addr(s: &str) -> Address {
    Address::new(s).unwrap()
}

pub fn ts(s: &str) -> Timestamp {
    Timestamp::parse(s).unwrap()
}

pub fn did(s: &str) -> Did {
    Did::new(format!("did:example:{s}")).unwrap()
}

pub fn country(s: &str) -> CountryCode {
    CountryCode::new(s).unwrap()
}

pub fn controller() -> Address {
    addr("verana1cccccccc")
}
pub fn grantor() -> Address {
    addr("verana1gggggggg")
}
pub fn issuer() -> Address {
    addr("verana1ssssssss")
}
pub fn verifier() -> Address {
    addr("verana1vvvvvvvv")
}
pub fn holder() -> Address {
    addr("verana1hhhhhhhh")
}
pub fn agent() -> Address {
    addr("verana1aaaaaaaa")
}
pub fn outsider() -> Address {
    addr("verana1wwwwwwww")
}
pub fn governance() -> Address {
    addr("verana1mmmmmmmm")
}

/// Schema with two-year issuer and verifier validity and one-year grantor
/// validity.
pub fn schema(issuer_mode: PermManagementMode, verifier_mode: PermManagementMode) -> CredentialSchemaInfo {
    CredentialSchemaInfo {
        id: SCHEMA_ID,
        tr_id: TR_ID,
        issuer_perm_management_mode: issuer_mode,
        verifier_perm_management_mode: verifier_mode,
        issuer_grantor_validation_validity_period: 365,
        verifier_grantor_validation_validity_period: 365,
        issuer_validation_validity_period: 730,
        verifier_validation_validity_period: 730,
        holder_validation_validity_period: 0,
    }
}

/// Route engine logs to the test writer. `RUST_LOG=verana_perm=debug` shows
/// settlement lines.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct Fixture {
    pub keeper: Keeper<MockHost>,
    pub height: u64,
    pub now: Timestamp,
}

impl Fixture {
    pub fn new(issuer_mode: PermManagementMode, verifier_mode: PermManagementMode) -> Self {
        Self::with_params(issuer_mode, verifier_mode, PermParams::default(), 1)
    }

    pub fn with_params(
        issuer_mode: PermManagementMode,
        verifier_mode: PermManagementMode,
        params: PermParams,
        trust_unit_price: u64,
    ) -> Self {
        init_tracing();
        let mut host = MockHost::new(params.bond_denom.clone(), trust_unit_price)
            .with_schema(schema(issuer_mode, verifier_mode))
            .with_registry(TrustRegistryInfo {
                id: TR_ID,
                controller: controller(),
            });
        for who in [controller(), grantor(), issuer(), verifier(), holder(), agent(), outsider()] {
            host.fund(&who, FUNDING);
        }
        Self {
            keeper: Keeper::new(host, params, governance()).unwrap(),
            height: 0,
            now: ts(T0),
        }
    }

    pub fn with_rate(mut self, rate: &str) -> Self {
        let mut params = self.keeper.params().clone();
        params.trust_deposit_rate = Rate::parse(rate).unwrap();
        let msg = Msg::UpdateParams(verana_perm::msgs::MsgUpdateParams {
            authority: governance(),
            params,
        });
        self.deliver(msg).unwrap();
        self
    }

    pub fn advance_days(&mut self, days: u32) {
        self.now = self.now.checked_add_days(days).unwrap();
    }

    pub fn deliver(&mut self, msg: Msg) -> Result<MsgResponse, PermError> {
        self.height += 1;
        self.keeper
            .deliver(&BlockContext::new(self.height, self.now), msg)
    }

    pub fn perm(&self, id: PermissionId) -> Permission {
        self.keeper.get_permission(id.get()).unwrap().clone()
    }

    pub fn host(&self) -> &MockHost {
        self.keeper.host()
    }

    /// ECOSYSTEM root owned by the registry controller.
    pub fn create_root(&mut self, validation: u64, issuance: u64, verification: u64) -> PermissionId {
        let msg = Msg::CreateRootPermission(MsgCreateRootPermission {
            creator: controller(),
            schema_id: SCHEMA_ID,
            did: did("ecosystem"),
            country: None,
            effective_from: None,
            effective_until: None,
            validation_fees: validation,
            issuance_fees: issuance,
            verification_fees: verification,
        });
        created(self.deliver(msg).unwrap())
    }

    /// Self-created ISSUER or VERIFIER permission under an OPEN schema.
    pub fn create_open(&mut self, who: &Address, perm_type: PermissionType, verification_fees: u64) -> PermissionId {
        let msg = Msg::CreatePermission(MsgCreatePermission {
            creator: who.clone(),
            schema_id: SCHEMA_ID,
            perm_type,
            did: did(who.as_str().trim_start_matches("verana1")),
            country: None,
            effective_from: None,
            effective_until: None,
            verification_fees,
        });
        created(self.deliver(msg).unwrap())
    }

    pub fn start(
        &mut self,
        who: &Address,
        perm_type: PermissionType,
        validator: PermissionId,
        country: Option<CountryCode>,
    ) -> Result<PermissionId, PermError> {
        let msg = Msg::StartPermissionVp(MsgStartPermissionVp {
            creator: who.clone(),
            perm_type,
            validator_perm_id: validator.get(),
            did: did(who.as_str().trim_start_matches("verana1")),
            country,
        });
        self.deliver(msg).map(created)
    }

    pub fn validate(
        &mut self,
        validator: &Address,
        id: PermissionId,
        fees: (u64, u64, u64),
        effective_until: Option<Timestamp>,
        country: Option<CountryCode>,
    ) -> Result<MsgResponse, PermError> {
        self.deliver(validate_msg(validator, id, fees, effective_until, country))
    }

    /// Root → validated applicant in one go. Returns the applicant id.
    pub fn validated(
        &mut self,
        validator_grantee: &Address,
        validator: PermissionId,
        who: &Address,
        perm_type: PermissionType,
        fees: (u64, u64, u64),
    ) -> PermissionId {
        let id = self.start(who, perm_type, validator, None).unwrap();
        self.validate(validator_grantee, id, fees, None, None).unwrap();
        id
    }
}

pub fn validate_msg(
    validator: &Address,
    id: PermissionId,
    fees: (u64, u64, u64),
    effective_until: Option<Timestamp>,
    country: Option<CountryCode>,
) -> Msg {
    Msg::SetPermissionVpToValidated(MsgSetPermissionVpToValidated {
        creator: validator.clone(),
        id: id.get(),
        effective_until,
        validation_fees: fees.0,
        issuance_fees: fees.1,
        verification_fees: fees.2,
        country,
        issuance_fee_discount: Rate::ZERO,
        verification_fee_discount: Rate::ZERO,
        vp_summary_digest_sri: None,
    })
}

pub fn created(resp: MsgResponse) -> PermissionId {
    match resp {
        MsgResponse::PermissionCreated(id) => id,
        other => panic!("expected a created permission, got {other:?}"),
    }
}
