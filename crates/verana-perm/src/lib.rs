//! # verana-perm: Permission & Validation-Process Engine
//!
//! A permission says who may issue, verify or hold credentials under a
//! credential schema. Permissions form a tree through `validator_perm_id`:
//! each one was validated by its parent, up to an ECOSYSTEM root created by
//! the trust-registry controller.
//!
//! ## Components
//!
//! - [`store`]: the permission arena, session map and id counters.
//! - [`beneficiary`]: the bounded walk up the validator chain that decides
//!   who is paid.
//! - [`settlement`]: splits each fee into a direct transfer and a
//!   trust-deposit contribution.
//! - [`vp`]: the validation-process state machine and the other
//!   permission-mutating handlers.
//! - [`session`]: permission sessions for credential exchanges.
//! - [`query`]: read-only lookups.
//! - [`keeper`]: transaction entry point with all-or-nothing rollback.
//!
//! Bank, trust-deposit, credential-schema and trust-registry state live in
//! other ledger modules and are reached through the traits in [`host`]. The
//! `mock` feature (on by default) provides an in-memory [`mock::MockHost`].
//!
//! ## Crate Policy
//!
//! - No floats: amounts are `u64`, ratios are [`verana_core::Rate`].
//! - No wall-clock reads: "now" comes from [`keeper::BlockContext`].
//! - No `.unwrap()` outside tests.

pub mod beneficiary;
pub mod error;
pub mod events;
pub mod host;
pub mod keeper;
pub mod msgs;
pub mod params;
pub mod query;
pub mod session;
pub mod settlement;
pub mod store;
pub mod types;
pub mod vp;

#[cfg(feature = "mock")]
pub mod mock;

pub use error::{ErrorCategory, PermError};
pub use events::Event;
pub use host::{
    AnchorId, Bank, Coin, CredentialSchemaInfo, CredentialSchemas, Host, HostError, TrustDeposit,
    TrustRegistries, TrustRegistryInfo,
};
pub use keeper::{BlockContext, Keeper};
pub use msgs::{Msg, MsgResponse};
pub use params::PermParams;
pub use settlement::{FeeKind, Payer};
pub use store::PermissionStore;
pub use types::{
    PermManagementMode, Permission, PermissionSession, PermissionType, SessionAuthz,
    ValidationState,
};
