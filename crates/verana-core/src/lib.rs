//! # verana-core: Foundational Types for the Verana Ledger
//!
//! Leaf crate of the workspace. It defines the primitives the permission
//! engine builds on and depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Validated newtypes.** `Address`, `Did`, `CountryCode` and `DigestSri`
//!    can only be built through constructors that check their syntax, so a
//!    handler holding one never re-validates it.
//!
//! 2. **No floats for money.** Amounts are `u64` in the smallest denomination
//!    and ratios are [`Rate`], an 18-decimal fixed-point value that multiplies
//!    with floor truncation.
//!
//! 3. **UTC-only timestamps.** [`Timestamp`] is seconds precision with a `Z`
//!    suffix. The ledger supplies "now"; nothing here reads the wall clock.
//!
//! ## Crate Policy
//!
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod identity;
pub mod rate;
pub mod temporal;

pub use error::ValidationError;
pub use identity::{Address, CountryCode, Did, DigestSri, PermissionId};
pub use rate::Rate;
pub use temporal::Timestamp;
