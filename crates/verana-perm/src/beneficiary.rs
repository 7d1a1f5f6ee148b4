//! # Beneficiary Resolution
//!
//! Decides which permissions are paid when a credential is issued or
//! verified.
//!
//! - **OPEN schemas**: the schema's ECOSYSTEM root takes every fee. No chain
//!   walk happens.
//! - **Validated schemas** (grantor or trust-registry validation): the issuer
//!   permission and then the verifier permission are included, each followed
//!   by its validator chain up to the root. Excluded permissions (revoked,
//!   terminated, slashed) are skipped; each id appears at most once, in
//!   first-seen order.
//!
//! ## Chain Safety
//!
//! `validator_perm_id` pointers are data, not structure: a corrupted or
//! adversarial row can point back into its own chain. Every walk carries a
//! visited set and a hop bound and fails with `ValidatorChainCycle` instead
//! of looping.

use std::collections::BTreeSet;

use verana_core::PermissionId;

use crate::error::PermError;
use crate::host::CredentialSchemas;
use crate::store::PermissionStore;
use crate::types::{PermManagementMode, Permission, PermissionType};

/// Visit `start` and then each validator above it, up to a root.
///
/// Fails with `ValidatorChainCycle` if an id repeats or the chain is longer
/// than `max_depth` hops, and with `PermissionNotFound` if a pointer
/// dangles.
pub fn walk_validator_chain<'a>(
    store: &'a PermissionStore,
    start: PermissionId,
    max_depth: u32,
    mut visit: impl FnMut(&'a Permission),
) -> Result<(), PermError> {
    let mut visited = BTreeSet::new();
    let mut current = Some(start);
    let mut hops: u32 = 0;

    while let Some(id) = current {
        if hops > max_depth || !visited.insert(id) {
            tracing::warn!(
                start = %start,
                at = %id,
                hops,
                max_depth,
                "validator chain bound tripped"
            );
            return Err(PermError::ValidatorChainCycle { start, max_depth });
        }
        let perm = store.require(id)?;
        visit(perm);
        current = perm.validator_perm_id;
        hops += 1;
    }
    Ok(())
}

/// The unique active ECOSYSTEM permission of a schema, lowest id first.
pub fn ecosystem_permission(store: &PermissionStore, schema_id: u64) -> Option<&Permission> {
    store
        .permissions_for_schema(schema_id)
        .find(|p| p.perm_type == PermissionType::Ecosystem && !p.is_excluded())
}

/// Resolve the ordered, deduplicated set of fee beneficiaries.
///
/// At least one of `issuer` / `verifier` must be given. When both are given
/// they must belong to the same schema.
pub fn find_beneficiaries<S: CredentialSchemas + ?Sized>(
    store: &PermissionStore,
    schemas: &S,
    issuer: Option<PermissionId>,
    verifier: Option<PermissionId>,
    max_depth: u32,
) -> Result<Vec<Permission>, PermError> {
    let issuer_perm = issuer.map(|id| store.require(id)).transpose()?;
    let verifier_perm = verifier.map(|id| store.require(id)).transpose()?;

    let schema_id = match (issuer_perm, verifier_perm) {
        (Some(i), Some(v)) if i.schema_id != v.schema_id => {
            return Err(PermError::InvalidRequest(format!(
                "issuer permission {} (schema {}) and verifier permission {} (schema {}) belong to different schemas",
                i.id, i.schema_id, v.id, v.schema_id
            )));
        }
        (Some(p), _) | (None, Some(p)) => p.schema_id,
        (None, None) => {
            return Err(PermError::InvalidRequest(
                "at least one of issuer_perm_id or verifier_perm_id must be provided".into(),
            ));
        }
    };

    let cs = schemas
        .credential_schema(schema_id)
        .ok_or(PermError::CredentialSchemaNotFound(schema_id))?;

    let open = (issuer.is_some() && cs.issuer_perm_management_mode == PermManagementMode::Open)
        || (verifier.is_some() && cs.verifier_perm_management_mode == PermManagementMode::Open);

    if open {
        let found: Vec<Permission> = ecosystem_permission(store, schema_id)
            .cloned()
            .into_iter()
            .collect();
        tracing::debug!(schema_id, count = found.len(), "open-mode beneficiaries resolved");
        return Ok(found);
    }

    let mut found = Vec::new();
    let mut seen = BTreeSet::new();
    for start in [issuer, verifier].into_iter().flatten() {
        walk_validator_chain(store, start, max_depth, |perm| {
            if !perm.is_excluded() && seen.insert(perm.id) {
                found.push(perm.clone());
            }
        })?;
    }
    tracing::debug!(schema_id, count = found.len(), "chain beneficiaries resolved");
    Ok(found)
}
