//! # Queries
//!
//! Read-only views over the permission store. Nothing here mutates state
//! or touches the host beyond schema lookups.

use serde::{Deserialize, Serialize};
use verana_core::{CountryCode, Did, PermissionId, Timestamp};

use crate::beneficiary;
use crate::error::PermError;
use crate::host::Host;
use crate::keeper::Keeper;
use crate::types::{Permission, PermissionSession, PermissionType};

/// Paging for list queries. Results are ordered by `modified`, then id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Only records modified strictly after this instant.
    pub modified_after: Option<Timestamp>,
    /// Page size; the configured default when absent.
    pub response_max_size: Option<u32>,
}

/// Filter for [`Keeper::find_permissions_with_did`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindPermissionsWithDid {
    pub did: Did,
    #[serde(rename = "type")]
    pub perm_type: PermissionType,
    pub schema_id: u64,
    pub country: Option<CountryCode>,
    /// Instant the permissions must be valid at; block time when absent.
    pub when: Option<Timestamp>,
}

impl<H: Host> Keeper<H> {
    pub fn get_permission(&self, id: u64) -> Result<&Permission, PermError> {
        self.store.require(PermissionId(id))
    }

    pub fn get_permission_session(&self, id: &str) -> Result<&PermissionSession, PermError> {
        self.store
            .session(id)
            .ok_or_else(|| PermError::SessionNotFound(id.to_string()))
    }

    fn page_size(&self, page: &PageRequest) -> Result<usize, PermError> {
        let size = page
            .response_max_size
            .unwrap_or(self.params.default_response_max_size);
        if size == 0 || size > self.params.max_response_max_size {
            return Err(PermError::InvalidRequest(format!(
                "response_max_size must be between 1 and {}, got {size}",
                self.params.max_response_max_size
            )));
        }
        Ok(size as usize)
    }

    pub fn list_permissions(&self, page: &PageRequest) -> Result<Vec<Permission>, PermError> {
        let size = self.page_size(page)?;
        let mut rows: Vec<&Permission> = self
            .store
            .permissions()
            .filter(|p| page.modified_after.map_or(true, |after| p.modified > after))
            .collect();
        rows.sort_by_key(|p| (p.modified, p.id));
        Ok(rows.into_iter().take(size).cloned().collect())
    }

    pub fn list_permission_sessions(
        &self,
        page: &PageRequest,
    ) -> Result<Vec<PermissionSession>, PermError> {
        let size = self.page_size(page)?;
        let mut rows: Vec<&PermissionSession> = self
            .store
            .sessions()
            .filter(|s| page.modified_after.map_or(true, |after| s.modified > after))
            .collect();
        rows.sort_by(|a, b| (a.modified, &a.id).cmp(&(b.modified, &b.id)));
        Ok(rows.into_iter().take(size).cloned().collect())
    }

    /// Permissions of `did` with the given type and schema that can act at
    /// `when` and serve `country`.
    pub fn find_permissions_with_did(
        &self,
        filter: &FindPermissionsWithDid,
        now: Timestamp,
    ) -> Vec<Permission> {
        let when = filter.when.unwrap_or(now);
        self.store
            .permissions_for_schema(filter.schema_id)
            .filter(|p| {
                p.did == filter.did
                    && p.perm_type == filter.perm_type
                    && p.serves_country(filter.country)
                    && p.is_active_at(when)
            })
            .cloned()
            .collect()
    }

    /// Who would be paid for an exchange between these permissions.
    /// Zero means "not involved".
    pub fn find_beneficiaries(
        &self,
        issuer_perm_id: u64,
        verifier_perm_id: u64,
    ) -> Result<Vec<Permission>, PermError> {
        beneficiary::find_beneficiaries(
            &self.store,
            &self.host,
            PermissionId::from_wire(issuer_perm_id),
            PermissionId::from_wire(verifier_perm_id),
            self.params.max_validator_chain_depth,
        )
    }
}
