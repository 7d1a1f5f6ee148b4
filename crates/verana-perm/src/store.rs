//! # Permission Store
//!
//! In-memory arena of permission rows and permission sessions, plus the
//! per-entity-type id counters.
//!
//! Maps are `BTreeMap` so every walk over the store visits rows in id order
//! and all nodes replaying a block see the same iteration sequence. The
//! store is `Clone`; the keeper snapshots it before each transaction and
//! restores the snapshot on abort.

use std::collections::BTreeMap;

use verana_core::PermissionId;

use crate::error::PermError;
use crate::types::{Permission, PermissionSession};

/// Counter key for permission ids.
pub const PERMISSION_COUNTER: &str = "permission";

/// Keyed permission and session records with a monotonic id allocator.
#[derive(Debug, Clone, Default)]
pub struct PermissionStore {
    permissions: BTreeMap<PermissionId, Permission>,
    sessions: BTreeMap<String, PermissionSession>,
    counters: BTreeMap<String, u64>,
}

impl PermissionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // ── id allocation ──

    /// Allocate the next id for `entity`. Ids start at 1 and never repeat.
    pub fn allocate_id(&mut self, entity: &str) -> Result<u64, PermError> {
        let counter = self.counters.entry(entity.to_string()).or_insert(0);
        let next = counter
            .checked_add(1)
            .ok_or(PermError::AmountOverflow("id counter"))?;
        *counter = next;
        Ok(next)
    }

    /// Allocate a permission id.
    pub fn next_permission_id(&mut self) -> Result<PermissionId, PermError> {
        self.allocate_id(PERMISSION_COUNTER).map(PermissionId)
    }

    /// Current value of a counter (the last id handed out, 0 if none).
    pub fn counter(&self, entity: &str) -> u64 {
        self.counters.get(entity).copied().unwrap_or(0)
    }

    // ── permissions ──

    /// Retrieve a permission by id.
    pub fn get(&self, id: PermissionId) -> Option<&Permission> {
        self.permissions.get(&id)
    }

    /// Retrieve a permission or fail with `PermissionNotFound`.
    pub fn require(&self, id: PermissionId) -> Result<&Permission, PermError> {
        self.get(id).ok_or(PermError::PermissionNotFound(id))
    }

    /// Insert or overwrite a row, returning the previous value.
    pub fn insert(&mut self, perm: Permission) -> Option<Permission> {
        self.permissions.insert(perm.id, perm)
    }

    /// Read-validate-update a row in place.
    ///
    /// Returns `PermissionNotFound` if the row is missing, otherwise the
    /// closure's result. A closure that fails must leave the row untouched
    /// or rely on the keeper's rollback.
    pub fn try_update<R>(
        &mut self,
        id: PermissionId,
        f: impl FnOnce(&mut Permission) -> Result<R, PermError>,
    ) -> Result<R, PermError> {
        let perm = self
            .permissions
            .get_mut(&id)
            .ok_or(PermError::PermissionNotFound(id))?;
        f(perm)
    }

    /// All permissions in id order.
    pub fn permissions(&self) -> impl Iterator<Item = &Permission> {
        self.permissions.values()
    }

    /// All permissions of a schema in id order.
    pub fn permissions_for_schema(&self, schema_id: u64) -> impl Iterator<Item = &Permission> {
        self.permissions
            .values()
            .filter(move |p| p.schema_id == schema_id)
    }

    /// Number of permission rows.
    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    /// Whether no permission has been stored.
    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    // ── sessions ──

    /// Retrieve a session by id.
    pub fn session(&self, id: &str) -> Option<&PermissionSession> {
        self.sessions.get(id)
    }

    /// Insert or overwrite a session.
    pub fn put_session(&mut self, session: PermissionSession) {
        self.sessions.insert(session.id.clone(), session);
    }

    /// All sessions in id order.
    pub fn sessions(&self) -> impl Iterator<Item = &PermissionSession> {
        self.sessions.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PermissionType;
    use verana_core::{Address, Did, Timestamp};

    fn row(id: u64, schema_id: u64) -> Permission {
        Permission::new(
            PermissionId(id),
            schema_id,
            PermissionType::Holder,
            Did::new("did:example:holder").unwrap(),
            Address::new("verana1qqqqqqqq").unwrap(),
            Timestamp::parse("2026-01-01T00:00:00Z").unwrap(),
        )
    }

    #[test]
    fn test_allocate_is_monotonic_per_entity() {
        let mut store = PermissionStore::new();
        assert_eq!(store.next_permission_id().unwrap(), PermissionId(1));
        assert_eq!(store.next_permission_id().unwrap(), PermissionId(2));
        assert_eq!(store.allocate_id("other").unwrap(), 1);
        assert_eq!(store.counter(PERMISSION_COUNTER), 2);
        assert_eq!(store.counter("unused"), 0);
    }

    #[test]
    fn test_require_missing() {
        let store = PermissionStore::new();
        assert!(matches!(
            store.require(PermissionId(5)),
            Err(PermError::PermissionNotFound(PermissionId(5)))
        ));
    }

    #[test]
    fn test_try_update_mutates_in_place() {
        let mut store = PermissionStore::new();
        store.insert(row(1, 10));
        store
            .try_update(PermissionId(1), |p| {
                p.deposit += 7;
                Ok(())
            })
            .unwrap();
        assert_eq!(store.require(PermissionId(1)).unwrap().deposit, 7);
        assert!(store.try_update(PermissionId(2), |_| Ok(())).is_err());
    }

    #[test]
    fn test_schema_filter_is_id_ordered() {
        let mut store = PermissionStore::new();
        store.insert(row(3, 10));
        store.insert(row(1, 10));
        store.insert(row(2, 11));
        let ids: Vec<u64> = store.permissions_for_schema(10).map(|p| p.id.0).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut store = PermissionStore::new();
        store.insert(row(1, 10));
        let snapshot = store.clone();
        store.insert(row(2, 10));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.len(), 2);
    }
}
