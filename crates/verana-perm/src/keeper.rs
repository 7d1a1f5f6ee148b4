//! # Keeper: Transaction Entry Point
//!
//! [`Keeper::deliver`] applies one message as one transaction:
//!
//! 1. `validate_basic()` rejects malformed input before any state is read.
//! 2. The store, the event buffer and the host collaborators are
//!    checkpointed.
//! 3. The handler runs.
//! 4. On error all three are restored, so a failure after a partial fee
//!    transfer leaves no trace.
//!
//! Transactions are applied one at a time in the order the host ledger
//! fixes. The keeper holds no locks and spawns nothing.

use verana_core::{Address, Timestamp};

use crate::error::PermError;
use crate::events::{self, Event};
use crate::host::Host;
use crate::msgs::{Msg, MsgResponse, MsgUpdateParams};
use crate::params::PermParams;
use crate::store::PermissionStore;

/// Block metadata supplied by the host ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockContext {
    pub height: u64,
    /// Block time. The only source of "now".
    pub time: Timestamp,
}

impl BlockContext {
    pub fn new(height: u64, time: Timestamp) -> Self {
        Self { height, time }
    }
}

/// Owns permission state and drives handlers against a [`Host`].
#[derive(Debug)]
pub struct Keeper<H: Host> {
    pub(crate) store: PermissionStore,
    pub(crate) host: H,
    pub(crate) params: PermParams,
    /// Governance account allowed to update params.
    pub(crate) authority: Address,
    pub(crate) events: Vec<Event>,
}

impl<H: Host> Keeper<H> {
    /// Create a keeper with an empty store. Fails if `params` are invalid.
    pub fn new(host: H, params: PermParams, authority: Address) -> Result<Self, PermError> {
        params.validate()?;
        Ok(Self {
            store: PermissionStore::new(),
            host,
            params,
            authority,
            events: Vec::new(),
        })
    }

    /// Apply one message atomically.
    pub fn deliver(&mut self, ctx: &BlockContext, msg: Msg) -> Result<MsgResponse, PermError> {
        msg.validate_basic()?;

        let name = msg.name();
        let signer = msg.signer().clone();
        let store_snapshot = self.store.clone();
        let events_mark = self.events.len();
        let checkpoint = self.host.checkpoint();

        match self.dispatch(ctx, msg) {
            Ok(response) => Ok(response),
            Err(err) => {
                self.store = store_snapshot;
                self.events.truncate(events_mark);
                self.host.revert(checkpoint);
                tracing::warn!(
                    msg = name,
                    height = ctx.height,
                    signer = %signer,
                    error = %err,
                    "transaction rolled back"
                );
                Err(err)
            }
        }
    }

    fn dispatch(&mut self, ctx: &BlockContext, msg: Msg) -> Result<MsgResponse, PermError> {
        let now = ctx.time;
        match msg {
            Msg::StartPermissionVp(m) => self.start_permission_vp(m, now),
            Msg::RenewPermissionVp(m) => self.renew_permission_vp(m, now),
            Msg::SetPermissionVpToValidated(m) => self.set_permission_vp_to_validated(m, now),
            Msg::ExtendPermission(m) => self.extend_permission(m, now),
            Msg::RevokePermission(m) => self.revoke_permission(m, now),
            Msg::CancelPermissionVpLastRequest(m) => self.cancel_permission_vp_last_request(m, now),
            Msg::RequestPermissionVpTermination(m) => {
                self.request_permission_vp_termination(m, now)
            }
            Msg::ConfirmPermissionVpTermination(m) => {
                self.confirm_permission_vp_termination(m, now)
            }
            Msg::CreateRootPermission(m) => self.create_root_permission(m, now),
            Msg::CreatePermission(m) => self.create_permission(m, now),
            Msg::CreateOrUpdatePermissionSession(m) => {
                self.create_or_update_permission_session(m, now)
            }
            Msg::SlashPermissionTrustDeposit(m) => self.slash_permission_trust_deposit(m, now),
            Msg::RepayPermissionSlashedTrustDeposit(m) => {
                self.repay_permission_slashed_trust_deposit(m, now)
            }
            Msg::UpdateParams(m) => self.update_params(m, now),
        }
    }

    fn update_params(&mut self, msg: MsgUpdateParams, now: Timestamp) -> Result<MsgResponse, PermError> {
        if msg.authority != self.authority {
            return Err(PermError::Unauthorized {
                caller: msg.authority,
                action: "update permission params",
            });
        }
        msg.params.validate()?;
        self.params = msg.params;
        self.emit(
            Event::new(events::EVENT_UPDATE_PARAMS)
                .attr(events::ATTR_CREATOR, &self.authority)
                .attr(events::ATTR_TIMESTAMP, now),
        );
        tracing::info!(rate = %self.params.trust_deposit_rate, "permission params updated");
        Ok(MsgResponse::Empty)
    }

    pub(crate) fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    // ── accessors ──

    pub fn store(&self) -> &PermissionStore {
        &self.store
    }

    /// Direct store access. Bypasses every handler check; meant for genesis
    /// import and for tests that need states no message sequence produces.
    pub fn store_mut(&mut self) -> &mut PermissionStore {
        &mut self.store
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn params(&self) -> &PermParams {
        &self.params
    }

    /// Events of all committed transactions so far.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Drain the event buffer (end of block).
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}
