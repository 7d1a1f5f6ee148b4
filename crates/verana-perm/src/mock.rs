//! # In-Memory Host
//!
//! A deterministic [`Host`] backed by ordered maps: one bond denomination,
//! account and module balances, trust deposits with their claimable
//! releases, and fixed schema and registry tables.
//!
//! Used by the test suites and by local tooling that needs a ledger without
//! running one. Checkpoints clone the mutable ledger; schemas, registries and
//! injected failures are configuration and survive a revert.

use std::collections::{BTreeMap, BTreeSet};

use verana_core::Address;

use crate::host::{
    AnchorId, Bank, Coin, CredentialSchemaInfo, CredentialSchemas, Host, HostError, TrustDeposit,
    TrustRegistries, TrustRegistryInfo,
};

/// Module account that receives slashed-deposit repayments.
pub const TRUST_DEPOSIT_MODULE: &str = "trustdeposit";

/// Mutable ledger state captured by checkpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockLedger {
    balances: BTreeMap<String, u64>,
    modules: BTreeMap<String, u64>,
    trust_deposits: BTreeMap<String, u64>,
    claimable: BTreeMap<String, u64>,
    burned: u64,
}

/// In-memory collaborator set.
#[derive(Debug, Clone)]
pub struct MockHost {
    ledger: MockLedger,
    denom: String,
    trust_unit_price: u64,
    schemas: BTreeMap<u64, CredentialSchemaInfo>,
    registries: BTreeMap<u64, TrustRegistryInfo>,
    anchors: BTreeMap<String, AnchorId>,
    rejected_accounts: BTreeSet<String>,
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new("uvna", 1)
    }
}

impl MockHost {
    pub fn new(denom: impl Into<String>, trust_unit_price: u64) -> Self {
        Self {
            ledger: MockLedger::default(),
            denom: denom.into(),
            trust_unit_price,
            schemas: BTreeMap::new(),
            registries: BTreeMap::new(),
            anchors: BTreeMap::new(),
            rejected_accounts: BTreeSet::new(),
        }
    }

    // ── builders ──

    pub fn with_balance(mut self, account: &Address, amount: u64) -> Self {
        self.fund(account, amount);
        self
    }

    pub fn with_schema(mut self, schema: CredentialSchemaInfo) -> Self {
        self.schemas.insert(schema.id, schema);
        self
    }

    pub fn with_registry(mut self, registry: TrustRegistryInfo) -> Self {
        self.registries.insert(registry.id, registry);
        self
    }

    pub fn with_anchor(mut self, operator: &Address, anchor: AnchorId) -> Self {
        self.anchors.insert(operator.as_str().to_string(), anchor);
        self
    }

    // ── test controls ──

    /// Mint `amount` into `account`.
    pub fn fund(&mut self, account: &Address, amount: u64) {
        *self
            .ledger
            .balances
            .entry(account.as_str().to_string())
            .or_insert(0) += amount;
    }

    pub fn set_trust_unit_price(&mut self, price: u64) {
        self.trust_unit_price = price;
    }

    /// Make every later trust-deposit call for `account` fail.
    pub fn reject_trust_deposit_for(&mut self, account: &Address) {
        self.rejected_accounts.insert(account.as_str().to_string());
    }

    // ── inspection ──

    pub fn balance(&self, account: &Address) -> u64 {
        self.ledger
            .balances
            .get(account.as_str())
            .copied()
            .unwrap_or(0)
    }

    pub fn module_balance(&self, module: &str) -> u64 {
        self.ledger.modules.get(module).copied().unwrap_or(0)
    }

    pub fn trust_deposit(&self, account: &Address) -> u64 {
        self.ledger
            .trust_deposits
            .get(account.as_str())
            .copied()
            .unwrap_or(0)
    }

    /// Deposit released back to `account` and not yet reclaimed.
    pub fn claimable(&self, account: &Address) -> u64 {
        self.ledger
            .claimable
            .get(account.as_str())
            .copied()
            .unwrap_or(0)
    }

    pub fn burned(&self) -> u64 {
        self.ledger.burned
    }

    pub fn ledger(&self) -> &MockLedger {
        &self.ledger
    }

    fn check_denom(&self, coin: &Coin) -> Result<(), HostError> {
        if coin.denom != self.denom {
            return Err(HostError::Rejected(format!(
                "unknown denomination {}",
                coin.denom
            )));
        }
        Ok(())
    }

    fn check_accepted(&self, account: &Address) -> Result<(), HostError> {
        if self.rejected_accounts.contains(account.as_str()) {
            return Err(HostError::Rejected(format!(
                "trust deposit frozen for {account}"
            )));
        }
        Ok(())
    }
}

fn debit(map: &mut BTreeMap<String, u64>, key: &str, amount: u64) -> Result<(), HostError> {
    let available = map.get(key).copied().unwrap_or(0);
    if available < amount {
        return Err(HostError::InsufficientBalance {
            account: key.to_string(),
            required: amount,
            available,
        });
    }
    map.insert(key.to_string(), available - amount);
    Ok(())
}

fn credit(map: &mut BTreeMap<String, u64>, key: &str, amount: u64) -> Result<(), HostError> {
    let entry = map.entry(key.to_string()).or_insert(0);
    *entry = entry
        .checked_add(amount)
        .ok_or_else(|| HostError::Rejected(format!("balance overflow on {key}")))?;
    Ok(())
}

impl Bank for MockHost {
    fn send_coins(&mut self, from: &Address, to: &Address, coin: &Coin) -> Result<(), HostError> {
        self.check_denom(coin)?;
        debit(&mut self.ledger.balances, from.as_str(), coin.amount)?;
        credit(&mut self.ledger.balances, to.as_str(), coin.amount)
    }

    fn send_coins_from_account_to_module(
        &mut self,
        from: &Address,
        module: &str,
        coin: &Coin,
    ) -> Result<(), HostError> {
        self.check_denom(coin)?;
        debit(&mut self.ledger.balances, from.as_str(), coin.amount)?;
        credit(&mut self.ledger.modules, module, coin.amount)
    }

    fn send_coins_from_module_to_account(
        &mut self,
        module: &str,
        to: &Address,
        coin: &Coin,
    ) -> Result<(), HostError> {
        self.check_denom(coin)?;
        debit(&mut self.ledger.modules, module, coin.amount)?;
        credit(&mut self.ledger.balances, to.as_str(), coin.amount)
    }

    fn spendable_balance(&self, account: &Address, denom: &str) -> u64 {
        if denom != self.denom {
            return 0;
        }
        self.balance(account)
    }
}

impl TrustDeposit for MockHost {
    fn adjust_trust_deposit(&mut self, account: &Address, delta: i64) -> Result<(), HostError> {
        self.check_accepted(account)?;
        let key = account.as_str();
        let amount = delta.unsigned_abs();
        if delta >= 0 {
            credit(&mut self.ledger.trust_deposits, key, amount)
        } else {
            let balance = self.trust_deposit(account);
            if balance < amount {
                return Err(HostError::TrustDepositUnderflow {
                    account: key.to_string(),
                    balance,
                    delta,
                });
            }
            self.ledger.trust_deposits.insert(key.to_string(), balance - amount);
            credit(&mut self.ledger.claimable, key, amount)
        }
    }

    fn burn_slashed_trust_deposit(&mut self, account: &Address, amount: u64) -> Result<(), HostError> {
        self.check_accepted(account)?;
        let balance = self.trust_deposit(account);
        if balance < amount {
            return Err(HostError::InsufficientBalance {
                account: account.as_str().to_string(),
                required: amount,
                available: balance,
            });
        }
        self.ledger
            .trust_deposits
            .insert(account.as_str().to_string(), balance - amount);
        self.ledger.burned += amount;
        Ok(())
    }

    fn is_anchor(&self, account: &Address) -> bool {
        self.anchors.values().any(|a| a.0 == account.as_str())
    }

    fn anchor_for_operator(&self, account: &Address) -> Option<AnchorId> {
        self.anchors.get(account.as_str()).cloned()
    }

    fn module_account(&self) -> &str {
        TRUST_DEPOSIT_MODULE
    }
}

impl CredentialSchemas for MockHost {
    fn credential_schema(&self, id: u64) -> Option<CredentialSchemaInfo> {
        self.schemas.get(&id).cloned()
    }
}

impl TrustRegistries for MockHost {
    fn trust_registry(&self, id: u64) -> Option<TrustRegistryInfo> {
        self.registries.get(&id).cloned()
    }

    fn trust_unit_price(&self) -> u64 {
        self.trust_unit_price
    }
}

impl Host for MockHost {
    type Checkpoint = MockLedger;

    fn checkpoint(&self) -> MockLedger {
        self.ledger.clone()
    }

    fn revert(&mut self, checkpoint: MockLedger) {
        self.ledger = checkpoint;
    }
}
