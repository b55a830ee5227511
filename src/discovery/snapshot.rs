use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Per-contract field names a project chooses not to watch, keyed by contract
/// address. Matching diff entries are suppressed entirely.
pub type IgnoreRules = BTreeMap<Address, BTreeSet<String>>;

/// One observed value of a tracked contract field.
///
/// Fields are kept as an ordered list, not a map: diff output follows the
/// declaration order of the snapshot that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSnapshot {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractSnapshot {
    pub address: Address,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldSnapshot>,
    /// Set when any chain read for this contract failed; a snapshot carrying
    /// at least one contract error is invalid for diffing and persistence.
    #[serde(default)]
    pub error: Option<String>,
}

impl ContractSnapshot {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.value)
    }
}

/// A project's discovery result at one block. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub contracts: Vec<ContractSnapshot>,
    pub block_number: u64,
    pub timestamp: u64,
}

impl Snapshot {
    pub fn contract_errors(&self) -> usize {
        self.contracts.iter().filter(|c| c.error.is_some()).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffKind {
    Changed,
    Added,
    Removed,
}

/// One detected change. Contract-level additions and removals use the
/// pseudo-field `"contract"` with the address as the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub contract: Address,
    pub contract_name: Option<String>,
    pub field: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub kind: DiffKind,
}

/// The reconciler's verdict for one project in one cycle.
#[derive(Debug, Clone, Default)]
pub struct DiffResult {
    pub changes: Vec<DiffEntry>,
    pub include_in_digest: bool,
}

/// The persisted "last observed state" for a project. Exactly one live record
/// per project name; each successful cycle overwrites it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatcherRecord {
    pub project_name: String,
    pub timestamp: u64,
    pub block_number: u64,
    pub snapshot: Snapshot,
    pub config_hash: B256,
}
