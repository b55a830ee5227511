pub mod diff;
pub mod engine;
pub mod messages;
pub mod snapshot;

pub use diff::diff_snapshots;
pub use engine::{ChainDiscoveryEngine, DiscoveryEngine};
pub use snapshot::{
    ContractSnapshot, DiffEntry, DiffKind, DiffResult, FieldSnapshot, IgnoreRules, Snapshot,
    WatcherRecord,
};
