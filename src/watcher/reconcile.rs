use crate::config::{ConfigSource, ProjectConfig};
use crate::discovery::diff::diff_snapshots;
use crate::discovery::snapshot::{DiffResult, Snapshot};
use crate::storage::RecordStore;
use anyhow::Context;

/// Decide which baseline a fresh snapshot is diffed against and compute the
/// cycle's reported change set for one project.
///
/// The committed baseline (what the declaration says the chain should look
/// like) is authoritative whenever there is no prior record, or the prior
/// record was produced under a different declaration (`config_hash` mismatch).
/// Otherwise the last recorded snapshot is used, so only *new* drift since the
/// previous cycle is reported instead of re-reporting known deviations.
///
/// Digest inclusion is independent of that selection: on a digest cycle the
/// project is flagged whenever it currently differs from its committed
/// baseline, because the digest answers "does this project match its declared
/// configuration?" while the change set answers "did anything change since we
/// last looked?".
pub async fn find_changes(
    config_source: &dyn ConfigSource,
    store: &dyn RecordStore,
    config: &ProjectConfig,
    fresh: &Snapshot,
    is_digest_cycle: bool,
) -> anyhow::Result<DiffResult> {
    let project = config.name();

    let committed = config_source
        .read_committed(project)
        .await
        .with_context(|| format!("failed to load committed baseline for `{project}`"))?;
    let diff_from_committed =
        diff_snapshots(&committed.contracts, &fresh.contracts, config.ignore_rules());

    let record = store
        .find_latest(project)
        .await
        .with_context(|| format!("failed to load last record for `{project}`"))?;
    let diff_from_database = match &record {
        Some(record) => diff_snapshots(
            &record.snapshot.contracts,
            &fresh.contracts,
            config.ignore_rules(),
        ),
        None => Vec::new(),
    };

    let include_in_digest = is_digest_cycle && !diff_from_committed.is_empty();
    if include_in_digest {
        tracing::debug!(project, "[RECONCILE] flagged for daily digest");
    }

    let changes = match &record {
        Some(record) if record.config_hash == config.hash() => {
            tracing::debug!(project, "[RECONCILE] diffing against last recorded snapshot");
            diff_from_database
        }
        Some(_) => {
            tracing::debug!(
                project,
                "[RECONCILE] config hash changed; diffing against committed baseline"
            );
            diff_from_committed
        }
        None => {
            tracing::debug!(
                project,
                "[RECONCILE] no prior record; diffing against committed baseline"
            );
            diff_from_committed
        }
    };

    Ok(DiffResult {
        changes,
        include_in_digest,
    })
}
