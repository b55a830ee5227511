use crate::discovery::snapshot::{ContractSnapshot, DiffEntry, DiffKind, IgnoreRules};
use serde_json::Value;

/// Field name used for contract-level additions and removals.
pub const CONTRACT_FIELD: &str = "contract";

/// Structural diff between two ordered contract lists.
///
/// Contracts are matched by address. Entry order follows the newer list's
/// contract order, then field declaration order within a contract; contracts
/// present only in the older list are appended afterwards in their original
/// order. Fields named in the ignore rules never produce entries.
pub fn diff_snapshots(
    prev: &[ContractSnapshot],
    next: &[ContractSnapshot],
    ignore: &IgnoreRules,
) -> Vec<DiffEntry> {
    let mut entries = Vec::new();

    for next_contract in next {
        match prev.iter().find(|c| c.address == next_contract.address) {
            Some(prev_contract) => {
                diff_contract_fields(prev_contract, next_contract, ignore, &mut entries)
            }
            None => entries.push(contract_entry(next_contract, DiffKind::Added)),
        }
    }

    for prev_contract in prev {
        if !next.iter().any(|c| c.address == prev_contract.address) {
            entries.push(contract_entry(prev_contract, DiffKind::Removed));
        }
    }

    entries
}

fn diff_contract_fields(
    prev: &ContractSnapshot,
    next: &ContractSnapshot,
    ignore: &IgnoreRules,
    entries: &mut Vec<DiffEntry>,
) {
    for field in &next.fields {
        if is_ignored(ignore, next, &field.name) {
            continue;
        }
        match prev.field(&field.name) {
            Some(before) if *before != field.value => entries.push(DiffEntry {
                contract: next.address,
                contract_name: next.name.clone(),
                field: field.name.clone(),
                before: Some(before.clone()),
                after: Some(field.value.clone()),
                kind: DiffKind::Changed,
            }),
            Some(_) => {}
            None => entries.push(DiffEntry {
                contract: next.address,
                contract_name: next.name.clone(),
                field: field.name.clone(),
                before: None,
                after: Some(field.value.clone()),
                kind: DiffKind::Added,
            }),
        }
    }

    for field in &prev.fields {
        if is_ignored(ignore, next, &field.name) {
            continue;
        }
        if next.field(&field.name).is_none() {
            entries.push(DiffEntry {
                contract: next.address,
                contract_name: next.name.clone(),
                field: field.name.clone(),
                before: Some(field.value.clone()),
                after: None,
                kind: DiffKind::Removed,
            });
        }
    }
}

fn is_ignored(ignore: &IgnoreRules, contract: &ContractSnapshot, field: &str) -> bool {
    ignore
        .get(&contract.address)
        .is_some_and(|fields| fields.contains(field))
}

fn contract_entry(contract: &ContractSnapshot, kind: DiffKind) -> DiffEntry {
    let address = Value::String(format!("{:#x}", contract.address));
    let (before, after) = match kind {
        DiffKind::Removed => (Some(address), None),
        _ => (None, Some(address)),
    };
    DiffEntry {
        contract: contract.address,
        contract_name: contract.name.clone(),
        field: CONTRACT_FIELD.to_string(),
        before,
        after,
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::snapshot::FieldSnapshot;
    use alloy::primitives::Address;
    use serde_json::json;
    use std::collections::{BTreeMap, BTreeSet};

    fn contract(tag: u8, fields: &[(&str, &str)]) -> ContractSnapshot {
        ContractSnapshot {
            address: Address::from([tag; 20]),
            name: None,
            fields: fields
                .iter()
                .map(|(name, value)| FieldSnapshot {
                    name: name.to_string(),
                    value: json!(value),
                })
                .collect(),
            error: None,
        }
    }

    #[test]
    fn test_changed_field_produces_one_entry() {
        let prev = vec![contract(1, &[("admin", "0xaa")])];
        let next = vec![contract(1, &[("admin", "0xbb")])];
        let entries = diff_snapshots(&prev, &next, &BTreeMap::new());

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, DiffKind::Changed);
        assert_eq!(entries[0].field, "admin");
        assert_eq!(entries[0].before, Some(json!("0xaa")));
        assert_eq!(entries[0].after, Some(json!("0xbb")));
    }

    #[test]
    fn test_added_and_removed_fields_are_classified() {
        let prev = vec![contract(1, &[("old", "1")])];
        let next = vec![contract(1, &[("new", "2")])];
        let entries = diff_snapshots(&prev, &next, &BTreeMap::new());

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].field, "new");
        assert_eq!(entries[0].kind, DiffKind::Added);
        assert_eq!(entries[1].field, "old");
        assert_eq!(entries[1].kind, DiffKind::Removed);
    }

    #[test]
    fn test_contract_addition_and_removal() {
        let prev = vec![contract(1, &[("f", "1")])];
        let next = vec![contract(2, &[("f", "1")])];
        let entries = diff_snapshots(&prev, &next, &BTreeMap::new());

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, DiffKind::Added);
        assert_eq!(entries[0].field, CONTRACT_FIELD);
        assert_eq!(entries[0].contract, Address::from([2u8; 20]));
        assert_eq!(entries[1].kind, DiffKind::Removed);
        assert_eq!(entries[1].contract, Address::from([1u8; 20]));
    }

    #[test]
    fn test_ignore_rules_suppress_entries() {
        let prev = vec![contract(1, &[("admin", "0xaa"), ("owner", "0xcc")])];
        let next = vec![contract(1, &[("admin", "0xbb"), ("owner", "0xdd")])];
        let mut ignore: IgnoreRules = BTreeMap::new();
        ignore.insert(
            Address::from([1u8; 20]),
            BTreeSet::from(["admin".to_string()]),
        );

        let entries = diff_snapshots(&prev, &next, &ignore);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].field, "owner");
    }

    #[test]
    fn test_entry_order_follows_newer_snapshot() {
        let prev = vec![
            contract(1, &[("a", "1"), ("b", "1")]),
            contract(2, &[("c", "1")]),
        ];
        let next = vec![
            contract(2, &[("c", "2")]),
            contract(1, &[("b", "2"), ("a", "2")]),
        ];
        let entries = diff_snapshots(&prev, &next, &BTreeMap::new());

        let order: Vec<(Address, String)> = entries
            .iter()
            .map(|e| (e.contract, e.field.clone()))
            .collect();
        assert_eq!(
            order,
            vec![
                (Address::from([2u8; 20]), "c".to_string()),
                (Address::from([1u8; 20]), "b".to_string()),
                (Address::from([1u8; 20]), "a".to_string()),
            ]
        );
    }

    #[test]
    fn test_diff_is_idempotent_for_identical_inputs() {
        let prev = vec![contract(1, &[("a", "1")]), contract(2, &[("b", "2")])];
        let next = vec![contract(1, &[("a", "9")]), contract(3, &[("b", "2")])];
        let first = diff_snapshots(&prev, &next, &BTreeMap::new());
        let second = diff_snapshots(&prev, &next, &BTreeMap::new());
        assert_eq!(first, second);
    }

    #[test]
    fn test_identical_snapshots_produce_no_entries() {
        let prev = vec![contract(1, &[("a", "1")])];
        let entries = diff_snapshots(&prev, &prev.clone(), &BTreeMap::new());
        assert!(entries.is_empty());
    }
}
