use crate::discovery::snapshot::DiffEntry;
use chrono::DateTime;
use serde_json::Value;

/// Discord rejects message bodies above 2000 characters.
pub const MAX_MESSAGE_LENGTH: usize = 2000;

/// Render a project's change set into one or more notification messages.
///
/// Entries are grouped per contract in their existing order; chunking never
/// splits a contract block across messages.
pub fn diff_to_messages(project: &str, changes: &[DiffEntry]) -> Vec<String> {
    if changes.is_empty() {
        return Vec::new();
    }

    let header = format!("Changes detected in **{project}**");
    let continuation = format!("Changes detected in **{project}** (continued)");
    let blocks = render_contract_blocks(changes);

    let mut messages = Vec::new();
    let mut current = header;
    let mut current_has_block = false;

    for block in blocks {
        let block = fit_block(
            &block,
            MAX_MESSAGE_LENGTH.saturating_sub(continuation.len() + 1),
        );
        if current_has_block && current.len() + block.len() + 1 > MAX_MESSAGE_LENGTH {
            messages.push(current);
            current = continuation.clone();
        }
        current.push('\n');
        current.push_str(&block);
        current_has_block = true;
    }
    messages.push(current);
    messages
}

/// Render the once-per-day summary. An empty list means every project matched
/// its declared configuration and was updated.
pub fn daily_digest_message(not_updated: &[String], timestamp: u64) -> String {
    let header = format!(
        "```Daily watcher report @ {}```\n",
        format_report_date(timestamp)
    );
    if not_updated.is_empty() {
        return format!("{header}:white_check_mark: everything is up to date");
    }
    let lines: Vec<String> = not_updated.iter().map(|p| format!(":x: {p}")).collect();
    format!("{header}{}", lines.join("\n\n"))
}

fn render_contract_blocks(changes: &[DiffEntry]) -> Vec<String> {
    let mut blocks: Vec<String> = Vec::new();
    let mut current_contract = None;

    for entry in changes {
        if current_contract != Some(entry.contract) {
            current_contract = Some(entry.contract);
            let display = match &entry.contract_name {
                Some(name) => format!("{name} | {:#x}", entry.contract),
                None => format!("{:#x}", entry.contract),
            };
            blocks.push(display);
        }
        if let Some(block) = blocks.last_mut() {
            block.push_str(&format!(
                "\n    {}\n      - {}\n      + {}",
                entry.field,
                render_value(entry.before.as_ref()),
                render_value(entry.after.as_ref()),
            ));
        }
    }

    blocks
}

fn render_value(value: Option<&Value>) -> String {
    match value {
        None => "(none)".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn fit_block(block: &str, max_len: usize) -> String {
    if block.len() <= max_len {
        return block.to_string();
    }
    let mut end = max_len.saturating_sub(3);
    while end > 0 && !block.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &block[..end])
}

fn format_report_date(timestamp: u64) -> String {
    DateTime::from_timestamp(timestamp as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::snapshot::DiffKind;
    use alloy::primitives::Address;
    use serde_json::json;

    fn entry(tag: u8, field: &str, before: &str, after: &str) -> DiffEntry {
        DiffEntry {
            contract: Address::from([tag; 20]),
            contract_name: Some(format!("Contract{tag}")),
            field: field.to_string(),
            before: Some(json!(before)),
            after: Some(json!(after)),
            kind: DiffKind::Changed,
        }
    }

    #[test]
    fn test_empty_changes_produce_no_messages() {
        assert!(diff_to_messages("arbitrum", &[]).is_empty());
    }

    #[test]
    fn test_single_change_renders_contract_and_values() {
        let messages = diff_to_messages("optimism", &[entry(1, "admin", "0xaa", "0xbb")]);
        assert_eq!(messages.len(), 1);
        let message = &messages[0];
        assert!(message.contains("Changes detected in **optimism**"));
        assert!(message.contains("Contract1"));
        assert!(message.contains("admin"));
        assert!(message.contains("- 0xaa"));
        assert!(message.contains("+ 0xbb"));
    }

    #[test]
    fn test_chunking_respects_message_limit_and_block_integrity() {
        let changes: Vec<DiffEntry> = (0..200)
            .map(|i| {
                entry(
                    (i % 250) as u8,
                    &format!("field_with_a_rather_long_name_{i}"),
                    &"a".repeat(40),
                    &"b".repeat(40),
                )
            })
            .collect();
        let messages = diff_to_messages("zksync", &changes);

        assert!(messages.len() > 1);
        for message in &messages {
            assert!(message.len() <= MAX_MESSAGE_LENGTH);
            assert!(message.contains("Changes detected in **zksync**"));
        }
    }

    #[test]
    fn test_oversized_single_block_is_truncated() {
        let one = entry(1, "huge", &"x".repeat(3000), "y");
        let messages = diff_to_messages("base", &[one]);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].len() <= MAX_MESSAGE_LENGTH);
        assert!(messages[0].contains("..."));
    }

    #[test]
    fn test_daily_digest_lists_not_updated_projects() {
        // 2023-03-07 09:00:00 UTC
        let timestamp = 1_678_179_600;
        let message = daily_digest_message(
            &["arbitrum".to_string(), "optimism".to_string()],
            timestamp,
        );
        assert!(message.contains("Daily watcher report @ 2023-03-07"));
        assert!(message.contains(":x: arbitrum"));
        assert!(message.contains(":x: optimism"));
    }

    #[test]
    fn test_daily_digest_reports_all_up_to_date() {
        let message = daily_digest_message(&[], 1_678_179_600);
        assert!(message.contains(":white_check_mark: everything is up to date"));
    }

    #[test]
    fn test_format_report_date_known_dates() {
        assert_eq!(format_report_date(0), "1970-01-01");
        assert_eq!(format_report_date(951_868_800), "2000-03-01");
        assert_eq!(format_report_date(1_678_179_600), "2023-03-07");
    }
}
