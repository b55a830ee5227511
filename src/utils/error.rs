/// Compact a raw error message for single-line logging.
///
/// RPC and webhook failures tend to embed full response bodies and stack
/// backtraces; both are elided before whitespace is collapsed and the result
/// truncated.
pub fn compact_error_message(message: &str, max_len: usize) -> String {
    let mut raw = message.to_string();
    for marker in ["body", "text"] {
        let needle = format!(" {marker}: ");
        if let Some((prefix, _)) = raw.split_once(&needle) {
            raw = format!("{prefix} {marker}=<omitted>");
        }
    }
    if let Some((prefix, _)) = raw.split_once("Stack backtrace:") {
        raw = prefix.to_string();
    }

    let compact = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if compact.len() <= max_len {
        return compact;
    }
    let mut end = max_len;
    while end > 0 && !compact.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &compact[..end])
}
