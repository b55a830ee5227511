use std::fs;
use std::io::Write;
use std::path::Path;

const ENV_FILE: &str = ".env";
const ENV_EXAMPLE_FILE: &str = ".env.example";

const ENV_TEMPLATE: &str = r#"# driftwatch configuration

ETH_RPC_URL="https://mainnet.infura.io/v3/CHANGE_ME"
PROJECTS_DIR="./projects"
WATCHER_DB_PATH="watcher.db"

# Optional Discord webhooks; unset disables notifications.
#DISCORD_INTERNAL_WEBHOOK_URL=""
#DISCORD_PUBLIC_WEBHOOK_URL=""

RUST_LOG="info"
"#;

/// Parse one `.env` line into a key/value pair. Comments, blank lines, and
/// lines without `=` yield `None`; trailing inline comments and one layer of
/// surrounding quotes are stripped from the value.
fn parse_env_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (key, rest) = line.split_once('=')?;
    let mut value = rest.split('#').next().unwrap_or("").trim();
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            value = &value[1..value.len() - 1];
            break;
        }
    }
    Some((key.trim(), value))
}

fn load_dot_env() {
    let Ok(content) = fs::read_to_string(ENV_FILE) else {
        return;
    };
    for line in content.lines() {
        if let Some((key, value)) = parse_env_line(line) {
            // Already-exported variables always win over `.env` contents.
            if std::env::var_os(key).is_none() {
                std::env::set_var(key, value);
            }
        }
    }
}

fn ensure_env_example() {
    let path = Path::new(ENV_EXAMPLE_FILE);
    if path.exists() {
        return;
    }
    match fs::File::create(path) {
        Ok(mut file) => {
            if let Err(e) = file.write_all(ENV_TEMPLATE.as_bytes()) {
                eprintln!("[ENV] Failed to write {ENV_EXAMPLE_FILE} template: {e}");
            }
        }
        Err(e) => eprintln!("[ENV] Failed to create {ENV_EXAMPLE_FILE}: {e}"),
    }
}

/// Load `.env` into the process environment and make sure a commented
/// `.env.example` exists for operators bootstrapping a fresh deployment.
pub fn harden_env_setup() {
    ensure_env_example();
    load_dot_env();
}

#[cfg(test)]
mod tests {
    use super::parse_env_line;

    #[test]
    fn test_parse_env_line_strips_quotes_and_comments() {
        assert_eq!(parse_env_line("KEY=value"), Some(("KEY", "value")));
        assert_eq!(
            parse_env_line("KEY=\"quoted value\""),
            Some(("KEY", "quoted value"))
        );
        assert_eq!(parse_env_line("KEY='single'"), Some(("KEY", "single")));
        assert_eq!(
            parse_env_line("  KEY = value # trailing"),
            Some(("KEY", "value"))
        );
        assert_eq!(parse_env_line("# comment"), None);
        assert_eq!(parse_env_line("   "), None);
        assert_eq!(parse_env_line("no_equals_sign"), None);
    }
}
