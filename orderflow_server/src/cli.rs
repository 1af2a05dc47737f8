use std::env;

use crate::secret::Secret;

/// The variables the server reads, and whether their values must be masked.
const ENV_VARS: [(&str, bool); 12] = [
    ("RUST_LOG", false),
    ("OFS_HOST", false),
    ("OFS_PORT", false),
    ("OFS_DATABASE_URL", true),
    ("OFS_CONFIG_FILE", false),
    ("OFS_DB_MAX_CONNECTIONS", false),
    ("OFS_DB_TX_TIMEOUT", false),
    ("OFS_KAFKA_BROKERS", false),
    ("OFS_KAFKA_TOPIC", false),
    ("OFS_KAFKA_GROUP_ID", false),
    ("OFS_PERSIST_ATTEMPTS", false),
    ("OFS_SHUTDOWN_TIMEOUT", false),
];

/// The server takes no arguments. Any argument prints the help text and the current environment, and returns `true`
/// so that the caller exits instead of starting the server.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        println!("\n{}\n", include_str!("./cli-help.txt"));
        println!("Current environment values:");
        for (name, secret) in ENV_VARS {
            println!("  {name:<35} {}", describe_env(name, secret));
        }
    }
    has_cli_args
}

fn describe_env(name: &str, secret: bool) -> String {
    match env::var_os(name) {
        None => "Not set".into(),
        Some(val) if secret => Secret::new(val).to_string(),
        Some(val) => match val.into_string() {
            Ok(s) => s,
            Err(raw) => format!("Invalid value: {}", raw.to_string_lossy()),
        },
    }
}
