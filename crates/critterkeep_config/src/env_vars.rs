//! Environment variable names for configuration values and secrets.
//!
//! Plain keys map to `CRITTERKEEP__SECTION__KEY`. Secrets map to
//! `CRITTERKEEP_SECRET_SECTION_KEY`, falling back to the bare
//! `SECTION_KEY` form older deployments used.

use std::env;

use serde_json::Value;
use tracing::warn;

pub const DEFAULT_PREFIX: &str = "CRITTERKEEP";
pub const SECRET_PREFIX: &str = "CRITTERKEEP_SECRET";
pub const CONFIG_SEPARATOR: &str = "__";

/// Config value meaning "read this from the environment".
pub const SECRET_MARKER: &str = "secret_from_env";

/// `PREFIX` overrides the config prefix, mostly for side-by-side test setups.
pub fn get_config_prefix() -> String {
    env::var("PREFIX").unwrap_or_else(|_| DEFAULT_PREFIX.to_string())
}

// Key fragments that make a config path a secret. VAPID public keys are
// handed to every browser, so only `private_key` counts.
const SECRET_FRAGMENTS: [&str; 4] = ["secret", "private_key", "password", "token"];

pub fn is_secret_path(path: &str) -> bool {
    let path = path.to_lowercase();
    SECRET_FRAGMENTS.iter().any(|fragment| path.contains(fragment))
}

/// Variable names consulted for a dotted config path, in priority order.
///
/// ```
/// use critterkeep_config::env_vars::candidate_env_vars;
///
/// assert_eq!(
///     candidate_env_vars("push.vapid_private_key"),
///     vec![
///         "CRITTERKEEP_SECRET_PUSH_VAPID_PRIVATE_KEY".to_string(),
///         "PUSH_VAPID_PRIVATE_KEY".to_string(),
///     ]
/// );
/// assert_eq!(
///     candidate_env_vars("server.host"),
///     vec!["CRITTERKEEP__SERVER__HOST".to_string()]
/// );
/// ```
pub fn candidate_env_vars(path: &str) -> Vec<String> {
    if is_secret_path(path) {
        let flat = path.replace('.', "_").to_uppercase();
        vec![format!("{}_{}", SECRET_PREFIX, flat), flat]
    } else {
        let nested = path.replace('.', CONFIG_SEPARATOR);
        vec![format!("{}{}{}", get_config_prefix(), CONFIG_SEPARATOR, nested).to_uppercase()]
    }
}

pub fn get_env_var(path: &str) -> Option<String> {
    candidate_env_vars(path)
        .into_iter()
        .find_map(|name| env::var(name).ok())
}

/// Replace every `"secret_from_env"` string in `value` with its environment
/// variable. Returns whether anything was replaced; markers without a
/// variable are left as they are and logged.
pub fn inject_env_vars(value: &mut Value) -> bool {
    let mut path = Vec::new();
    resolve_markers(&mut path, value)
}

fn resolve_markers(path: &mut Vec<String>, value: &mut Value) -> bool {
    match value {
        Value::Object(map) => {
            let mut replaced = false;
            for (key, child) in map.iter_mut() {
                path.push(key.clone());
                replaced |= resolve_markers(path, child);
                path.pop();
            }
            replaced
        }
        Value::Array(items) => {
            let mut replaced = false;
            for (index, child) in items.iter_mut().enumerate() {
                path.push(index.to_string());
                replaced |= resolve_markers(path, child);
                path.pop();
            }
            replaced
        }
        Value::String(s) if s == SECRET_MARKER => {
            let dotted = path.join(".");
            match get_env_var(&dotted) {
                Some(resolved) => {
                    *s = resolved;
                    true
                }
                None => {
                    warn!(path = %dotted, "No environment variable for secret_from_env");
                    false
                }
            }
        }
        _ => false,
    }
}
