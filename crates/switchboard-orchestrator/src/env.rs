//! Environment lookups for adapter preconditions and spawn env policy.

use std::collections::HashMap;

/// Source of environment variables consulted by precondition checks.
///
/// The process environment is the production source; tests inject a fixed
/// map so they never touch global state.
pub trait EnvSource: Send + Sync {
    /// Look up a variable.
    fn var(&self, key: &str) -> Option<String>;

    /// Whether the variable is present and non-empty.
    fn is_set(&self, key: &str) -> bool {
        self.var(key).is_some_and(|v| !v.trim().is_empty())
    }
}

/// Reads from the real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// A fixed set of variables.
#[derive(Debug, Clone, Default)]
pub struct StaticEnv {
    vars: HashMap<String, String>,
}

impl StaticEnv {
    /// Create an empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable.
    #[must_use]
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

impl EnvSource for StaticEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

/// Replace `${NAME}` references in `value` with variables from `env`.
///
/// Unset variables resolve to the empty string. A `$` not followed by `{`,
/// or an unterminated `${`, is kept literally.
#[must_use]
pub fn resolve_env_references(value: &str, env: &dyn EnvSource) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start..];
        let Some(end) = after.find('}') else {
            out.push_str(after);
            return out;
        };
        let name = &after[2..end];
        out.push_str(&env.var(name).unwrap_or_default());
        rest = &after[end..][1..];
    }

    out.push_str(rest);
    out
}

/// Variables an adapter definition may never set on its subprocess.
const BLOCKED_SPAWN_ENV: &[&str] = &[
    "HOME",
    "PATH",
    "SWITCHBOARD_HOME",
    "LD_PRELOAD",
    "LD_LIBRARY_PATH",
    "DYLD_INSERT_LIBRARIES",
    "DYLD_LIBRARY_PATH",
    "NODE_OPTIONS",
    "NODE_PATH",
    "NODE_EXTRA_CA_CERTS",
    "PYTHONPATH",
    "PYTHONSTARTUP",
    "BASH_ENV",
    "ENV",
    "JAVA_TOOL_OPTIONS",
    "SSL_CERT_FILE",
    "SSL_CERT_DIR",
    "OPENSSL_CONF",
    "HTTP_PROXY",
    "HTTPS_PROXY",
    "ALL_PROXY",
];

/// Lowercase prefixes blocked wholesale.
const BLOCKED_PREFIXES: &[&str] = &["ld_", "dyld_", "npm_config_"];

/// Returns `true` if `key` must not appear in an adapter's `env` table.
///
/// Matching is case-insensitive, on exact names and on blocked prefixes.
#[must_use]
pub fn is_blocked_spawn_env(key: &str) -> bool {
    if BLOCKED_SPAWN_ENV.iter().any(|k| k.eq_ignore_ascii_case(key)) {
        return true;
    }
    let lower = key.to_ascii_lowercase();
    BLOCKED_PREFIXES.iter().any(|p| lower.starts_with(p))
}
