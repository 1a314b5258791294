//! Orchestrator configuration.
//!
//! Configuration is loaded from `~/.switchboard/switchboard.toml` (or
//! `$SWITCHBOARD_HOME/switchboard.toml`). When no file exists the built-in
//! adapter set is used.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::env::{EnvSource, is_blocked_spawn_env};
use crate::error::{OrchestratorError, OrchestratorResult};

/// Config file name inside the switchboard home directory.
pub const CONFIG_FILE_NAME: &str = "switchboard.toml";

/// Environment variable overriding the switchboard home directory.
pub const HOME_ENV: &str = "SWITCHBOARD_HOME";

/// Adapter id that unmapped capabilities fall back to in the built-in
/// configuration: the networked retrieval adapter.
pub const DEFAULT_ROUTE: &str = "fetch";

fn default_priority() -> u32 {
    100
}

/// Metadata and spawn contract for one adapter.
///
/// Runtime status is tracked separately by the store; this type never
/// changes after registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    /// Unique short identifier, used in routes and logs.
    pub id: String,
    /// Human-facing name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Human-facing description.
    #[serde(default)]
    pub description: Option<String>,
    /// Command to launch the adapter subprocess.
    pub command: String,
    /// Command arguments. `${VAR}` references are resolved at spawn time.
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment for the subprocess. Values may use `${VAR}`.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Working directory.
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Capability tags this adapter claims.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Routing priority; lower values are tried first.
    #[serde(default = "default_priority")]
    pub priority: u32,
    /// Environment variables that must be non-empty before spawning.
    #[serde(default)]
    pub requires_env: Vec<String>,
    /// Started at boot and restarted automatically after a failed probe.
    #[serde(default)]
    pub critical: bool,
}

impl ServiceDefinition {
    /// Create a definition that launches `command`.
    #[must_use]
    pub fn new(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            description: None,
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
            capabilities: Vec::new(),
            priority: default_priority(),
            requires_env: Vec::new(),
            critical: false,
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Set the arguments.
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Add an environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the claimed capabilities.
    #[must_use]
    pub fn with_capabilities(
        mut self,
        capabilities: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    /// Set the routing priority.
    #[must_use]
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Require an environment variable before spawning.
    #[must_use]
    pub fn requires(mut self, variable: impl Into<String>) -> Self {
        self.requires_env.push(variable.into());
        self
    }

    /// Mark as critical.
    #[must_use]
    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    /// The display name, falling back to the id.
    #[must_use]
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }

    /// The first required variable missing from `env`, if any.
    #[must_use]
    pub fn unmet_dependency(&self, env: &dyn EnvSource) -> Option<&str> {
        self.requires_env
            .iter()
            .find(|var| !env.is_set(var))
            .map(String::as_str)
    }
}

/// Timer, timeout, and routing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorSettings {
    /// Seconds between health sweeps.
    #[serde(default = "default_health_interval")]
    pub health_interval_secs: u64,
    /// Seconds allowed for one liveness probe.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    /// Seconds allowed for spawn plus handshake.
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,
    /// Seconds allowed for one routed adapter call.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
    /// Seconds allowed to close one adapter session.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
    /// Maximum probes in flight during one sweep (1 = sequential).
    #[serde(default = "default_probe_concurrency")]
    pub probe_concurrency: usize,
    /// Adapter used for capabilities with no route. Empty (the default for
    /// file configurations) disables it.
    #[serde(default)]
    pub default_route: String,
}

fn default_health_interval() -> u64 {
    60
}

fn default_probe_timeout() -> u64 {
    10
}

fn default_handshake_timeout() -> u64 {
    30
}

fn default_call_timeout() -> u64 {
    60
}

fn default_shutdown_timeout() -> u64 {
    5
}

fn default_probe_concurrency() -> usize {
    4
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            health_interval_secs: default_health_interval(),
            probe_timeout_secs: default_probe_timeout(),
            handshake_timeout_secs: default_handshake_timeout(),
            call_timeout_secs: default_call_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            probe_concurrency: default_probe_concurrency(),
            default_route: String::new(),
        }
    }
}

impl OrchestratorSettings {
    /// Health sweep period, floored at one second.
    #[must_use]
    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs.max(1))
    }

    /// Probe timeout.
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Handshake timeout.
    #[must_use]
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    /// Routed call timeout.
    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Per-session close timeout.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// The default route, if enabled.
    #[must_use]
    pub fn default_route(&self) -> Option<&str> {
        let route = self.default_route.trim();
        (!route.is_empty()).then_some(route)
    }
}

/// Logging section, bridged to the telemetry crate by the host binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base level.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `pretty`, `compact`, `json`, or `full`.
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Write rolling files here instead of stderr.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// Extra filter directives.
    #[serde(default)]
    pub directives: Vec<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            directory: None,
            directives: Vec::new(),
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchboardConfig {
    /// Timers, timeouts, default route.
    #[serde(default)]
    pub orchestrator: OrchestratorSettings,
    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Adapters, in registration order.
    #[serde(default)]
    pub services: Vec<ServiceDefinition>,
    /// Explicit routes; each replaces the derived candidate list for its
    /// capability.
    #[serde(default)]
    pub routes: HashMap<String, Vec<String>>,
}

impl SwitchboardConfig {
    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration.
    pub fn from_toml(content: &str) -> OrchestratorResult<Self> {
        toml::from_str(content)
            .map_err(|e| OrchestratorError::ConfigError(format!("Invalid config: {e}")))
    }

    /// Load configuration from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> OrchestratorResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Load from the default location, falling back to [`Self::builtin`].
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined or an
    /// existing file cannot be parsed.
    pub fn load_default(env: &dyn EnvSource) -> OrchestratorResult<Self> {
        let path = Self::default_path(env)?;
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::builtin())
        }
    }

    /// The default config path.
    ///
    /// # Errors
    ///
    /// Returns an error if no home directory can be determined.
    pub fn default_path(env: &dyn EnvSource) -> OrchestratorResult<PathBuf> {
        if let Some(home) = env.var(HOME_ENV).filter(|h| !h.trim().is_empty()) {
            return Ok(PathBuf::from(home).join(CONFIG_FILE_NAME));
        }

        let dirs = directories::BaseDirs::new().ok_or_else(|| {
            OrchestratorError::ConfigError("Cannot determine home directory".to_string())
        })?;
        Ok(dirs.home_dir().join(".switchboard").join(CONFIG_FILE_NAME))
    }

    /// Save configuration to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be serialized or written.
    pub fn save(&self, path: impl AsRef<Path>) -> OrchestratorResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| OrchestratorError::ConfigError(e.to_string()))?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `SWITCHBOARD_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an override is not a valid number.
    pub fn apply_env_overrides(&mut self, env: &dyn EnvSource) -> OrchestratorResult<()> {
        fn seconds(env: &dyn EnvSource, key: &str) -> OrchestratorResult<Option<u64>> {
            env.var(key)
                .filter(|v| !v.trim().is_empty())
                .map(|v| {
                    v.trim().parse::<u64>().map_err(|e| {
                        OrchestratorError::ConfigError(format!("{key}={v}: {e}"))
                    })
                })
                .transpose()
        }

        if let Some(secs) = seconds(env, "SWITCHBOARD_HEALTH_INTERVAL_SECS")? {
            self.orchestrator.health_interval_secs = secs;
        }
        if let Some(secs) = seconds(env, "SWITCHBOARD_CALL_TIMEOUT_SECS")? {
            self.orchestrator.call_timeout_secs = secs;
        }
        if let Some(level) = env
            .var("SWITCHBOARD_LOG_LEVEL")
            .filter(|v| !v.trim().is_empty())
        {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Check ids, commands, env keys, routes, and timeouts.
    ///
    /// # Errors
    ///
    /// Returns the first problem found as a configuration error.
    pub fn validate(&self) -> OrchestratorResult<()> {
        let invalid = |msg: String| Err(OrchestratorError::ConfigError(msg));

        let mut seen = HashSet::new();
        for def in &self.services {
            if def.id.trim().is_empty() {
                return invalid("service with empty id".to_string());
            }
            if !seen.insert(def.id.as_str()) {
                return invalid(format!("duplicate service id: {}", def.id));
            }
            if def.command.trim().is_empty() {
                return invalid(format!("service {} has no command", def.id));
            }
            if let Some(key) = def.env.keys().find(|k| is_blocked_spawn_env(k)) {
                return invalid(format!(
                    "service {} sets blocked environment variable {key}",
                    def.id
                ));
            }
        }

        for (capability, targets) in &self.routes {
            if let Some(unknown) = targets.iter().find(|t| !seen.contains(t.as_str())) {
                return invalid(format!(
                    "route {capability} refers to unknown service {unknown}"
                ));
            }
        }

        if let Some(route) = self.orchestrator.default_route()
            && !seen.contains(route)
        {
            return invalid(format!("default route refers to unknown service {route}"));
        }

        let o = &self.orchestrator;
        if o.probe_timeout_secs == 0
            || o.handshake_timeout_secs == 0
            || o.call_timeout_secs == 0
            || o.shutdown_timeout_secs == 0
        {
            return invalid("timeouts must be at least one second".to_string());
        }
        if o.probe_concurrency == 0 {
            return invalid("probe_concurrency must be at least 1".to_string());
        }

        Ok(())
    }

    /// Get a definition by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ServiceDefinition> {
        self.services.iter().find(|d| d.id == id)
    }

    /// Append a definition.
    pub fn add(&mut self, definition: ServiceDefinition) {
        self.services.push(definition);
    }

    /// Add or replace an explicit route.
    pub fn add_route(
        &mut self,
        capability: impl Into<String>,
        targets: impl IntoIterator<Item = impl Into<String>>,
    ) {
        self.routes.insert(
            capability.into(),
            targets.into_iter().map(Into::into).collect(),
        );
    }

    /// Ids of critical adapters, in registration order.
    #[must_use]
    pub fn critical_ids(&self) -> Vec<String> {
        self.services
            .iter()
            .filter(|d| d.critical)
            .map(|d| d.id.clone())
            .collect()
    }

    /// The built-in adapter set: structured storage, filesystem, networked
    /// retrieval, browser automation, and a language model.
    #[must_use]
    pub fn builtin() -> Self {
        let services = vec![
            ServiceDefinition::new("postgres", "npx")
                .with_display_name("PostgreSQL")
                .with_description("Structured storage: read-only SQL over the application database")
                .with_args(["-y", "@modelcontextprotocol/server-postgres", "${DATABASE_URL}"])
                .with_capabilities(["database", "sql", "storage"])
                .with_priority(10)
                .requires("DATABASE_URL")
                .critical(),
            ServiceDefinition::new("filesystem", "npx")
                .with_display_name("Filesystem")
                .with_description("Read and write files under the data directory")
                .with_args(["-y", "@modelcontextprotocol/server-filesystem", "./data"])
                .with_capabilities(["files", "storage"])
                .with_priority(20)
                .critical(),
            ServiceDefinition::new(DEFAULT_ROUTE, "uvx")
                .with_display_name("Fetch")
                .with_description("Networked retrieval of web pages and APIs")
                .with_args(["mcp-server-fetch"])
                .with_capabilities(["web", "http", "scrape"])
                .with_priority(10)
                .critical(),
            ServiceDefinition::new("puppeteer", "npx")
                .with_display_name("Puppeteer")
                .with_description("Browser automation for dynamic pages")
                .with_args(["-y", "@modelcontextprotocol/server-puppeteer"])
                .with_capabilities(["browser", "scrape", "web"])
                .with_priority(50),
            ServiceDefinition::new("huggingface", "npx")
                .with_display_name("Hugging Face")
                .with_description("Language model inference")
                .with_args(["-y", "@llmindset/mcp-hfspace"])
                .with_env("HF_TOKEN", "${HF_TOKEN}")
                .with_capabilities(["inference", "llm"])
                .with_priority(10)
                .requires("HF_TOKEN"),
        ];

        Self {
            orchestrator: OrchestratorSettings {
                default_route: DEFAULT_ROUTE.to_string(),
                ..OrchestratorSettings::default()
            },
            logging: LoggingConfig::default(),
            services,
            routes: HashMap::new(),
        }
    }
}
