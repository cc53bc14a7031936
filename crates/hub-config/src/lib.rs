//! Hub configuration: server map, executor policy, and safety defaults.
//!
//! Sourced from an external loader per `spec.md` §6 ("Configuration inputs
//! ... out of scope"); this crate defines the shapes that loader fills in
//! and loads them from TOML, in the style of `csa-config`'s
//! `GlobalConfig::load`.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use hub_core::ServerConfig;
use serde::{Deserialize, Serialize};

/// Top-level hub configuration: one entry per configured server plus the
/// tool-executor policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HubConfigFile {
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
    #[serde(default)]
    pub executor: ToolExecutorConfig,
    /// Per-server default argument maps (`spec.md` §6), keyed by server
    /// name. Each value is the free-form `config` a `ServerContext` carries
    /// — defaults may be nested per-tool under `config.tools.<toolName>`.
    #[serde(default)]
    pub server_contexts: HashMap<String, serde_json::Value>,
}

impl HubConfigFile {
    /// Load from a TOML file. Missing files are not an error: callers
    /// typically want a hub with zero configured servers to still start.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read hub config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse hub config: {}", path.display()))?;
        Ok(parsed)
    }

    pub fn servers_by_name(&self) -> HashMap<String, ServerConfig> {
        self.servers
            .iter()
            .cloned()
            .map(|s| (s.name.clone(), s))
            .collect()
    }

    /// The configured default-argument map for one server, or an empty
    /// object if none was configured.
    pub fn server_context(&self, server_name: &str) -> serde_json::Value {
        self.server_contexts
            .get(server_name)
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}))
    }
}

/// `ToolExecutorConfig` from `spec.md` §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecutorConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_enabled")]
    pub llm_enabled: bool,
    #[serde(default)]
    pub safety_config: SafetyConfig,
}

impl Default for ToolExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            llm_enabled: default_llm_enabled(),
            safety_config: SafetyConfig::default(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_llm_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SafetyConfig {
    #[serde(default)]
    pub dangerous_fields: Vec<String>,
    #[serde(default)]
    pub sensitive_fields: Vec<String>,
    #[serde(default)]
    pub auto_fill_defaults: Option<bool>,
    #[serde(default)]
    pub dangerous_keywords: Vec<String>,
    #[serde(default)]
    pub confirmation_required: ConfirmationRequired,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfirmationRequired {
    #[serde(default)]
    pub danger_levels: Vec<hub_core::DangerLevel>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_default() {
        let cfg = HubConfigFile::load(Path::new("/nonexistent/hub.toml")).unwrap();
        assert!(cfg.servers.is_empty());
        assert_eq!(cfg.executor.max_retries, 3);
    }

    #[test]
    fn parses_servers_and_executor_policy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hub.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"
[[servers]]
name = "echo"
command = "echo-server"
args = ["--stdio"]

[executor]
max_retries = 5
llm_enabled = false

[executor.safety_config]
dangerous_fields = ["path"]
"#
        )
        .unwrap();

        let cfg = HubConfigFile::load(&path).unwrap();
        assert_eq!(cfg.servers.len(), 1);
        assert_eq!(cfg.servers[0].name, "echo");
        assert_eq!(cfg.executor.max_retries, 5);
        assert!(!cfg.executor.llm_enabled);
        assert_eq!(cfg.executor.safety_config.dangerous_fields, vec!["path"]);
    }

    #[test]
    fn server_context_defaults_to_empty_object_when_unconfigured() {
        let cfg = HubConfigFile::default();
        assert_eq!(cfg.server_context("missing"), serde_json::json!({}));
    }

    #[test]
    fn server_context_parses_per_server_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hub.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"
[server_contexts.g]
name = "world"

[server_contexts.g.tools.greet]
name = "tool-default"
"#
        )
        .unwrap();

        let cfg = HubConfigFile::load(&path).unwrap();
        let ctx = cfg.server_context("g");
        assert_eq!(ctx["name"], "world");
        assert_eq!(ctx["tools"]["greet"]["name"], "tool-default");
    }

    #[test]
    fn servers_by_name_indexes_by_name() {
        let mut cfg = HubConfigFile::default();
        cfg.servers.push(ServerConfig {
            name: "gh".into(),
            command: "gh-mcp".into(),
            args: vec![],
            env: HashMap::new(),
        });
        let by_name = cfg.servers_by_name();
        assert!(by_name.contains_key("gh"));
    }
}
