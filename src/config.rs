/// Configuration loading for the MCP server.
///
/// Mirrors `config/settings.py`: a layered `Config` loaded from an optional
/// JSON file and overridden by environment variables, with `${VAR}`
/// indirection for secret-shaped fields.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerisMemoryConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub user_id: Option<String>,
    pub timeout_ms: u64,
    pub max_retries: u32,
}

impl Default for VerisMemoryConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.verismemory.com".to_string(),
            api_key: None,
            user_id: None,
            timeout_ms: 30_000,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub log_level: String,
    pub max_concurrent_requests: u32,
    pub cache_enabled: bool,
    pub cache_ttl_seconds: u64,
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "INFO".to_string(),
            max_concurrent_requests: 10,
            cache_enabled: true,
            cache_ttl_seconds: 300,
            request_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub enabled: bool,
    pub max_content_size: usize,
    pub allowed_context_types: Vec<String>,
    pub max_results: u32,
    pub default_limit: u32,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_content_size: 1_048_576,
            allowed_context_types: vec!["*".to_string()],
            max_results: 100,
            default_limit: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ToolsConfig {
    pub store_context: ToolConfig,
    pub retrieve_context: ToolConfig,
    pub search_context: ToolConfig,
    pub delete_context: ToolConfig,
    pub list_context_types: ToolConfig,
    pub upsert_fact: ToolConfig,
    pub get_user_facts: ToolConfig,
    pub forget_context: ToolConfig,
    pub query_graph: ToolConfig,
    pub update_scratchpad: ToolConfig,
    pub get_agent_state: ToolConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: String,
    pub veris_memory: VerisMemoryConfig,
    pub server: ServerConfig,
    pub tools: ToolsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            veris_memory: VerisMemoryConfig::default(),
            server: ServerConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

/// Resolve a `${VAR}` style indirection against the process environment.
/// Leaves the value untouched if it isn't wrapped in `${...}`.
fn resolve_env_indirection(value: &str) -> Option<String> {
    if let Some(inner) = value.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(inner).ok()
    } else {
        Some(value.to_string())
    }
}

/// Load configuration from an optional file path and environment overrides.
///
/// If `config_path` is `None`, `VERIS_MCP_CONFIG_PATH` is consulted; absence
/// of both is not an error (defaults apply). A path that doesn't exist is.
pub fn load_config(config_path: Option<&Path>) -> Result<Config, ConfigError> {
    let resolved_path: Option<PathBuf> = config_path.map(Path::to_path_buf).or_else(|| {
        std::env::var("VERIS_MCP_CONFIG_PATH")
            .ok()
            .map(PathBuf::from)
    });

    let mut config = match &resolved_path {
        Some(path) if path.exists() => {
            let contents = std::fs::read_to_string(path)?;
            serde_json::from_str::<Config>(&contents)?
        }
        Some(path) => {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        None => Config::default(),
    };

    if let Some(key) = &config.veris_memory.api_key {
        config.veris_memory.api_key = resolve_env_indirection(key);
    } else if let Ok(env_key) = std::env::var("VERIS_MEMORY_API_KEY") {
        config.veris_memory.api_key = Some(env_key);
    }

    if let Some(user_id) = &config.veris_memory.user_id {
        config.veris_memory.user_id = resolve_env_indirection(user_id);
    } else if let Ok(env_user) = std::env::var("VERIS_MEMORY_USER_ID") {
        config.veris_memory.user_id = Some(env_user);
    }

    if let Ok(log_level) = std::env::var("VERIS_MCP_LOG_LEVEL") {
        config.server.log_level = log_level;
    }

    validate_log_level(&config.server.log_level)?;
    config.server.log_level = config.server.log_level.to_uppercase();

    Ok(config)
}

fn validate_log_level(level: &str) -> Result<(), ConfigError> {
    const VALID: &[&str] = &["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"];
    if VALID.contains(&level.to_uppercase().as_str()) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "invalid log level: {level}, must be one of {VALID:?}"
        )))
    }
}

/// Write a default configuration file to `config_path`, creating parent
/// directories as needed.
pub fn create_default_config(config_path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let config = Config::default();
    let contents = serde_json::to_string_pretty(&config)?;
    std::fs::write(config_path, contents)?;
    Ok(())
}

/// Lookup for a tool's `ToolConfig` by name, used when a tool doesn't have a
/// dedicated struct field (e.g. streaming/webhook/analytics tools share the
/// server-level defaults).
pub fn tool_config_map(tools: &ToolsConfig) -> HashMap<&'static str, &ToolConfig> {
    let mut map = HashMap::new();
    map.insert("store_context", &tools.store_context);
    map.insert("retrieve_context", &tools.retrieve_context);
    map.insert("search_context", &tools.search_context);
    map.insert("delete_context", &tools.delete_context);
    map.insert("list_context_types", &tools.list_context_types);
    map.insert("upsert_fact", &tools.upsert_fact);
    map.insert("get_user_facts", &tools.get_user_facts);
    map.insert("forget_context", &tools.forget_context);
    map.insert("query_graph", &tools.query_graph);
    map.insert("update_scratchpad", &tools.update_scratchpad);
    map.insert("get_agent_state", &tools.get_agent_state);
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.server.log_level, "INFO");
        assert_eq!(config.veris_memory.max_retries, 3);
    }

    #[test]
    fn rejects_bad_log_level() {
        assert!(validate_log_level("LOUD").is_err());
        assert!(validate_log_level("debug").is_ok());
    }

    #[test]
    fn resolves_env_indirection() {
        std::env::set_var("SPEC_FULL_TEST_KEY", "secret-value");
        assert_eq!(
            resolve_env_indirection("${SPEC_FULL_TEST_KEY}"),
            Some("secret-value".to_string())
        );
        assert_eq!(
            resolve_env_indirection("literal"),
            Some("literal".to_string())
        );
        std::env::remove_var("SPEC_FULL_TEST_KEY");
    }
}
