//! Layered config loading: defaults, optional YAML file, environment
//! overrides, then validation.

use log::{debug, warn};
use std::collections::HashMap;
use std::path::Path;

use crate::error::ConfigError;
use crate::model::PipelineConfig;

/// Load config from an optional YAML file and the process environment.
///
/// A `None` path or a missing file yields defaults; a file that exists but
/// does not parse is an error.
pub fn load(path: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    let mut config = match path {
        Some(path) if path.exists() => {
            let text = std::fs::read_to_string(path)?;
            debug!("loaded config from {}", path.display());
            parse_yaml(&text)?
        }
        Some(path) => {
            warn!("config file {} not found, using defaults", path.display());
            PipelineConfig::default()
        }
        None => PipelineConfig::default(),
    };

    let vars: HashMap<String, String> = std::env::vars().collect();
    apply_env_overrides(&mut config, &vars);
    validate(&config)?;
    Ok(config)
}

/// Parse config from YAML text with environment overrides already in hand.
pub fn load_from_str(
    text: &str,
    vars: &HashMap<String, String>,
) -> Result<PipelineConfig, ConfigError> {
    let mut config = parse_yaml(text)?;
    apply_env_overrides(&mut config, vars);
    validate(&config)?;
    Ok(config)
}

/// An empty document is valid and means all defaults.
fn parse_yaml(text: &str) -> Result<PipelineConfig, ConfigError> {
    if text.trim().is_empty() {
        return Ok(PipelineConfig::default());
    }
    Ok(serde_yaml::from_str(text)?)
}

/// Apply environment overrides from an explicit variable map. Unparseable
/// numeric overrides are ignored with a warning rather than failing a run.
pub fn apply_env_overrides(config: &mut PipelineConfig, vars: &HashMap<String, String>) {
    if let Some(topic) = non_empty(vars.get("COLLOQUY_TOPIC")) {
        config.topic = topic;
    }
    if let Some(raw) = non_empty(vars.get("COLLOQUY_BATCH_SIZE")) {
        match raw.parse::<usize>() {
            Ok(size) => config.batch_size = size,
            Err(_) => warn!("ignoring unparseable COLLOQUY_BATCH_SIZE: {raw}"),
        }
    }
    if let Some(raw) = non_empty(vars.get("COLLOQUY_VECTOR_DIM")) {
        match raw.parse::<usize>() {
            Ok(dim) => config.memory.vector_dim = dim,
            Err(_) => warn!("ignoring unparseable COLLOQUY_VECTOR_DIM: {raw}"),
        }
    }
    if let Some(key) = non_empty(vars.get("COLLOQUY_API_KEY"))
        .or_else(|| non_empty(vars.get("OPENAI_API_KEY")))
    {
        config.llm.api_key = Some(key);
    }
    if let Some(base_url) = non_empty(vars.get("COLLOQUY_BASE_URL")) {
        config.llm.base_url = base_url;
    }
    if let Some(model) = non_empty(vars.get("COLLOQUY_MODEL")) {
        config.llm.model = model;
    }
    if let Some(model) = non_empty(vars.get("COLLOQUY_EMBEDDING_MODEL")) {
        config.llm.embedding_model = model;
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate(config: &PipelineConfig) -> Result<(), ConfigError> {
    if config.batch_size == 0 {
        return Err(ConfigError::InvalidField {
            path: "batch_size".to_string(),
            message: "must be at least 1".to_string(),
        });
    }
    if config.memory.vector_dim == 0 {
        return Err(ConfigError::InvalidField {
            path: "memory.vector_dim".to_string(),
            message: "must be at least 1".to_string(),
        });
    }
    if config.agents.is_empty() {
        return Err(ConfigError::InvalidField {
            path: "agents".to_string(),
            message: "at least one agent is required".to_string(),
        });
    }
    for (i, agent) in config.agents.iter().enumerate() {
        if agent.name.trim().is_empty() {
            return Err(ConfigError::InvalidField {
                path: format!("agents[{i}].name"),
                message: "must not be empty".to_string(),
            });
        }
    }
    Ok(())
}
