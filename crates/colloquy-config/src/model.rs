//! Configuration schema for the review pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root config for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Research topic the team investigates.
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Papers processed concurrently per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Whether perception also extracts structured claims.
    #[serde(default = "default_claims_enabled")]
    pub claims_enabled: bool,
    /// Directory holding shared state documents.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    /// The research team. At least one agent is required.
    #[serde(default = "default_agents")]
    pub agents: Vec<AgentSettings>,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub memory: MemorySettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            batch_size: default_batch_size(),
            claims_enabled: default_claims_enabled(),
            state_dir: default_state_dir(),
            agents: default_agents(),
            llm: LlmSettings::default(),
            memory: MemorySettings::default(),
        }
    }
}

/// One agent's identity and persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSettings {
    pub name: String,
    #[serde(default)]
    pub persona: String,
}

/// Model provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Read from the environment when absent from the file.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            embedding_model: default_embedding_model(),
        }
    }
}

/// Memory tier settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySettings {
    /// Embedding width for the vector index.
    #[serde(default = "default_vector_dim")]
    pub vector_dim: usize,
    /// Directory for per-agent durable memory logs; `None` disables the
    /// durable tier.
    #[serde(default)]
    pub durable_dir: Option<PathBuf>,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            vector_dim: default_vector_dim(),
            durable_dir: None,
        }
    }
}

fn default_topic() -> String {
    "hypertension".to_string()
}

fn default_batch_size() -> usize {
    5
}

fn default_claims_enabled() -> bool {
    true
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("state")
}

fn default_agents() -> Vec<AgentSettings> {
    vec![
        AgentSettings {
            name: "Dr. Analysis".to_string(),
            persona: "You are rigorous and sceptical, focused on methodology \
                      and the limits of what the evidence can support."
                .to_string(),
        },
        AgentSettings {
            name: "Dr. Synthesis".to_string(),
            persona: "You are integrative and creative, focused on connecting \
                      findings across studies into larger patterns."
                .to_string(),
        },
    ]
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_vector_dim() -> usize {
    1536
}
