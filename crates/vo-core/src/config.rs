use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VoError};

/// Session inactivity window before a new session id is minted (seconds).
pub const DEFAULT_ROTATION_SECS: i64 = 3600;
/// How many memory documents the relevance middleware injects per turn.
pub const DEFAULT_MEMORY_CONTEXT_LIMIT: usize = 6;
/// How many trailing entries of a rotated-away session feed the bridge context.
pub const DEFAULT_BRIDGE_ENTRIES: usize = 6;

/// Top-level runtime config (vo.toml + VO_* env overrides).
///
/// Env vars take precedence over the TOML file, so `VO_AGENT_MODEL=...` wins
/// over `agent_model` in `vo.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoConfig {
    /// Provider key, e.g. `"anthropic"` or `"openai"`. `VO_AGENT_PROVIDER`.
    #[serde(default)]
    pub agent_provider: String,
    /// Model id passed through to the provider. `VO_AGENT_MODEL`.
    #[serde(default)]
    pub agent_model: String,
    /// Provider API key. `VO_AGENT_API_KEY`.
    #[serde(default)]
    pub agent_api_key: String,
    /// Directory holding the SQLite database. `VO_DATA_DIR`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Name the assistant answers to in group chats (ping detection).
    #[serde(default = "default_bot_name")]
    pub bot_name: String,
    /// Base system prompt for the agent.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Start the REPL automatically. `VO_AUTO_RUN=1`.
    #[serde(default, deserialize_with = "de_flag")]
    pub auto_run: bool,
    #[serde(default = "default_memory_context_limit")]
    pub memory_context_limit: usize,
    #[serde(default = "default_rotation_secs")]
    pub session_rotation_secs: i64,
}

impl Default for VoConfig {
    fn default() -> Self {
        Self {
            agent_provider: String::new(),
            agent_model: String::new(),
            agent_api_key: String::new(),
            data_dir: default_data_dir(),
            bot_name: default_bot_name(),
            system_prompt: default_system_prompt(),
            auto_run: false,
            memory_context_limit: DEFAULT_MEMORY_CONTEXT_LIMIT,
            session_rotation_secs: DEFAULT_ROTATION_SECS,
        }
    }
}

impl VoConfig {
    /// Load config: explicit path > ./vo.toml, then VO_* env overrides.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let toml_path = path.unwrap_or("vo.toml");
        Figment::new()
            .merge(Toml::file(toml_path))
            .merge(Env::prefixed("VO_"))
            .extract()
            .map_err(|e| VoError::Config(e.to_string()))
    }

    /// Validate that the fields every LLM call needs are present.
    ///
    /// Fatal at startup; the message names the exact variable to set.
    pub fn ensure_agent_configured(&self) -> Result<()> {
        if self.agent_provider.is_empty() {
            return Err(VoError::Config(
                "no provider configured; set VO_AGENT_PROVIDER".to_string(),
            ));
        }
        if self.agent_model.is_empty() {
            return Err(VoError::Config(
                "no model configured; set VO_AGENT_MODEL".to_string(),
            ));
        }
        if self.agent_api_key.is_empty() {
            return Err(VoError::Config(
                "no API key configured; set VO_AGENT_API_KEY".to_string(),
            ));
        }
        Ok(())
    }

    /// Path of the SQLite database file inside `data_dir`.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("vo.db")
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".vo")
}

fn default_bot_name() -> String {
    "vo".to_string()
}

fn default_system_prompt() -> String {
    "You are Vo, a helpful assistant that reacts to events from the \
     channels it is connected to."
        .to_string()
}

/// Accept `1`/`true`/`yes`/`on` in env vars as well as a real boolean.
fn de_flag<'de, D: serde::Deserializer<'de>>(de: D) -> std::result::Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Str(String),
    }
    Ok(match Flag::deserialize(de)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
        Flag::Str(s) => matches!(s.as_str(), "1" | "true" | "yes" | "on"),
    })
}

fn default_memory_context_limit() -> usize {
    DEFAULT_MEMORY_CONTEXT_LIMIT
}

fn default_rotation_secs() -> i64 {
    DEFAULT_ROTATION_SECS
}
