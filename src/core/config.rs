//! Assistant configuration
//!
//! Loaded once at startup from JSON (`config.json`) or TOML (`*.toml`) and
//! validated before the resolution loop starts. Any problem here is fatal:
//! the loop never runs with a half-valid grammar.

use crate::core::error::{AssistantError, Result};
use crate::grammar::normalizer::{DEFAULT_FILLER_WORDS, DEFAULT_SYMBOLS};
use crate::grammar::{GrammarEntry, GrammarTable, Normalizer, TypoTolerance, DEFAULT_TYPO_RATIO};
use crate::services::transport::QoS;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Grammar entries, tried in this order
    #[serde(alias = "commandCalls")]
    pub command_calls: Vec<CommandCallConfig>,
    pub model: ModelConfig,
    pub mqtt: MqttConfig,
    pub voice: VoiceConfig,
    pub matching: MatchingConfig,
}

/// One grammar entry: phrases mapped to a command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandCallConfig {
    /// Human-readable name, used in logs and confirmation prompts
    pub name: String,
    /// Registry key of the command to run
    pub function: String,
    /// Number of placeholders the phrases may use
    #[serde(default, alias = "NArgs")]
    pub n_args: usize,
    /// Ask "yes/no" before running
    #[serde(default)]
    pub confirmation: bool,
    /// Reserved; matching follows declaration order
    #[serde(default)]
    pub priority: i32,
    pub phrases: Vec<String>,
}

/// Language model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Enables the `chat` command and the AI fallback
    pub enabled: bool,
    /// Chat completion endpoint (Anthropic or OpenAI-compatible)
    pub api_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    /// System prompt for reinterpretation; the known phrases are appended
    pub command_prompt: Option<String>,
    /// System prompt for the `chat` command
    #[serde(alias = "init_message")]
    pub chat_prompt: String,
    /// Keep the chat conversation between `chat` calls
    #[serde(alias = "keepHistory")]
    pub keep_history: bool,
    pub max_tokens: u32,
    /// Per-request timeout, so a stuck model cannot hang the loop
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: "http://localhost:8080/v1/chat/completions".into(),
            model: "local".into(),
            api_key_env: "LLM_API_KEY".into(),
            command_prompt: None,
            chat_prompt: "You are Azazel, a concise and helpful voice assistant. Keep answers short.".into(),
            keep_history: true,
            max_tokens: 512,
            timeout_secs: 30,
        }
    }
}

/// Message transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub enabled: bool,
    #[serde(alias = "broker_ip")]
    pub broker_host: String,
    pub broker_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
    #[serde(alias = "keepalive")]
    pub keep_alive_secs: u64,
    /// Start without session state left on the broker
    pub clean_session: bool,
    /// How long `subscribe` commands wait for a message
    pub subscribe_timeout_secs: u64,
    pub commands: Vec<MqttCommandConfig>,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            broker_host: "localhost".into(),
            broker_port: 1883,
            username: None,
            password: None,
            client_id: "azazel".into(),
            keep_alive_secs: 60,
            clean_session: true,
            subscribe_timeout_secs: 5,
            commands: Vec::new(),
        }
    }
}

/// A publish or subscribe command bound to a topic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttCommandConfig {
    /// Matches `CommandCallConfig::function`
    pub name: String,
    #[serde(rename = "type")]
    pub kind: MqttCommandKind,
    pub topic: String,
    #[serde(default = "default_qos")]
    pub qos: QoS,
    #[serde(default)]
    pub retain: bool,
    /// Publish payload; `<argN>` is replaced by the N-th argument
    #[serde(default)]
    pub payload: String,
    #[serde(default, alias = "NArgs")]
    pub n_args: usize,
}

fn default_qos() -> QoS {
    QoS::AtMostOnce
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MqttCommandKind {
    Publish,
    Subscribe,
}

/// Speech output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub enabled: bool,
    /// TTS program that reads text on stdin
    pub program: String,
    pub args: Vec<String>,
    /// Also speak every command result
    pub speak_replies: bool,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            program: "espeak-ng".into(),
            args: Vec::new(),
            speak_replies: false,
        }
    }
}

/// Normalization and matching settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Maximum `edit distance / mean length` for literal tokens
    pub typo_ratio: f32,
    pub filler_words: Vec<String>,
    pub symbols: Vec<String>,
    /// Inputs that end the session
    pub quit_tokens: Vec<String>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            typo_ratio: DEFAULT_TYPO_RATIO,
            filler_words: DEFAULT_FILLER_WORDS.iter().map(|s| s.to_string()).collect(),
            symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            quit_tokens: vec!["quit".into(), "exit".into()],
        }
    }
}

impl AssistantConfig {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = if path.extension().and_then(|e| e.to_str()) == Some("toml") {
            Self::from_toml(&content)?
        } else {
            Self::from_json(&content)?
        };
        config.validate()?;
        tracing::info!(
            "Loaded {} command call(s) from {}",
            config.command_calls.len(),
            path.display()
        );
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        TypoTolerance::new(self.matching.typo_ratio)?;
        self.grammar_entries()?;

        let mut names = HashSet::new();
        for command in &self.mqtt.commands {
            if !names.insert(command.name.as_str()) {
                return Err(AssistantError::Config(format!(
                    "duplicate mqtt command '{}'",
                    command.name
                )));
            }
            if command.topic.is_empty() {
                return Err(AssistantError::Config(format!(
                    "mqtt command '{}' has no topic",
                    command.name
                )));
            }
        }

        if self.model.enabled && self.model.timeout_secs == 0 {
            return Err(AssistantError::Config("model.timeout_secs must be positive".into()));
        }
        if self.mqtt.enabled && self.mqtt.subscribe_timeout_secs == 0 {
            return Err(AssistantError::Config(
                "mqtt.subscribe_timeout_secs must be positive".into(),
            ));
        }
        if self.mqtt.enabled && self.mqtt.broker_host.is_empty() {
            return Err(AssistantError::Config("mqtt.broker_host must be set".into()));
        }
        if self.mqtt.enabled && (self.mqtt.client_id.is_empty() || self.mqtt.client_id.starts_with(' ')) {
            return Err(AssistantError::Config(
                "mqtt.client_id must be non-empty and not start with a space".into(),
            ));
        }

        Ok(())
    }

    /// Parse every command call into a grammar entry
    pub fn grammar_entries(&self) -> Result<Vec<GrammarEntry>> {
        self.command_calls
            .iter()
            .map(|call| {
                GrammarEntry::new(
                    call.name.clone(),
                    call.function.clone(),
                    call.n_args,
                    call.confirmation,
                    call.priority,
                    &call.phrases,
                )
            })
            .collect()
    }

    /// Build the grammar table with this configuration's matching tables
    pub fn build_grammar(&self) -> Result<GrammarTable> {
        let normalizer = Normalizer::new(
            self.matching.filler_words.clone(),
            self.matching.symbols.clone(),
        );
        let tolerance = TypoTolerance::new(self.matching.typo_ratio)?;
        Ok(GrammarTable::new(self.grammar_entries()?, normalizer, tolerance))
    }
}
