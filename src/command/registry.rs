//! Command registry: the executable commands known at runtime
//!
//! Built once at startup from the enabled features. Date/time commands are
//! always present; chat, messaging and speech commands are added only when
//! their feature is enabled, each holding the collaborator it talks to.

use crate::command::datetime;
use crate::core::config::{AssistantConfig, MqttCommandConfig, MqttCommandKind};
use crate::core::error::{AssistantError, Result};
use crate::llm::model::TextGenerator;
use crate::services::speech::SpeechOutput;
use crate::services::transport::{MessageTransport, QoS, TransportError};
use chrono::Local;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Failure raised by a command while running
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("missing argument {0}")]
    MissingArgument(usize),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Service(#[from] AssistantError),
}

/// What a registry entry runs, with the collaborator it needs
pub enum Executable {
    /// `getCurrentDateTime <what>`
    CurrentDateTime,
    /// `getDateTime <what> <when> <unit>`
    DateTime,
    /// Forward the argument to the chat model
    Chat { model: Arc<dyn TextGenerator> },
    /// Drop the chat model's conversation history
    ClearHistory { model: Arc<dyn TextGenerator> },
    /// Publish a payload template to a topic
    Publish {
        transport: Arc<dyn MessageTransport>,
        topic: String,
        payload: String,
        qos: QoS,
        retain: bool,
    },
    /// Wait for the next message on a topic
    Subscribe {
        transport: Arc<dyn MessageTransport>,
        topic: String,
        qos: QoS,
        timeout: Duration,
    },
    /// Speak the argument aloud
    Speak { voice: Arc<dyn SpeechOutput> },
}

impl Executable {
    /// Run with already count-checked arguments
    pub fn run(&self, args: &[String]) -> std::result::Result<String, CommandError> {
        match self {
            Executable::CurrentDateTime => {
                let what = arg(args, 0)?;
                Ok(datetime::current_date_time(what, Local::now().naive_local()))
            }
            Executable::DateTime => {
                let what = arg(args, 0)?;
                let when = arg(args, 1)?;
                let unit = args.get(2).map(String::as_str).unwrap_or("");
                Ok(datetime::date_time(what, when, unit, Local::now().naive_local()))
            }
            Executable::Chat { model } => Ok(model.generate(arg(args, 0)?)?),
            Executable::ClearHistory { model } => {
                model.reset()?;
                Ok("Conversation cleared".to_string())
            }
            Executable::Publish {
                transport,
                topic,
                payload,
                qos,
                retain,
            } => {
                let payload = fill_payload(payload, args);
                transport.publish(topic, &payload, *qos, *retain)?;
                Ok("Publish successful".to_string())
            }
            Executable::Subscribe {
                transport,
                topic,
                qos,
                timeout,
            } => Ok(transport.subscribe(topic, *qos, *timeout)?),
            Executable::Speak { voice } => {
                let text = arg(args, 0)?;
                voice.speak(text)?;
                Ok(text.to_string())
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Executable::CurrentDateTime => "CurrentDateTime",
            Executable::DateTime => "DateTime",
            Executable::Chat { .. } => "Chat",
            Executable::ClearHistory { .. } => "ClearHistory",
            Executable::Publish { .. } => "Publish",
            Executable::Subscribe { .. } => "Subscribe",
            Executable::Speak { .. } => "Speak",
        }
    }
}

impl fmt::Debug for Executable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

fn arg(args: &[String], index: usize) -> std::result::Result<&str, CommandError> {
    args.get(index)
        .map(String::as_str)
        .ok_or(CommandError::MissingArgument(index))
}

/// Substitute `<argN>` in a payload template
fn fill_payload(template: &str, args: &[String]) -> String {
    args.iter()
        .enumerate()
        .fold(template.to_string(), |payload, (i, value)| {
            payload.replace(&format!("<arg{}>", i), value)
        })
}

/// One executable command
#[derive(Debug)]
pub struct RegistryEntry {
    pub function_id: String,
    pub expected_arg_count: usize,
    /// Advisory labels describing each argument
    pub arg_type_hints: Vec<String>,
    pub executable: Executable,
}

impl RegistryEntry {
    pub fn new(function_id: &str, hints: &[&str], executable: Executable) -> Self {
        Self {
            function_id: function_id.to_string(),
            expected_arg_count: hints.len(),
            arg_type_hints: hints.iter().map(|h| h.to_string()).collect(),
            executable,
        }
    }
}

/// Collaborators handed to commands at registry construction
#[derive(Default, Clone)]
pub struct Services {
    pub chat_model: Option<Arc<dyn TextGenerator>>,
    pub transport: Option<Arc<dyn MessageTransport>>,
    pub voice: Option<Arc<dyn SpeechOutput>>,
}

/// The set of executable commands
#[derive(Debug, Default)]
pub struct CommandRegistry {
    entries: Vec<RegistryEntry>,
}

impl CommandRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding only the built-in date/time commands
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(RegistryEntry::new(
            "getCurrentDateTime",
            &["String"],
            Executable::CurrentDateTime,
        ));
        registry.register(RegistryEntry::new(
            "getDateTime",
            &["String", "Integer", "String"],
            Executable::DateTime,
        ));
        registry
    }

    /// Build the registry for the enabled features
    ///
    /// Fails if a feature is enabled without the collaborator it needs.
    pub fn from_config(config: &AssistantConfig, services: &Services) -> Result<Self> {
        let mut registry = Self::with_builtins();

        if config.mqtt.enabled {
            let transport = services.transport.clone().ok_or_else(|| {
                AssistantError::Config("mqtt is enabled but no transport is available".into())
            })?;
            let timeout = Duration::from_secs(config.mqtt.subscribe_timeout_secs);

            for call in &config.command_calls {
                for mqtt in config.mqtt.commands.iter().filter(|m| m.name == call.function) {
                    registry.register(mqtt_entry(mqtt, Arc::clone(&transport), timeout));
                }
            }
        }

        if config.model.enabled {
            let model = services.chat_model.clone().ok_or_else(|| {
                AssistantError::Config("model is enabled but no chat model is available".into())
            })?;
            registry.register(RegistryEntry::new(
                "chat",
                &["String"],
                Executable::Chat {
                    model: Arc::clone(&model),
                },
            ));
            registry.register(RegistryEntry::new("clearHistory", &[], Executable::ClearHistory { model }));
        }

        if config.voice.enabled {
            let voice = services.voice.clone().ok_or_else(|| {
                AssistantError::Config("voice is enabled but no speech output is available".into())
            })?;
            registry.register(RegistryEntry::new("say", &["String"], Executable::Speak { voice }));
        }

        Ok(registry)
    }

    /// Add a command, replacing any previous command with the same id
    pub fn register(&mut self, entry: RegistryEntry) {
        tracing::debug!(
            "Registering {} ({:?}, {} args)",
            entry.function_id,
            entry.executable,
            entry.expected_arg_count
        );
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|e| e.function_id == entry.function_id)
        {
            *existing = entry;
        } else {
            self.entries.push(entry);
        }
    }

    pub fn get(&self, function_id: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.function_id == function_id)
    }

    pub fn function_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.function_id.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn mqtt_entry(mqtt: &MqttCommandConfig, transport: Arc<dyn MessageTransport>, timeout: Duration) -> RegistryEntry {
    let executable = match mqtt.kind {
        MqttCommandKind::Publish => Executable::Publish {
            transport,
            topic: mqtt.topic.clone(),
            payload: mqtt.payload.clone(),
            qos: mqtt.qos,
            retain: mqtt.retain,
        },
        MqttCommandKind::Subscribe => Executable::Subscribe {
            transport,
            topic: mqtt.topic.clone(),
            qos: mqtt.qos,
            timeout,
        },
    };

    RegistryEntry {
        function_id: mqtt.name.clone(),
        expected_arg_count: mqtt.n_args,
        arg_type_hints: vec!["String".to_string(); mqtt.n_args],
        executable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::transport::InProcessBroker;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Echo {
        resets: AtomicUsize,
    }

    impl TextGenerator for Echo {
        fn generate(&self, prompt: &str) -> Result<String> {
            Ok(format!("echo: {}", prompt))
        }

        fn reset(&self) -> Result<()> {
            self.resets.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn mqtt_config() -> AssistantConfig {
        AssistantConfig::from_json(
            r#"{
                "commandCalls": [
                    {"name": "Light", "function": "setLight", "NArgs": 1, "phrases": ["turn the light <arg0>"]},
                    {"name": "Temp", "function": "readTemp", "phrases": ["how warm is it"]}
                ],
                "mqtt": {
                    "enabled": true,
                    "subscribe_timeout_secs": 1,
                    "commands": [
                        {"name": "setLight", "type": "publish", "topic": "home/light", "payload": "<arg0>", "retain": true, "NArgs": 1},
                        {"name": "readTemp", "type": "subscribe", "topic": "home/temp"},
                        {"name": "unused", "type": "publish", "topic": "home/unused"}
                    ]
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_builtins_always_present() {
        let registry = CommandRegistry::from_config(&AssistantConfig::default(), &Services::default()).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("getCurrentDateTime").unwrap().expected_arg_count, 1);
        assert_eq!(registry.get("getDateTime").unwrap().expected_arg_count, 3);
        assert!(registry.get("chat").is_none());
    }

    #[test]
    fn test_chat_registered_when_model_enabled() {
        let mut config = AssistantConfig::default();
        config.model.enabled = true;

        assert!(CommandRegistry::from_config(&config, &Services::default()).is_err());

        let services = Services {
            chat_model: Some(Arc::new(Echo::default())),
            ..Services::default()
        };
        let registry = CommandRegistry::from_config(&config, &services).unwrap();
        let chat = registry.get("chat").unwrap();
        assert_eq!(chat.executable.run(&["hi".into()]).unwrap(), "echo: hi");
    }

    #[test]
    fn test_clear_history_resets_chat_model() {
        let mut config = AssistantConfig::default();
        config.model.enabled = true;
        let model = Arc::new(Echo::default());
        let services = Services {
            chat_model: Some(model.clone()),
            ..Services::default()
        };

        let registry = CommandRegistry::from_config(&config, &services).unwrap();
        let clear = registry.get("clearHistory").unwrap();
        assert_eq!(clear.expected_arg_count, 0);
        assert_eq!(clear.executable.run(&[]).unwrap(), "Conversation cleared");
        assert_eq!(model.resets.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_mqtt_commands_follow_grammar() {
        let broker = Arc::new(InProcessBroker::new());
        let services = Services {
            transport: Some(broker.clone()),
            ..Services::default()
        };
        let registry = CommandRegistry::from_config(&mqtt_config(), &services).unwrap();

        assert!(registry.get("unused").is_none());
        let light = registry.get("setLight").unwrap();
        assert_eq!(light.expected_arg_count, 1);
        assert_eq!(light.executable.run(&["on".into()]).unwrap(), "Publish successful");

        let message = broker
            .subscribe("home/light", QoS::AtMostOnce, Duration::from_millis(10))
            .unwrap();
        assert_eq!(message, "on");
    }

    #[test]
    fn test_subscribe_timeout_is_command_error() {
        let services = Services {
            transport: Some(Arc::new(InProcessBroker::new())),
            ..Services::default()
        };
        let registry = CommandRegistry::from_config(&mqtt_config(), &services).unwrap();
        let result = registry.get("readTemp").unwrap().executable.run(&[]);
        assert!(matches!(
            result,
            Err(CommandError::Transport(TransportError::Timeout { .. }))
        ));
    }

    #[test]
    fn test_register_replaces_duplicates() {
        let mut registry = CommandRegistry::with_builtins();
        registry.register(RegistryEntry::new("getDateTime", &["String"], Executable::DateTime));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("getDateTime").unwrap().expected_arg_count, 1);
    }

    #[test]
    fn test_fill_payload() {
        assert_eq!(
            fill_payload("{\"state\": \"<arg0>\", \"room\": \"<arg1>\"}", &["on".into(), "kitchen".into()]),
            "{\"state\": \"on\", \"room\": \"kitchen\"}"
        );
        assert_eq!(fill_payload("OFF", &[]), "OFF");
    }

    #[test]
    fn test_current_date_time_reply() {
        let registry = CommandRegistry::with_builtins();
        let reply = registry
            .get("getCurrentDateTime")
            .unwrap()
            .executable
            .run(&["time".into()])
            .unwrap();
        assert!(reply.starts_with("It is "));
    }
}
