//! Azazel - Entry Point
//!
//! Loads the configuration, builds the grammar and command registry for the
//! enabled features, then runs the resolution loop on stdin/stdout.

use azazel::command::{CommandRegistry, ResolutionLoop, Services, StdConsole};
use azazel::core::error::Result;
use azazel::core::AssistantConfig;
use azazel::llm::{build_command_prompt, LlmClient, ModelHandle, COMMAND_SYSTEM_PROMPT};
use azazel::services::{MessageTransport, MqttTransport, ProgramSpeaker, SpeechOutput};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

/// Voice/text assistant driven by a phrase grammar
#[derive(Parser, Debug)]
#[command(name = "azazel")]
#[command(about = "Resolve natural-language commands through a phrase grammar")]
struct Args {
    /// Configuration file (.json or .toml)
    #[arg(long, short = 'c', default_value = "config.json")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let default_filter = if args.verbose { "azazel=debug" } else { "azazel=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let config = AssistantConfig::load(&args.config)?;
    let grammar = config.build_grammar()?;

    // Shared by blocking model calls and the MQTT event loop
    let runtime = Arc::new(Runtime::new()?);

    let mut services = Services::default();
    let mut command_model = None;
    if config.model.enabled {
        let chat = ModelHandle::new(
            Arc::clone(&runtime),
            LlmClient::from_config(&config.model)?,
            config.model.chat_prompt.clone(),
            config.model.keep_history,
        );
        services.chat_model = Some(Arc::new(chat));

        let base = config
            .model
            .command_prompt
            .as_deref()
            .unwrap_or(COMMAND_SYSTEM_PROMPT);
        command_model = Some(ModelHandle::new(
            Arc::clone(&runtime),
            LlmClient::from_config(&config.model)?,
            build_command_prompt(base, &grammar),
            false,
        ));
    } else {
        tracing::info!("Model disabled - running without chat or AI fallback");
    }

    if config.mqtt.enabled {
        let transport: Arc<dyn MessageTransport> = Arc::new(MqttTransport::connect(&config.mqtt, &runtime));
        services.transport = Some(transport);
    }

    let speaker = config
        .voice
        .enabled
        .then(|| Arc::new(ProgramSpeaker::new(config.voice.program.clone(), config.voice.args.clone())));
    if let Some(speaker) = &speaker {
        let voice: Arc<dyn SpeechOutput> = speaker.clone();
        services.voice = Some(voice);
    }

    let registry = CommandRegistry::from_config(&config, &services)?;
    tracing::info!(
        "Ready: {} grammar entries, commands: {}",
        grammar.entries().len(),
        registry.function_ids().collect::<Vec<_>>().join(", ")
    );

    let mut resolution =
        ResolutionLoop::new(&grammar, &registry).with_quit_tokens(config.matching.quit_tokens.clone());
    if let Some(model) = &command_model {
        resolution = resolution.with_fallback(model);
    }
    if let Some(speaker) = speaker.as_deref().filter(|_| config.voice.speak_replies) {
        resolution = resolution.with_speaker(speaker);
    }

    println!("\n=== AZAZEL ===");
    println!("Type a command, or {} to leave.", config.matching.quit_tokens.join(" / "));
    println!();

    resolution.run(&mut StdConsole)?;
    Ok(())
}
