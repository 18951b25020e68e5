//! Command dispatch - validates a parsed command and runs it

use crate::command::console::Console;
use crate::command::registry::{CommandError, CommandRegistry};
use crate::grammar::{GrammarEntry, ParsedCommand};
use std::io;
use thiserror::Error;

/// Result of a dispatch that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The command ran and produced this text
    Completed(String),
    /// No registry entry for this function id
    NotFound(String),
    /// The user declined the confirmation prompt
    Cancelled(String),
}

impl DispatchOutcome {
    /// Text shown to the user
    pub fn message(&self) -> String {
        match self {
            DispatchOutcome::Completed(text) => text.clone(),
            DispatchOutcome::NotFound(command) => format!("Command not found: {}", command),
            DispatchOutcome::Cancelled(command) => format!("Cancelled by user: {}", command),
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid argument count for {command}: expected {expected}, got {actual}")]
    InvalidArgumentCount {
        command: String,
        expected: usize,
        actual: usize,
    },

    #[error("{command} failed: {source}")]
    Execution {
        command: String,
        #[source]
        source: CommandError,
    },

    #[error("confirmation failed: {0}")]
    Confirmation(#[from] io::Error),
}

/// Runs parsed commands against the registry
pub struct Dispatcher<'a> {
    registry: &'a CommandRegistry,
}

impl<'a> Dispatcher<'a> {
    pub fn new(registry: &'a CommandRegistry) -> Self {
        Self { registry }
    }

    /// Validate, confirm if needed, then run the command
    ///
    /// `origin` is the grammar entry the command was matched through; its
    /// confirmation flag decides whether the user is asked first.
    pub fn dispatch(
        &self,
        command: &ParsedCommand,
        origin: Option<&GrammarEntry>,
        console: &mut dyn Console,
    ) -> Result<DispatchOutcome, DispatchError> {
        let Some(entry) = self.registry.get(&command.function_id) else {
            tracing::warn!("No command registered for {}", command.function_id);
            return Ok(DispatchOutcome::NotFound(command.function_id.clone()));
        };

        if command.arguments.len() != entry.expected_arg_count {
            return Err(DispatchError::InvalidArgumentCount {
                command: command.function_id.clone(),
                expected: entry.expected_arg_count,
                actual: command.arguments.len(),
            });
        }

        if let Some(origin) = origin.filter(|e| e.requires_confirmation) {
            let prompt = format!("Run {}? [y/N] ", origin.display_name);
            let answer = console.read_line(&prompt)?;
            if !is_affirmative(answer.as_deref()) {
                tracing::info!("{} cancelled by user", command.function_id);
                return Ok(DispatchOutcome::Cancelled(command.function_id.clone()));
            }
        }

        tracing::debug!("Running {} with {:?}", command.function_id, command.arguments);
        let text = entry
            .executable
            .run(&command.arguments)
            .map_err(|source| DispatchError::Execution {
                command: command.function_id.clone(),
                source,
            })?;

        Ok(DispatchOutcome::Completed(text))
    }
}

fn is_affirmative(answer: Option<&str>) -> bool {
    matches!(
        answer.map(|a| a.trim().to_lowercase()).as_deref(),
        Some("yes") | Some("y")
    )
}
