//! The resolution loop: input line -> grammar -> (AI fallback) -> dispatch
//!
//! Each line is fully resolved before the next one is read. Grammar matching
//! always runs first; the model is only asked to reword the raw input when
//! the grammar misses, and at most once per line.

use crate::command::console::Console;
use crate::command::executor::Dispatcher;
use crate::command::registry::CommandRegistry;
use crate::grammar::{GrammarMatch, GrammarTable};
use crate::llm::model::TextGenerator;
use crate::llm::reinterpret::reinterpret;
use crate::services::speech::SpeechOutput;
use std::io;

pub const PROMPT: &str = "> ";
pub const COULD_NOT_PARSE: &str = "Could not parse command";

/// Function id whose result is already spoken by the command itself
const SPEAK_COMMAND: &str = "say";

/// What handling one input line produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// A quit token was entered
    Quit,
    /// Blank line
    Skipped,
    /// A command was dispatched; `text` is its result or failure message
    Replied { command: String, text: String },
    /// Neither the grammar nor the fallback produced a command
    CouldNotParse,
}

enum State<'g> {
    MatchGrammar { text: String, retried: bool },
    AiFallback,
    Dispatch(GrammarMatch<'g>),
}

pub struct ResolutionLoop<'a> {
    grammar: &'a GrammarTable,
    dispatcher: Dispatcher<'a>,
    fallback: Option<&'a dyn TextGenerator>,
    speaker: Option<&'a dyn SpeechOutput>,
    quit_tokens: Vec<String>,
}

impl<'a> ResolutionLoop<'a> {
    pub fn new(grammar: &'a GrammarTable, registry: &'a CommandRegistry) -> Self {
        Self {
            grammar,
            dispatcher: Dispatcher::new(registry),
            fallback: None,
            speaker: None,
            quit_tokens: vec!["quit".into(), "exit".into()],
        }
    }

    /// Enable the AI fallback with the given command model
    pub fn with_fallback(mut self, model: &'a dyn TextGenerator) -> Self {
        self.fallback = Some(model);
        self
    }

    /// Speak every command result
    pub fn with_speaker(mut self, speaker: &'a dyn SpeechOutput) -> Self {
        self.speaker = Some(speaker);
        self
    }

    pub fn with_quit_tokens(mut self, tokens: Vec<String>) -> Self {
        self.quit_tokens = tokens;
        self
    }

    /// Resolve and dispatch one input line
    pub fn handle_line(&self, line: &str, console: &mut dyn Console) -> LineOutcome {
        let raw = line.trim();
        if raw.is_empty() {
            return LineOutcome::Skipped;
        }
        if self.quit_tokens.iter().any(|t| t.eq_ignore_ascii_case(raw)) {
            return LineOutcome::Quit;
        }

        let mut state = State::MatchGrammar {
            text: raw.to_string(),
            retried: false,
        };

        loop {
            state = match state {
                State::MatchGrammar { text, retried } => match self.grammar.find_match(&text) {
                    Some(hit) => State::Dispatch(hit),
                    None if !retried && self.fallback.is_some() => State::AiFallback,
                    None => {
                        tracing::debug!("No grammar match for \"{}\"", text);
                        return LineOutcome::CouldNotParse;
                    }
                },
                State::AiFallback => {
                    let Some(model) = self.fallback else {
                        return LineOutcome::CouldNotParse;
                    };
                    // Always reinterpret the user's words, never a previous rewording
                    match reinterpret(model, raw) {
                        Ok(text) => {
                            tracing::info!("Reinterpreted \"{}\" as \"{}\"", raw, text);
                            State::MatchGrammar { text, retried: true }
                        }
                        Err(e) => {
                            tracing::warn!("AI fallback failed for \"{}\": {}", raw, e);
                            return LineOutcome::CouldNotParse;
                        }
                    }
                }
                State::Dispatch(hit) => {
                    let text = match self.dispatcher.dispatch(&hit.command, Some(hit.entry), console) {
                        Ok(outcome) => outcome.message(),
                        Err(e) => {
                            tracing::warn!("Dispatch failed: {}", e);
                            e.to_string()
                        }
                    };
                    return LineOutcome::Replied {
                        command: hit.command.function_id,
                        text,
                    };
                }
            };
        }
    }

    /// Read and handle lines until a quit token or end of input
    pub fn run(&self, console: &mut dyn Console) -> io::Result<()> {
        while let Some(line) = console.read_line(PROMPT)? {
            match self.handle_line(&line, console) {
                LineOutcome::Quit => {
                    console.write_line("Goodbye!")?;
                    break;
                }
                LineOutcome::Skipped => {}
                LineOutcome::CouldNotParse => console.write_line(COULD_NOT_PARSE)?,
                LineOutcome::Replied { command, text } => {
                    console.write_line(&text)?;
                    if let Some(speaker) = self.speaker {
                        if command != SPEAK_COMMAND {
                            if let Err(e) = speaker.speak(&text) {
                                tracing::warn!("Could not speak reply: {}", e);
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
