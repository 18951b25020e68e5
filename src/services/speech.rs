//! Speech output
//!
//! Synthesis itself happens in an external text-to-speech program
//! (e.g. `espeak-ng` or a piper pipeline); the assistant only hands it text.

use crate::core::error::{AssistantError, Result};
use std::io::Write;
use std::process::{Command, Stdio};

/// Capability to speak text aloud
pub trait SpeechOutput: Send + Sync {
    fn speak(&self, text: &str) -> Result<()>;
}

/// Speaks by piping text into an external TTS program's stdin
#[derive(Debug, Clone)]
pub struct ProgramSpeaker {
    program: String,
    args: Vec<String>,
}

impl ProgramSpeaker {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl SpeechOutput for ProgramSpeaker {
    fn speak(&self, text: &str) -> Result<()> {
        tracing::debug!("Speaking {} chars via {}", text.len(), self.program);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| AssistantError::Speech(format!("failed to start {}: {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes())?;
        }

        let status = child.wait()?;
        if !status.success() {
            return Err(AssistantError::Speech(format!(
                "{} exited with {}",
                self.program, status
            )));
        }
        Ok(())
    }
}
