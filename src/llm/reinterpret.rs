//! Reword unmatched input into a phrase the grammar understands
//!
//! The command model is given the list of known phrases in its system
//! prompt and asked to answer with a single short command. Its reply is
//! cleaned up and fed back into grammar matching exactly once.

use crate::core::error::{AssistantError, Result};
use crate::grammar::GrammarTable;
use crate::llm::model::TextGenerator;

/// Default system prompt for the command model
pub const COMMAND_SYSTEM_PROMPT: &str = r#"You turn requests to a home assistant into short commands.
Answer with exactly ONE command phrase on a single line, no explanation,
no quotes. Use the wording of one of the KNOWN PHRASES below, replacing
<argN> with the matching words from the request (<argN>-> takes the rest
of the sentence). If nothing fits, answer with: chat <the request>

Examples:
"do you know what hour it is" -> what time is it
"i need to remember to call mom" -> remind me to call mom
"#;

/// Build the command model's system prompt from the grammar's phrases
pub fn build_command_prompt(base: &str, grammar: &GrammarTable) -> String {
    let mut prompt = String::from(base.trim_end());
    prompt.push_str("\n\nKNOWN PHRASES:\n");
    for entry in grammar.entries() {
        for pattern in entry.phrases() {
            prompt.push_str("- ");
            prompt.push_str(pattern.source());
            prompt.push('\n');
        }
    }
    prompt
}

/// Ask the model to reword `input` as a command phrase
pub fn reinterpret(model: &dyn TextGenerator, input: &str) -> Result<String> {
    let reply = model.generate(input)?;
    let cleaned = clean_reply(&reply);
    if cleaned.is_empty() {
        return Err(AssistantError::LlmError(format!(
            "Empty reinterpretation for: {}",
            input
        )));
    }
    Ok(cleaned)
}

/// Reduce a model reply to its first non-empty line without wrapping quotes
fn clean_reply(reply: &str) -> String {
    reply
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| {
            line.trim_matches(|c: char| matches!(c, '"' | '\'' | '`'))
                .trim()
                .to_string()
        })
        .unwrap_or_default()
}
