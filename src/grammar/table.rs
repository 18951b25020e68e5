//! The ordered table of configured command phrases
//!
//! Entries are tried in configuration order and, within an entry, phrases
//! in configuration order. The first phrase that matches wins; there is no
//! scoring, and `priority` is carried but does not affect the order.

use crate::core::error::{AssistantError, Result};
use crate::grammar::normalizer::Normalizer;
use crate::grammar::pattern::Pattern;
use crate::grammar::typo::TypoTolerance;
use serde::{Deserialize, Serialize};

/// A resolved command, ready for dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedCommand {
    /// Registry key of the command to run
    #[serde(rename = "command")]
    pub function_id: String,
    /// Captured argument values in placeholder encounter order
    pub arguments: Vec<String>,
}

/// One configured mapping from phrases to a command
#[derive(Debug, Clone)]
pub struct GrammarEntry {
    pub display_name: String,
    pub function_id: String,
    pub declared_arg_count: usize,
    pub requires_confirmation: bool,
    /// Reserved; matching follows declaration order
    pub priority: i32,
    phrases: Vec<Pattern>,
}

impl GrammarEntry {
    /// Build an entry, parsing and checking every phrase
    pub fn new(
        display_name: impl Into<String>,
        function_id: impl Into<String>,
        declared_arg_count: usize,
        requires_confirmation: bool,
        priority: i32,
        phrases: &[String],
    ) -> Result<Self> {
        let display_name = display_name.into();
        if phrases.is_empty() {
            return Err(AssistantError::Config(format!(
                "command call '{}' has no phrases",
                display_name
            )));
        }

        let mut patterns = Vec::with_capacity(phrases.len());
        for phrase in phrases {
            let pattern = Pattern::parse(phrase)?;
            if let Some(index) = pattern
                .placeholder_indices()
                .find(|i| *i >= declared_arg_count)
            {
                return Err(AssistantError::MalformedGrammar {
                    pattern: phrase.clone(),
                    reason: format!(
                        "placeholder <arg{}> exceeds declared argument count {}",
                        index, declared_arg_count
                    ),
                });
            }
            patterns.push(pattern);
        }

        Ok(Self {
            display_name,
            function_id: function_id.into(),
            declared_arg_count,
            requires_confirmation,
            priority,
            phrases: patterns,
        })
    }

    pub fn phrases(&self) -> &[Pattern] {
        &self.phrases
    }
}

/// A successful grammar match
#[derive(Debug, Clone)]
pub struct GrammarMatch<'a> {
    pub entry: &'a GrammarEntry,
    pub pattern: &'a Pattern,
    pub command: ParsedCommand,
}

/// Ordered collection of grammar entries plus the matching tables
#[derive(Debug, Clone)]
pub struct GrammarTable {
    entries: Vec<GrammarEntry>,
    normalizer: Normalizer,
    tolerance: TypoTolerance,
}

impl GrammarTable {
    pub fn new(entries: Vec<GrammarEntry>, normalizer: Normalizer, tolerance: TypoTolerance) -> Self {
        Self {
            entries,
            normalizer,
            tolerance,
        }
    }

    pub fn entries(&self) -> &[GrammarEntry] {
        &self.entries
    }

    /// Find the first phrase in the table matching `input`
    pub fn find_match(&self, input: &str) -> Option<GrammarMatch<'_>> {
        // Fillers are only stripped for patterns without a rest placeholder,
        // so at most two tokenizations are needed.
        let stripped = self.normalizer.normalize(input, true);
        let verbatim = self.normalizer.normalize(input, false);

        for entry in &self.entries {
            for pattern in &entry.phrases {
                let tokens = if pattern.has_rest() { &verbatim } else { &stripped };
                if let Some(arguments) = pattern.match_tokens(tokens, &self.tolerance) {
                    tracing::debug!(
                        "Matched \"{}\" to {} via \"{}\"",
                        input,
                        entry.function_id,
                        pattern.source()
                    );
                    return Some(GrammarMatch {
                        entry,
                        pattern,
                        command: ParsedCommand {
                            function_id: entry.function_id.clone(),
                            arguments,
                        },
                    });
                }
            }
        }

        None
    }

    /// Resolve `input` to a structured command
    pub fn resolve(&self, input: &str) -> Option<ParsedCommand> {
        self.find_match(input).map(|m| m.command)
    }
}
