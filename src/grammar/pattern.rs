//! Phrase patterns and token-level matching
//!
//! A pattern is a space-separated sequence of tokens:
//! - literal words, compared case-insensitively with typo tolerance
//! - `<argN>`, capturing exactly one input token
//! - `<argN>->`, capturing every remaining input token joined by spaces
//!
//! A rest placeholder ends the pattern; tokens after it are rejected when
//! the pattern is parsed.

use crate::core::error::{AssistantError, Result};
use crate::grammar::typo::TypoTolerance;

/// One token of a parsed pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternToken {
    /// A literal word, stored lowercase
    Literal(String),
    /// `<argN>`: one input token
    Positional(usize),
    /// `<argN>->`: all remaining input tokens
    Rest(usize),
}

/// A parsed grammar phrase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    tokens: Vec<PatternToken>,
}

impl Pattern {
    /// Parse a phrase such as `"remind me to <arg0>->"`
    pub fn parse(source: &str) -> Result<Self> {
        let mut tokens = Vec::new();

        for word in source.split_whitespace() {
            if matches!(tokens.last(), Some(PatternToken::Rest(_))) {
                return Err(malformed(source, "tokens after a rest placeholder are unreachable"));
            }
            tokens.push(parse_token(source, word)?);
        }

        Ok(Self {
            source: source.to_string(),
            tokens,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tokens(&self) -> &[PatternToken] {
        &self.tokens
    }

    /// Whether this pattern ends with a rest placeholder
    pub fn has_rest(&self) -> bool {
        matches!(self.tokens.last(), Some(PatternToken::Rest(_)))
    }

    /// Declared placeholder indices, in the order they appear
    pub fn placeholder_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.tokens.iter().filter_map(|t| match t {
            PatternToken::Positional(i) | PatternToken::Rest(i) => Some(*i),
            PatternToken::Literal(_) => None,
        })
    }

    /// Match normalized input tokens against this pattern
    ///
    /// # Returns
    /// The captured argument values in the order their placeholders appear,
    /// or `None` when the input does not match.
    pub fn match_tokens(&self, input: &[String], tolerance: &TypoTolerance) -> Option<Vec<String>> {
        if !self.has_rest() && input.len() != self.tokens.len() {
            return None;
        }

        let mut arguments = Vec::new();
        let mut cursor = 0;

        for token in &self.tokens {
            match token {
                PatternToken::Positional(_) => {
                    let value = input.get(cursor)?;
                    arguments.push(value.clone());
                    cursor += 1;
                }
                PatternToken::Rest(_) => {
                    // Nothing left captures an empty value
                    arguments.push(input.get(cursor..).unwrap_or_default().join(" "));
                    return Some(arguments);
                }
                PatternToken::Literal(literal) => {
                    let value = input.get(cursor)?.to_lowercase();
                    if value != *literal && !tolerance.accepts(literal, &value) {
                        return None;
                    }
                    cursor += 1;
                }
            }
        }

        Some(arguments)
    }
}

fn parse_token(source: &str, word: &str) -> Result<PatternToken> {
    if !word.starts_with('<') {
        return Ok(PatternToken::Literal(word.to_lowercase()));
    }

    let (body, rest) = if let Some(body) = word.strip_suffix(">->") {
        (body, true)
    } else if let Some(body) = word.strip_suffix('>') {
        (body, false)
    } else {
        return Err(malformed(source, &format!("unterminated placeholder {}", word)));
    };

    let index = body
        .strip_prefix("<arg")
        .and_then(|digits| digits.parse::<usize>().ok())
        .ok_or_else(|| malformed(source, &format!("invalid placeholder index in {}", word)))?;

    Ok(if rest {
        PatternToken::Rest(index)
    } else {
        PatternToken::Positional(index)
    })
}

fn malformed(pattern: &str, reason: &str) -> AssistantError {
    AssistantError::MalformedGrammar {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_parse_token_kinds() {
        let pattern = Pattern::parse("What <arg0> is <arg1>->").unwrap();
        assert_eq!(
            pattern.tokens(),
            &[
                PatternToken::Literal("what".into()),
                PatternToken::Positional(0),
                PatternToken::Literal("is".into()),
                PatternToken::Rest(1),
            ]
        );
        assert!(pattern.has_rest());
        assert_eq!(pattern.placeholder_indices().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_parse_rejects_bad_placeholders() {
        assert!(matches!(
            Pattern::parse("set <argX> now"),
            Err(AssistantError::MalformedGrammar { .. })
        ));
        assert!(Pattern::parse("set <arg0 now").is_err());
        assert!(Pattern::parse("set <value>").is_err());
        assert!(Pattern::parse("note <arg0>-> later").is_err());
    }

    #[test]
    fn test_literal_only_match() {
        let pattern = Pattern::parse("turn on the light").unwrap();
        let tolerance = TypoTolerance::default();
        assert_eq!(
            pattern.match_tokens(&tokens(&["Turn", "ON", "the", "light"]), &tolerance),
            Some(vec![])
        );
        assert_eq!(pattern.match_tokens(&tokens(&["turn", "on", "light"]), &tolerance), None);
    }

    #[test]
    fn test_positional_capture() {
        let pattern = Pattern::parse("what <arg0> is it").unwrap();
        let args = pattern
            .match_tokens(&tokens(&["what", "Time", "is", "it"]), &TypoTolerance::default())
            .unwrap();
        assert_eq!(args, vec!["Time"]);
    }

    #[test]
    fn test_captures_follow_encounter_order() {
        let pattern = Pattern::parse("move <arg1> to <arg0>").unwrap();
        let args = pattern
            .match_tokens(&tokens(&["move", "box", "to", "kitchen"]), &TypoTolerance::default())
            .unwrap();
        assert_eq!(args, vec!["box", "kitchen"]);
    }

    #[test]
    fn test_rest_capture() {
        let pattern = Pattern::parse("remind me to <arg0>->").unwrap();
        let tolerance = TypoTolerance::default();
        let args = pattern
            .match_tokens(&tokens(&["remind", "me", "to", "buy", "milk", "and", "eggs"]), &tolerance)
            .unwrap();
        assert_eq!(args, vec!["buy milk and eggs"]);
    }

    #[test]
    fn test_rest_capture_with_nothing_left() {
        let pattern = Pattern::parse("remind me to <arg0>->").unwrap();
        assert_eq!(
            pattern.match_tokens(&tokens(&["remind", "me", "to"]), &TypoTolerance::default()),
            Some(vec![String::new()])
        );
    }

    #[test]
    fn test_typo_tolerance_on_literals() {
        let pattern = Pattern::parse("turn on the lights").unwrap();
        let tolerance = TypoTolerance::default();
        assert!(pattern
            .match_tokens(&tokens(&["turn", "on", "the", "lighst"]), &tolerance)
            .is_none());
        assert!(pattern
            .match_tokens(&tokens(&["turn", "on", "the", "lighta"]), &tolerance)
            .is_some());
    }

    #[test]
    fn test_empty_pattern_matches_only_empty_input() {
        let pattern = Pattern::parse("").unwrap();
        let tolerance = TypoTolerance::default();
        assert_eq!(pattern.match_tokens(&[], &tolerance), Some(vec![]));
        assert_eq!(pattern.match_tokens(&tokens(&["hello"]), &tolerance), None);
    }

    proptest! {
        #[test]
        fn prop_rest_captures_remainder(tail in proptest::collection::vec("[a-z]{1,8}", 0..10)) {
            let pattern = Pattern::parse("note that <arg0>->").unwrap();
            let mut input = tokens(&["note", "that"]);
            input.extend(tail.iter().cloned());
            let args = pattern.match_tokens(&input, &TypoTolerance::default()).unwrap();
            prop_assert_eq!(args, vec![tail.join(" ")]);
        }
    }
}
