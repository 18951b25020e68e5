//! Phrase grammar: turns raw utterances into structured commands
//!
//! raw input -> Normalizer -> Pattern (with TypoTolerance) -> ParsedCommand

pub mod normalizer;
pub mod pattern;
pub mod table;
pub mod typo;

pub use normalizer::Normalizer;
pub use pattern::{Pattern, PatternToken};
pub use table::{GrammarEntry, GrammarMatch, GrammarTable, ParsedCommand};
pub use typo::{check_typo, TypoTolerance, DEFAULT_TYPO_RATIO};
