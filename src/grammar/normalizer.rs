//! Input normalization ahead of pattern matching
//!
//! Splits raw input on whitespace, strips punctuation symbols and (when the
//! candidate pattern allows it) drops filler words such as "please".
//! Normalization is pattern-dependent: patterns that capture the rest of the
//! input keep filler words so the captured text reads as the user typed it.

/// Filler words dropped from input before matching
pub const DEFAULT_FILLER_WORDS: [&str; 6] = ["please", "could", "would", "kindly", "you", "can"];

/// Punctuation symbols removed from every token
pub const DEFAULT_SYMBOLS: [&str; 5] = [",", ".", "!", "?", "%"];

/// Read-only filler/symbol tables used to clean input tokens
#[derive(Debug, Clone)]
pub struct Normalizer {
    filler_words: Vec<String>,
    symbols: Vec<String>,
}

impl Normalizer {
    pub fn new(filler_words: Vec<String>, symbols: Vec<String>) -> Self {
        Self {
            filler_words: filler_words.into_iter().map(|w| w.to_lowercase()).collect(),
            symbols: symbols.into_iter().filter(|s| !s.is_empty()).collect(),
        }
    }

    /// Tokenize `input`, optionally dropping filler words
    ///
    /// Tokens keep their original casing; comparisons against literals and
    /// filler words are case-insensitive.
    pub fn normalize(&self, input: &str, strip_fillers: bool) -> Vec<String> {
        input
            .split_whitespace()
            .filter_map(|raw| {
                let cleaned = self.strip_symbols(raw);
                if cleaned.is_empty() {
                    return None;
                }
                if strip_fillers && self.is_filler(&cleaned) {
                    return None;
                }
                Some(cleaned)
            })
            .collect()
    }

    /// Returns true if `token` is one of the configured filler words
    pub fn is_filler(&self, token: &str) -> bool {
        let lower = token.to_lowercase();
        self.filler_words.iter().any(|w| *w == lower)
    }

    fn strip_symbols(&self, token: &str) -> String {
        let mut cleaned = token.to_string();
        for symbol in &self.symbols {
            if cleaned.contains(symbol.as_str()) {
                cleaned = cleaned.replace(symbol.as_str(), "");
            }
        }
        cleaned
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(
            DEFAULT_FILLER_WORDS.iter().map(|s| s.to_string()).collect(),
            DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
        )
    }
}
