//! Azazel - natural-language command resolver for a voice/text assistant

pub mod command;
pub mod core;
pub mod grammar;
pub mod llm;
pub mod services;
