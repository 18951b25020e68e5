//! Language model access: HTTP client, blocking handles, AI fallback

pub mod client;
pub mod model;
pub mod reinterpret;

pub use client::{LlmClient, Message};
pub use model::{Conversation, ModelHandle, TextGenerator};
pub use reinterpret::{build_command_prompt, reinterpret, COMMAND_SYSTEM_PROMPT};
