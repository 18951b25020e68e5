//! Command execution pipeline
//!
//! Input line -> ResolutionLoop -> GrammarTable (-> AI fallback) -> ParsedCommand
//! -> Dispatcher -> CommandRegistry -> result text

pub mod console;
pub mod datetime;
pub mod executor;
pub mod registry;
pub mod resolver;

pub use console::{Console, ScriptedConsole, StdConsole};
pub use executor::{DispatchError, DispatchOutcome, Dispatcher};
pub use registry::{CommandError, CommandRegistry, Executable, RegistryEntry, Services};
pub use resolver::{LineOutcome, ResolutionLoop};
