pub mod coordinator;
pub mod engine;
pub mod prompt;

pub use coordinator::{Coordinator, InvalidInputPolicy, RunError, RunSummary};
pub use engine::{parse_operator_input, CategorizeError, Categorizer, Resolution, ResolutionSource};
pub use prompt::{PromptError, PromptPort, ScriptedPrompt};
