pub mod prompt;
mod summary;

pub use prompt::{CredentialPrompt, PromptError, TerminalPrompt};
pub use summary::SummaryView;
