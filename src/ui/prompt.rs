// src/ui/prompt.rs

use dialoguer::{Input, Password};
use zeroize::Zeroizing;

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("prompt failed: {0}")]
    Terminal(#[from] dialoguer::Error),
    #[error("no answer available for '{0}'")]
    NoAnswer(String),
}

/// Operator input needed mid-run: SSH logins and sudo passwords.
pub trait CredentialPrompt {
    fn ask_text(&mut self, label: &str) -> Result<String, PromptError>;

    /// The returned value must never be echoed or logged.
    fn ask_secret(&mut self, label: &str) -> Result<Zeroizing<String>, PromptError>;
}

#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl CredentialPrompt for TerminalPrompt {
    fn ask_text(&mut self, label: &str) -> Result<String, PromptError> {
        let answer: String = Input::new().with_prompt(label).interact_text()?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(PromptError::NoAnswer(label.to_string()));
        }
        Ok(answer.to_string())
    }

    fn ask_secret(&mut self, label: &str) -> Result<Zeroizing<String>, PromptError> {
        let secret = Password::new()
            .with_prompt(label)
            .allow_empty_password(true)
            .interact()?;
        Ok(Zeroizing::new(secret))
    }
}

/// Canned answers for tests; counts how often each kind was asked.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    texts: std::collections::VecDeque<String>,
    secrets: std::collections::VecDeque<String>,
    pub text_prompts: usize,
    pub secret_prompts: usize,
    pub labels: Vec<String>,
}

#[cfg(test)]
impl ScriptedPrompt {
    pub fn with_text(mut self, answer: &str) -> Self {
        self.texts.push_back(answer.to_string());
        self
    }

    pub fn with_secret(mut self, answer: &str) -> Self {
        self.secrets.push_back(answer.to_string());
        self
    }
}

#[cfg(test)]
impl CredentialPrompt for ScriptedPrompt {
    fn ask_text(&mut self, label: &str) -> Result<String, PromptError> {
        self.text_prompts += 1;
        self.labels.push(label.to_string());
        self.texts
            .pop_front()
            .ok_or_else(|| PromptError::NoAnswer(label.to_string()))
    }

    fn ask_secret(&mut self, label: &str) -> Result<Zeroizing<String>, PromptError> {
        self.secret_prompts += 1;
        self.labels.push(label.to_string());
        self.secrets
            .pop_front()
            .map(Zeroizing::new)
            .ok_or_else(|| PromptError::NoAnswer(label.to_string()))
    }
}
