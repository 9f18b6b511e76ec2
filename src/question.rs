//! Interactive Questions
//!
//! Stages collect missing inputs by asking questions through a
//! `QuestionProvider`. The CLI provider prompts on the terminal;
//! headless embedders supply answers up front. Declining a question is
//! a cancellation, not a fault.

use crate::error::CoreError;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone)]
pub enum QuestionKind {
    /// Free-text input with an optional default.
    Input { default: Option<String> },
    /// Single choice out of a fixed option list.
    Select { options: Vec<String> },
    /// Yes/no confirmation.
    Confirm { default: bool },
}

/// One question, identified by the request parameter it fills.
#[derive(Debug, Clone)]
pub struct Question {
    pub id: String,
    pub prompt: String,
    pub kind: QuestionKind,
}

impl Question {
    pub fn input(id: &str, prompt: &str) -> Self {
        Self {
            id: id.to_string(),
            prompt: prompt.to_string(),
            kind: QuestionKind::Input { default: None },
        }
    }

    pub fn select(id: &str, prompt: &str, options: Vec<String>) -> Self {
        Self {
            id: id.to_string(),
            prompt: prompt.to_string(),
            kind: QuestionKind::Select { options },
        }
    }

    pub fn confirm(id: &str, prompt: &str, default: bool) -> Self {
        Self {
            id: id.to_string(),
            prompt: prompt.to_string(),
            kind: QuestionKind::Confirm { default },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Text(String),
    Bool(bool),
}

impl Answer {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Answer::Text(t) => Some(t),
            Answer::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Answer::Bool(b) => Some(*b),
            Answer::Text(_) => None,
        }
    }
}

/// Collects answers for questions a stage cannot proceed without.
pub trait QuestionProvider: Send + Sync {
    /// Ask one question. `Err(CoreError::UserCancelled)` means the user
    /// declined; any other error is a provider fault.
    fn ask(&self, question: &Question) -> Result<Answer, CoreError>;
}

/// Terminal-backed provider using dialoguer prompts.
pub struct CliQuestionProvider;

impl QuestionProvider for CliQuestionProvider {
    fn ask(&self, question: &Question) -> Result<Answer, CoreError> {
        use dialoguer::{Confirm, Input, Select};

        debug!(id = %question.id, "asking question");
        match &question.kind {
            QuestionKind::Input { default } => {
                let mut input = Input::<String>::new().with_prompt(question.prompt.as_str());
                if let Some(default) = default {
                    input = input.default(default.clone());
                }
                let value = input.interact_text().map_err(|_| CoreError::UserCancelled)?;
                Ok(Answer::Text(value))
            }
            QuestionKind::Select { options } => {
                let index = Select::new()
                    .with_prompt(question.prompt.as_str())
                    .items(options)
                    .default(0)
                    .interact()
                    .map_err(|_| CoreError::UserCancelled)?;
                Ok(Answer::Text(options[index].clone()))
            }
            QuestionKind::Confirm { default } => {
                let value = Confirm::new()
                    .with_prompt(question.prompt.as_str())
                    .default(*default)
                    .interact()
                    .map_err(|_| CoreError::UserCancelled)?;
                Ok(Answer::Bool(value))
            }
        }
    }
}

/// Headless provider with preset answers keyed by question id. Unknown
/// questions are treated as declined.
pub struct StaticQuestionProvider {
    answers: HashMap<String, Answer>,
}

impl StaticQuestionProvider {
    pub fn new() -> Self {
        Self {
            answers: HashMap::new(),
        }
    }

    pub fn with_text(mut self, id: &str, value: &str) -> Self {
        self.answers
            .insert(id.to_string(), Answer::Text(value.to_string()));
        self
    }

    pub fn with_bool(mut self, id: &str, value: bool) -> Self {
        self.answers.insert(id.to_string(), Answer::Bool(value));
        self
    }
}

impl Default for StaticQuestionProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl QuestionProvider for StaticQuestionProvider {
    fn ask(&self, question: &Question) -> Result<Answer, CoreError> {
        self.answers
            .get(&question.id)
            .cloned()
            .ok_or(CoreError::UserCancelled)
    }
}
