use std::collections::VecDeque;
use tally_core::{RecordId, TransactionRecord};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PromptError {
    #[error("Prompt I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Prompt interrupted by the operator")]
    Interrupted,
    #[error("No operator input left")]
    Exhausted,
}

/// Where records that no keyword matches are sent for a human decision.
pub trait PromptPort {
    /// Shows the record to the operator and returns their raw answer.
    fn ask(&mut self, record: &TransactionRecord) -> Result<String, PromptError>;

    /// Tells the operator their answer for `record` was not understood.
    fn notify_invalid(&mut self, _record: &TransactionRecord, _input: &str) {}
}

/// Answers prompts from a fixed script, for headless runs.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<String>,
    asked: Vec<RecordId>,
    rejected: Vec<RecordId>,
}

impl ScriptedPrompt {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Records shown to the operator, in order.
    pub fn asked(&self) -> &[RecordId] {
        &self.asked
    }

    /// Records whose answer was rejected.
    pub fn rejected(&self) -> &[RecordId] {
        &self.rejected
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl PromptPort for ScriptedPrompt {
    fn ask(&mut self, record: &TransactionRecord) -> Result<String, PromptError> {
        self.asked.push(record.id);
        self.answers.pop_front().ok_or(PromptError::Exhausted)
    }

    fn notify_invalid(&mut self, record: &TransactionRecord, _input: &str) {
        self.rejected.push(record.id);
    }
}
