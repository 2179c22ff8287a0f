use console::{style, Term};
use dialoguer::{theme::ColorfulTheme, Input};
use std::io;
use tally_categorize::{PromptError, PromptPort};
use tally_core::{Category, TransactionRecord};

/// Asks the operator on the controlling terminal.
pub struct TerminalPrompt {
    term: Term,
    theme: ColorfulTheme,
    question: String,
}

impl TerminalPrompt {
    pub fn new() -> Self {
        let names: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
        Self {
            term: Term::stderr(),
            theme: ColorfulTheme::default(),
            question: format!("Enter category ({})", names.join(", ")),
        }
    }
}

impl Default for TerminalPrompt {
    fn default() -> Self {
        Self::new()
    }
}

fn prompt_error(err: dialoguer::Error) -> PromptError {
    let dialoguer::Error::IO(e) = err;
    if e.kind() == io::ErrorKind::Interrupted {
        PromptError::Interrupted
    } else {
        PromptError::Io(e)
    }
}

impl PromptPort for TerminalPrompt {
    fn ask(&mut self, record: &TransactionRecord) -> Result<String, PromptError> {
        self.term.write_line("")?;
        self.term.write_line(&format!(
            "{}  {}  {}",
            style(record.date).dim(),
            style(record.amount()).bold(),
            style(&record.description).cyan()
        ))?;

        Input::<String>::with_theme(&self.theme)
            .with_prompt(&self.question)
            .allow_empty(true)
            .interact_text_on(&self.term)
            .map_err(prompt_error)
    }

    fn notify_invalid(&mut self, _record: &TransactionRecord, input: &str) {
        let notice = format!(
            "{} '{}' is not a category; record left for later.",
            style("Invalid category entered.").red().bold(),
            input
        );
        // The notice is advisory; a broken terminal surfaces on the next ask.
        let _ = self.term.write_line(&notice);
    }
}
