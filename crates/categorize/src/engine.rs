use tally_core::{Category, RecordId, TransactionRecord};
use tally_import::{KeywordMatch, KeywordTable};
use thiserror::Error;

use crate::prompt::{PromptError, PromptPort};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionSource {
    Keyword(String),
    Operator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub category: Category,
    pub source: ResolutionSource,
}

#[derive(Error, Debug)]
pub enum CategorizeError {
    #[error("Invalid category input for record {id}: '{input}'")]
    InvalidCategoryInput { id: RecordId, input: String },
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// Resolves categories by keyword first, then by asking the operator.
pub struct Categorizer {
    keywords: KeywordTable,
}

impl Categorizer {
    pub fn new(keywords: KeywordTable) -> Self {
        Self { keywords }
    }

    pub fn auto(&self, record: &TransactionRecord) -> Option<KeywordMatch<'_>> {
        self.keywords.match_description(&record.description)
    }

    pub fn resolve<P>(
        &self,
        record: &TransactionRecord,
        prompt: &mut P,
    ) -> Result<Resolution, CategorizeError>
    where
        P: PromptPort + ?Sized,
    {
        if let Some(hit) = self.auto(record) {
            return Ok(Resolution {
                category: hit.category,
                source: ResolutionSource::Keyword(hit.keyword.to_string()),
            });
        }

        let input = prompt.ask(record)?;
        parse_operator_input(&input)
            .map(|category| Resolution {
                category,
                source: ResolutionSource::Operator,
            })
            .ok_or(CategorizeError::InvalidCategoryInput {
                id: record.id,
                input,
            })
    }
}

/// Maps an operator answer to a category by its first character.
pub fn parse_operator_input(input: &str) -> Option<Category> {
    input
        .trim()
        .chars()
        .next()
        .and_then(Category::from_shorthand)
}
