use serde::{Deserialize, Serialize};
use tally_core::Category;
use thiserror::Error;

/// Keywords that route a description to one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordGroup {
    pub category: Category,
    pub keywords: Vec<String>,
}

impl KeywordGroup {
    pub fn new<I, S>(category: Category, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            category,
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordMatch<'a> {
    pub category: Category,
    pub keyword: &'a str,
}

#[derive(Error, Debug)]
pub enum RulesError {
    #[error("Failed to parse keyword table: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Empty keyword in category '{0}'")]
    EmptyKeyword(Category),
}

/// Ordered category → keyword mapping.
///
/// Groups are tested in the order given; the first group with a keyword that
/// occurs in the description wins, regardless of later or longer matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordTable {
    groups: Vec<KeywordGroup>,
}

impl KeywordTable {
    pub fn new(groups: Vec<KeywordGroup>) -> Result<Self, RulesError> {
        let groups = groups
            .into_iter()
            .map(|group| {
                let keywords = group
                    .keywords
                    .iter()
                    .map(|k| {
                        let k = k.trim().to_lowercase();
                        if k.is_empty() {
                            Err(RulesError::EmptyKeyword(group.category))
                        } else {
                            Ok(k)
                        }
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(KeywordGroup {
                    category: group.category,
                    keywords,
                })
            })
            .collect::<Result<Vec<_>, RulesError>>()?;
        Ok(Self { groups })
    }

    /// Parses a table written as `[[keywords]]` entries.
    pub fn from_toml(toml_content: &str) -> Result<Self, RulesError> {
        #[derive(Deserialize)]
        struct KeywordFile {
            keywords: Vec<KeywordGroup>,
        }

        let file: KeywordFile = toml::from_str(toml_content)?;
        Self::new(file.keywords)
    }

    pub fn groups(&self) -> &[KeywordGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|g| g.keywords.is_empty())
    }

    pub fn match_description(&self, description: &str) -> Option<KeywordMatch<'_>> {
        let text = description.to_lowercase();
        self.groups.iter().find_map(|group| {
            group
                .keywords
                .iter()
                .find(|k| text.contains(k.as_str()))
                .map(|k| KeywordMatch {
                    category: group.category,
                    keyword: k.as_str(),
                })
        })
    }
}

impl Default for KeywordTable {
    fn default() -> Self {
        Self {
            groups: default_groups(),
        }
    }
}

pub fn default_groups() -> Vec<KeywordGroup> {
    vec![
        KeywordGroup::new(
            Category::Food,
            [
                "starbucks",
                "waitrose",
                "cupp",
                "sainsburys",
                "morrison",
                "tesco",
                "iceland",
                "cafe",
                "coffee",
                "lidl",
            ],
        ),
        KeywordGroup::new(Category::Transport, ["first", "uber"]),
        KeywordGroup::new(Category::Home, ["circuit", "ikea"]),
        KeywordGroup::new(Category::Other, ["three"]),
    ]
}
