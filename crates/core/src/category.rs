use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Spending categories a ledger record can be assigned to.
///
/// A record without a category is represented as `Option<Category>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Food,
    Entertainment,
    Transport,
    Home,
    Other,
    Na,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown category: '{0}'")]
pub struct CategoryParseError(pub String);

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Food,
        Category::Entertainment,
        Category::Transport,
        Category::Home,
        Category::Other,
        Category::Na,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Food => "food",
            Category::Entertainment => "entertainment",
            Category::Transport => "transport",
            Category::Home => "home",
            Category::Other => "other",
            Category::Na => "na",
        }
    }

    /// The single letter an operator types to pick this category.
    pub fn shorthand(self) -> char {
        match self {
            Category::Food => 'f',
            Category::Entertainment => 'e',
            Category::Transport => 't',
            Category::Home => 'h',
            Category::Other => 'o',
            Category::Na => 'n',
        }
    }

    pub fn from_shorthand(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'f' => Some(Category::Food),
            'e' => Some(Category::Entertainment),
            't' => Some(Category::Transport),
            'h' => Some(Category::Home),
            'o' => Some(Category::Other),
            'n' => Some(Category::Na),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = CategoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| CategoryParseError(s.to_string()))
    }
}
