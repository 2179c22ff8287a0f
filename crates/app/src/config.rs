use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tally_categorize::InvalidInputPolicy;
use tally_import::{rules::default_groups, KeywordGroup, KeywordTable, StatementProfile};

const CONFIG_FILE: &str = "tally.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: PathBuf,
    pub log_file: PathBuf,
    pub on_invalid_input: InvalidInputPolicy,
    pub statement: StatementProfile,
    /// Checked top to bottom; the first matching group decides.
    pub keywords: Vec<KeywordGroup>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = data_dir();
        Self {
            database: data_dir.join("ledger.db"),
            log_file: data_dir.join("tally.log"),
            on_invalid_input: InvalidInputPolicy::default(),
            statement: StatementProfile::default(),
            keywords: default_groups(),
        }
    }
}

impl Config {
    pub fn keyword_table(&self) -> Result<KeywordTable> {
        KeywordTable::new(self.keywords.clone()).context("invalid [[keywords]] table")
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "tally", "Tally")
}

fn data_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".tally"))
}

pub fn default_config_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
}

/// Loads the config at `path`, falling back to defaults when it does not exist.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", path.display()))
}

pub fn save_config(path: &Path, cfg: &Config) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Writes a default config unless one exists. Returns whether a file was written.
pub fn init_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    save_config(path, &Config::default())?;
    Ok(true)
}
