use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use tally_categorize::InvalidInputPolicy;

mod commands;
mod config;
mod logging;
mod terminal;

#[derive(Parser, Debug)]
#[command(
    name = "tally",
    version,
    about = "Import bank statements into a ledger and categorize spending"
)]
struct Cli {
    /// Config file (default: tally.toml in the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a CSV or Excel statement, skipping records already in the ledger
    Import {
        /// Statement file
        file: PathBuf,
    },

    /// Categorize every uncategorized record, asking when no keyword matches
    Categorize {
        /// What to do with an unrecognized answer (default: from config)
        #[arg(long, value_name = "skip|abort")]
        on_invalid: Option<InvalidInputPolicy>,
    },

    /// List records still waiting for a category
    Pending,

    /// Count records per category
    Summary,

    /// Write a default config file
    InitConfig,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(config::default_config_path);

    if let Command::InitConfig = cli.command {
        if config::init_config(&config_path)? {
            println!("Wrote {}", config_path.display());
        } else {
            println!("Config already exists: {}", config_path.display());
        }
        return Ok(());
    }

    let cfg = match config::load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            // No configured sink yet; record the failure in the default log.
            if logging::init(&config::Config::default().log_file).is_ok() {
                tracing::error!(config = %config_path.display(), error = %format!("{e:#}"), "config rejected");
            }
            return Err(e);
        }
    };
    logging::init(&cfg.log_file)?;

    match cli.command {
        Command::Import { file } => {
            let summary = commands::import(&cfg, &file).await?;
            println!(
                "Imported {} record(s), skipped {} already in the ledger.",
                style(summary.inserted).green(),
                style(summary.skipped).yellow()
            );
        }

        Command::Categorize { on_invalid } => {
            let policy = on_invalid.unwrap_or(cfg.on_invalid_input);
            let mut prompt = terminal::TerminalPrompt::new();
            let summary = commands::categorize(&cfg, policy, &mut prompt)
                .await
                .context("categorization failed")?;
            println!(
                "Categorized {} record(s): {} by keyword, {} by hand, {} left for later.",
                style(summary.categorized()).green(),
                summary.auto,
                summary.manual,
                style(summary.skipped).yellow()
            );
        }

        Command::Pending => {
            let records = commands::pending(&cfg).await?;
            for r in &records {
                println!(
                    "{:>6}  {}  {:>12}  {}",
                    r.id.0,
                    r.date,
                    r.amount().to_string(),
                    r.description
                );
            }
            println!("{} record(s) uncategorized", records.len());
        }

        Command::Summary => {
            for (category, count) in commands::summary(&cfg).await? {
                let label = category.map_or("uncategorized", |c| c.as_str());
                println!("{label:<15} {count:>6}");
            }
        }

        Command::InitConfig => {}
    }

    Ok(())
}
