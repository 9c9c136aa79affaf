//! tasklens
//!
//! Natural-language queries over a task tracker export.
//!
//! # Usage
//!
//! ```bash
//! tasklens query "high priority bugs" --sprint Sprint-1 --project Alpha
//! tasklens list --project Alpha --status Done
//! tasklens stats
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/tasklens/config.toml)
//! 3. Environment variables (TASKLENS_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use tasklens_cli::{
    build_pipeline, handle_list, handle_normalize, handle_query, handle_stats, handle_vocab,
    init_logging, load_settings, Cli, Commands, GlobalOptions,
};
use tasklens_store::RecordFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let options = GlobalOptions {
        config: cli.config,
        log_level: cli.log_level,
        corpus: cli.corpus,
    };
    let settings = load_settings(&options)?;
    init_logging(&settings.log_level)?;

    let pipeline = build_pipeline(&settings, &settings.expanded_corpus_path()).await?;

    match cli.command {
        Commands::Query {
            text,
            sprint,
            project,
            json,
        } => {
            handle_query(&pipeline, text, sprint, project, json).await?;
        }
        Commands::Vocab => {
            handle_vocab(&pipeline)?;
        }
        Commands::Stats => {
            handle_stats(&pipeline).await?;
        }
        Commands::List {
            project,
            sprint,
            issue_type,
            status,
            offset,
            limit,
        } => {
            let filter = RecordFilter {
                project,
                sprint,
                issue_type,
                status,
            };
            handle_list(&pipeline, filter, offset, limit).await?;
        }
        Commands::Normalize { text } => {
            handle_normalize(&pipeline, &text)?;
        }
    }

    Ok(())
}
