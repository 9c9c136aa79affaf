//! CLI argument parsing for tasklens.
//!
//! CLI flags override every other configuration source.

use clap::{Parser, Subcommand};

/// Ask questions about a task tracker export.
#[derive(Parser, Debug)]
#[command(name = "tasklens")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/tasklens/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// JSON corpus export to load (overrides corpus_path)
    #[arg(long, global = true)]
    pub corpus: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer a natural-language query
    Query {
        /// Query text
        text: String,

        /// Restrict to one sprint
        #[arg(short, long)]
        sprint: Option<String>,

        /// Restrict to one project
        #[arg(short, long)]
        project: Option<String>,

        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the vocabulary built from the corpus
    Vocab,

    /// Print corpus statistics
    Stats,

    /// List records with exact filters
    List {
        #[arg(long)]
        project: Option<String>,

        #[arg(long)]
        sprint: Option<String>,

        #[arg(long)]
        issue_type: Option<String>,

        #[arg(long)]
        status: Option<String>,

        /// Records to skip
        #[arg(long, default_value = "0")]
        offset: usize,

        /// Page size
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Print the normalized form of some text
    Normalize {
        /// Text to normalize
        text: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_query() {
        let cli = Cli::parse_from([
            "tasklens",
            "query",
            "high priority bugs",
            "--sprint",
            "Sprint-1",
            "-p",
            "Alpha",
        ]);
        match cli.command {
            Commands::Query {
                text,
                sprint,
                project,
                json,
            } => {
                assert_eq!(text, "high priority bugs");
                assert_eq!(sprint, Some("Sprint-1".to_string()));
                assert_eq!(project, Some("Alpha".to_string()));
                assert!(!json);
            }
            _ => panic!("Expected Query command"),
        }
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::parse_from([
            "tasklens",
            "stats",
            "--corpus",
            "/data/tasks.json",
            "--log-level",
            "debug",
        ]);
        assert!(matches!(cli.command, Commands::Stats));
        assert_eq!(cli.corpus, Some("/data/tasks.json".to_string()));
        assert_eq!(cli.log_level, Some("debug".to_string()));
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_list_defaults() {
        let cli = Cli::parse_from(["tasklens", "list", "--issue-type", "Bug"]);
        match cli.command {
            Commands::List {
                issue_type,
                offset,
                limit,
                project,
                ..
            } => {
                assert_eq!(issue_type, Some("Bug".to_string()));
                assert_eq!(offset, 0);
                assert_eq!(limit, 20);
                assert!(project.is_none());
            }
            _ => panic!("Expected List command"),
        }
    }

    #[test]
    fn test_cli_normalize_and_json() {
        let cli = Cli::parse_from(["tasklens", "normalize", "hgh priorty"]);
        assert!(matches!(cli.command, Commands::Normalize { text } if text == "hgh priorty"));

        let cli = Cli::parse_from(["tasklens", "query", "bugs", "--json"]);
        assert!(matches!(cli.command, Commands::Query { json: true, .. }));
    }
}
