//! tasklens CLI library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (query, vocab, stats, list, normalize)

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands};
pub use commands::{
    build_pipeline, handle_list, handle_normalize, handle_query, handle_stats, handle_vocab,
    init_logging, load_settings, render_response, GlobalOptions,
};
