//! CLI argument parsing using clap.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

#[derive(Parser)]
#[command(
    name = "fsindex",
    version = env!("CARGO_PKG_VERSION"),
    about = "Keep a search index in step with a watched directory tree",
    after_help = "Examples:\n  fsindex init\n  fsindex start --root /data\n  fsindex start --worker-url http://indexer:8080/api/indexer --no-search",
    styles = clap_cargo_style()
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Initialize project
    #[command(about = "Set up .fsindex directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Watch the tree and drive the indexing pipeline
    #[command(about = "Start watching and indexing")]
    Start {
        /// Directory to watch (overrides config)
        #[arg(long, value_name = "DIR")]
        root: Option<PathBuf>,

        /// Indexing worker endpoint (overrides config)
        #[arg(long, value_name = "URL")]
        worker_url: Option<String>,

        /// Callback listener address (overrides config)
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,

        /// Do not mirror documents into the search index
        #[arg(long)]
        no_search: bool,
    },

    /// Show current configuration
    #[command(about = "Display active settings")]
    Config,
}
