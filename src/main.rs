use std::path::Path;

use clap::Parser;
use fsindex::Settings;
use fsindex::cli::commands::{init, start};
use fsindex::cli::{Cli, Commands};

fn load_settings(path: Option<&Path>) -> Result<Settings, Box<figment::Error>> {
    match path {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => init::run_init(force),
        Commands::Config => {
            let config = load_settings(cli.config.as_deref()).unwrap_or_else(|e| {
                eprintln!("Configuration error: {e}");
                Settings::default()
            });
            init::run_config(&config);
        }
        Commands::Start {
            root,
            worker_url,
            bind,
            no_search,
        } => {
            // A broken settings file aborts start instead of falling back
            let config = match load_settings(cli.config.as_deref()) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Configuration error: {e}");
                    std::process::exit(1);
                }
            };
            fsindex::logging::init_with_config(&config.logging);

            let overrides = start::StartOverrides {
                root,
                worker_url,
                bind,
                no_search,
            };
            if let Err(e) = start::run(config, overrides).await {
                tracing::error!("[service] {e:#}");
                eprintln!("Error: {e:#}");
                std::process::exit(1);
            }
        }
    }
}
