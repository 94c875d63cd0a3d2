//! Init and Config commands.

use crate::config::Settings;

/// Write a default `.fsindex/settings.toml` in the current directory.
///
/// Exits non-zero when the file exists and `force` is not set.
pub fn run_init(force: bool) {
    match Settings::init_config_file(force) {
        Ok(path) => {
            println!("Created configuration file at: {}", path.display());
            println!("Set watch.root and worker.url before running `fsindex start`.");
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Print the effective settings after file and `FSI_*` overrides.
pub fn run_config(config: &Settings) {
    println!("Current Configuration:");
    println!("{}", "=".repeat(50));
    match toml::to_string_pretty(config) {
        Ok(toml_str) => println!("{toml_str}"),
        Err(e) => {
            eprintln!("Error displaying config: {e}");
            std::process::exit(1);
        }
    }
}
