//! Entry point of the `liveupdate-publish` tool.
//!
//! Parses arguments, publishes, prints a one-line result and maps each
//! failure class to its own exit code (see [`liveupdate::cli`]).

use clap::Parser;
use colored::Colorize;
use liveupdate::cli::{self, Cli};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();
    match cli.execute().await {
        Ok(outcome) => {
            println!(
                "{} version {} -> {} ({} files, {} bytes)",
                "Published".green().bold(),
                outcome.previous_version,
                outcome.version,
                outcome.files,
                outcome.artifact_length,
            );
        }
        Err(err) => {
            eprintln!("{} {err}", "error:".red().bold());
            let mut cause = std::error::Error::source(&err);
            while let Some(inner) = cause {
                eprintln!("  caused by: {inner:#}");
                cause = inner.source();
            }
            std::process::exit(cli::exit_code(&err));
        }
    }
}
