//! `vscore` command-line client.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "vscore")]
#[command(about = "Submit content for viral-score analysis and watch the results")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll an analysis until it completes or fails
    Watch {
        sequence_id: String,
        /// Override VSCORE_POLL_INTERVAL_SECS
        #[arg(long)]
        interval_secs: Option<u64>,
        /// Print one JSON object per update
        #[arg(long)]
        json: bool,
    },

    /// Submit a written script
    SubmitScript {
        #[arg(long, conflicts_with = "text", required_unless_present = "text")]
        file: Option<PathBuf>,
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        title: Option<String>,
        /// Keep watching the new analysis
        #[arg(long)]
        watch: bool,
    },

    /// Import a video by link
    ImportLink {
        url: String,
        /// Resolve short or redirecting links first
        #[arg(long)]
        resolve: bool,
        #[arg(long)]
        watch: bool,
    },

    /// Resolve a short or redirecting link to its canonical URL
    Resolve { url: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Watch {
            sequence_id,
            interval_secs,
            json,
        } => commands::watch(sequence_id, interval_secs, json).await,
        Commands::SubmitScript {
            file,
            text,
            title,
            watch,
        } => commands::submit_script(file, text, title, watch).await,
        Commands::ImportLink { url, resolve, watch } => {
            commands::import_link(url, resolve, watch).await
        }
        Commands::Resolve { url } => commands::resolve(url).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Colored output for terminals, JSON when `LOG_FORMAT=json`.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,vscore=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_submit_script_requires_input() {
        assert!(Cli::try_parse_from(["vscore", "submit-script"]).is_err());
        assert!(Cli::try_parse_from(["vscore", "submit-script", "--text", "hi", "--file", "a.txt"]).is_err());
        assert!(Cli::try_parse_from(["vscore", "submit-script", "--text", "hook line", "--watch"]).is_ok());
    }

    #[test]
    fn test_watch_args() {
        let cli = Cli::try_parse_from(["vscore", "watch", "42", "--interval-secs", "2", "--json"]).unwrap();
        match cli.command {
            Commands::Watch {
                sequence_id,
                interval_secs,
                json,
            } => {
                assert_eq!(sequence_id, "42");
                assert_eq!(interval_secs, Some(2));
                assert!(json);
            }
            _ => panic!("expected watch"),
        }
    }
}
