//! EducaMais - command-line client for the EducaMais posts service.
//!
//! Main entry point for the EducaMais CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::Style;

mod commands;

use commands::{auth, config, posts};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// EducaMais - read and publish posts from the command line
#[derive(Parser)]
#[command(name = "educamais")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Server URL (default: http://localhost:3333)
    #[arg(long, global = true, env = "EDUCAMAIS_API_URL")]
    pub server: Option<String>,

    /// Directory for the stored session and logs
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in, sign up, sign out and show the current user
    Auth(auth::AuthArgs),

    /// Browse and manage posts
    Posts(posts::PostsArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        let red = Style::new().red();
        eprintln!("{} {:#}", red.apply_to("Error:"), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let loaded = educamais_config::load_config(None)?;
    let data_dir = educamais_config::data_dir(cli.data_dir.as_deref(), &loaded.config)?;

    // Console (human-readable) + rolling JSON file under the data directory
    let _guard = init_tracing(cli.verbose, &data_dir);

    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }

    let server_url = cli
        .server
        .clone()
        .unwrap_or_else(|| loaded.config.api().base_url);

    let ctx = commands::Context {
        config: loaded.config,
        sources: loaded.sources,
        server_url,
        data_dir,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Auth(args) => auth::run(args, &ctx).await,
        Commands::Posts(args) => posts::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}

fn init_tracing(
    verbose: bool,
    data_dir: &std::path::Path,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::prelude::*;

    let filter = if verbose {
        "educamais=debug,educamais_client=debug,educamais_query=debug,educamais_store=debug,educamais_config=debug,info"
    } else {
        "educamais=info,educamais_client=info,educamais_query=info,educamais_store=info,educamais_config=info,warn"
    };

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("educamais")
        .filename_suffix("log")
        .build(data_dir.join("logs"));

    let (file_layer, guard) = match appender {
        Ok(appender) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "educamais=trace,educamais_client=trace,educamais_query=trace,educamais_store=trace,educamais_config=trace,info",
                ));
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!("warning: file logging disabled: {}", e);
            (None, None)
        }
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(verbose)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(file_layer)
        .init();

    guard
}
