//! Config command - configuration management.

use std::path::PathBuf;

use anyhow::{Context as _, Result, bail};
use clap::{Args, Subcommand};
use educamais_config::{ApiConfig, EducaConfig};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the resolved configuration and where it came from
    Show,

    /// Show configuration file and data directory paths
    Path,

    /// Write a config file with every setting at its effective value
    Init {
        /// Destination (defaults to the user config file)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Path => cmd_path(ctx),
        ConfigCommand::Init { path, force } => cmd_init(ctx, path, force),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let config = &ctx.config;
    let api = config.api();
    let cache = config.cache();
    let storage = config.storage();

    if ctx.json_output {
        let output = serde_json::json!({
            "sources": ctx.sources.iter().map(|s| serde_json::json!({
                "path": s.path.display().to_string(),
                "loaded": s.loaded,
            })).collect::<Vec<_>>(),
            "server": ctx.server_url,
            "timeout_secs": api.timeout_secs,
            "data_dir": ctx.data_dir.display().to_string(),
            "storage": storage.backend.to_string(),
            "cache": {
                "stale_time_secs": cache.stale_time_secs,
                "retry": cache.retry,
                "retry_delay_ms": cache.retry_delay_ms,
                "max_entries": cache.max_entries,
            },
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("# EducaMais Configuration\n");

    println!("Config file search order (later overrides earlier):");
    for source in &ctx.sources {
        let status = if source.loaded {
            "✓ loaded"
        } else {
            "· not found"
        };
        println!("  {} {}", status, source.path.display());
    }
    println!();

    println!("API:");
    println!("  server:  {}", ctx.server_url);
    if ctx.server_url != api.base_url {
        println!("           (overrides {} from config)", api.base_url);
    }
    println!("  timeout: {}s", api.timeout_secs);
    println!();

    println!("Cache:");
    println!("  stale time:  {}s", cache.stale_time_secs);
    println!("  retries:     {} (base delay {}ms)", cache.retry, cache.retry_delay_ms);
    println!("  max entries: {}", cache.max_entries);
    println!();

    println!("Storage:");
    println!("  backend:  {}", storage.backend);
    println!("  data dir: {}", ctx.data_dir.display());

    if ctx.verbose {
        println!("\n---\nRaw config:\n");
        println!("{}", config.to_toml()?);
    }

    Ok(())
}

fn cmd_path(ctx: &Context) -> Result<()> {
    let config_path = educamais_config::user_config_path();

    if ctx.json_output {
        let output = serde_json::json!({
            "config": config_path.as_ref().map(|p| p.display().to_string()),
            "data_dir": ctx.data_dir.display().to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    match config_path {
        Some(path) => println!("{}", path.display()),
        None => println!("Could not determine config directory"),
    }
    println!("{}", ctx.data_dir.display());
    Ok(())
}

fn cmd_init(ctx: &Context, path: Option<PathBuf>, force: bool) -> Result<()> {
    let Some(path) = path.or_else(educamais_config::user_config_path) else {
        bail!("Could not determine config directory; pass --path");
    };
    if path.exists() && !force {
        bail!("{} already exists (use --force to replace it)", path.display());
    }

    let config = EducaConfig {
        api: Some(ApiConfig {
            base_url: ctx.server_url.clone(),
            ..ctx.config.api()
        }),
        cache: Some(ctx.config.cache()),
        storage: Some(ctx.config.storage()),
    };
    educamais_config::save_config(&config, &path)
        .with_context(|| format!("failed to write {}", path.display()))?;

    if ctx.json_output {
        let output = serde_json::json!({ "written": path.display().to_string() });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Wrote {}", path.display());
    }
    Ok(())
}
