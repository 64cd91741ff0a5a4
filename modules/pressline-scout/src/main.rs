use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pressline_common::config::load_config;
use pressline_common::Config;
use pressline_scout::registry::{build_jobs, ADAPTERS};
use pressline_scout::supervisor::{run_pass, supervise};

#[derive(Parser)]
#[command(name = "pressline-scout", about = "Scheduled archiver for news, video and annotation sources")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "pressline.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every enabled adapter on its schedule until interrupted.
    Run,
    /// Run a single pass of one adapter and exit.
    Once {
        /// One of: twitter_quote, youtube, birdwatch_export, birdwatch_ref.
        adapter: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::from_default_env().add_directive("pressline=info".parse()?);
    if cli.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Pressline scout starting...");

    // Load config
    let file = load_config(&cli.config)?;
    let config = Config::from_env(file).context("Failed to read environment")?;
    config.log_redacted();

    let jobs = build_jobs(&config)?;

    match cli.command {
        Command::Run => {
            supervise(jobs, async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Failed to listen for ctrl-c");
                    std::future::pending::<()>().await;
                }
            })
            .await;
        }
        Command::Once { adapter } => {
            if !ADAPTERS.contains(&adapter.as_str()) {
                bail!("Unknown adapter {adapter}; expected one of {}", ADAPTERS.join(", "));
            }
            let Some(job) = jobs.into_iter().find(|j| j.adapter.name() == adapter) else {
                bail!("Adapter {adapter} is not enabled: add its config section and secrets");
            };
            let summary = run_pass(job.adapter.as_ref()).await?;
            println!("{summary}");
        }
    }

    Ok(())
}
