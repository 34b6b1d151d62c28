use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pmpilot::clients::{ConfluenceClient, DbClient, GithubClient, JiraClient, WebClient};
use pmpilot::telegram::TelegramClient;
use pmpilot::{Bot, ClaudeClient, ConfigLoader, Pipeline};

#[derive(Parser)]
#[command(name = "pmpilot")]
#[command(version, about = "Telegram bot that walks product ideas into sprint-ready work")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(long, short, help = "Path to config.toml (default: ./config.toml)")]
    config: Option<PathBuf>,

    #[arg(long)]
    verbose: bool,

    #[arg(long, short)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot loop (the default when no subcommand is given)
    Run,

    /// Write a starter config.toml
    Init {
        #[arg(long, help = "Overwrite an existing config file")]
        force: bool,
    },
}

fn main() -> ExitCode {
    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "pmpilot=debug,info"
    } else if cli.quiet {
        "error"
    } else {
        "pmpilot=info,warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let runtime = Runtime::new()?;
            runtime.block_on(run_bot(cli.config.as_deref()))?;
        }
        Commands::Init { force } => {
            init_config(cli.config, force)?;
        }
    }

    Ok(())
}

async fn run_bot(config_path: Option<&std::path::Path>) -> anyhow::Result<()> {
    let config = ConfigLoader::load(config_path)?;

    let claude = Arc::new(ClaudeClient::new(&config.anthropic)?);
    let jira = Arc::new(JiraClient::new(&config.jira)?);
    let confluence = Arc::new(ConfluenceClient::new(&config.jira, &config.confluence)?);
    let github = Arc::new(GithubClient::new(&config.github)?);
    let web = Arc::new(WebClient::new()?);
    let telegram = Arc::new(TelegramClient::new(&config.telegram)?);
    let db = DbClient::connect(&config.database).await?.map(Arc::new);

    let pipeline = Pipeline::new(config, claude, jira, confluence, github, db, web, telegram);
    Bot::new(Arc::new(pipeline)).run().await?;
    Ok(())
}

fn init_config(path: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let path = path.unwrap_or_else(ConfigLoader::default_config_path);
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (pass --force to overwrite)",
            path.display()
        );
    }
    std::fs::write(&path, ConfigLoader::default_config_template())?;
    println!("Wrote {}", path.display());
    Ok(())
}
