use crate::config::{self, Config, load_config, resolve_path, save_config};
use crate::gateway::{self, AppState};
use crate::interpreter::AnthropicInterpreter;
use crate::ledger::LedgerDb;
use crate::pipeline::MessagePipeline;
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "boascontas")]
#[command(about = "Boas Contas Telegram gateway")]
#[command(version = crate::VERSION)]
pub struct Cli {
    /// Path to the config file (default: ~/.boascontas/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Onboard,
    /// Run the webhook gateway
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Link a Telegram chat to a profile (creates the profile on first use)
    Link {
        #[arg(long)]
        chat_id: i64,
        #[arg(long)]
        name: String,
    },
    /// Add an account for a linked user
    AccountAdd {
        #[arg(long)]
        chat_id: i64,
        #[arg(long)]
        name: String,
    },
    /// Add a category for a linked user
    CategoryAdd {
        #[arg(long)]
        chat_id: i64,
        #[arg(long)]
        name: String,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Onboard => onboard(config_path),
        Commands::Serve { host, port } => serve(config_path, host, port).await,
        Commands::Link { chat_id, name } => {
            let db = open_ledger(config_path)?;
            let profile = db.link_profile(&name, chat_id)?;
            println!(
                "Linked chat {} to {} (user {})",
                chat_id, profile.display_name, profile.user_id
            );
            Ok(())
        }
        Commands::AccountAdd { chat_id, name } => {
            let db = open_ledger(config_path)?;
            let profile = require_profile(&db, chat_id).await?;
            let account = db.add_account(profile.user_id, &name)?;
            println!("Added account {} ({})", account.name, account.id);
            Ok(())
        }
        Commands::CategoryAdd { chat_id, name } => {
            let db = open_ledger(config_path)?;
            let profile = require_profile(&db, chat_id).await?;
            let category = db.add_category(profile.user_id, &name)?;
            println!("Added category {} ({})", category.name, category.id);
            Ok(())
        }
    }
}

fn onboard(config_path: Option<&std::path::Path>) -> Result<()> {
    let path = match config_path {
        Some(p) => p.to_path_buf(),
        None => config::get_config_path()?,
    };
    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }

    save_config(&Config::default(), Some(&path))?;
    println!("Wrote default config to {}", path.display());
    println!("Set interpreter.apiKey before running `boascontas serve`.");
    Ok(())
}

async fn serve(
    config_path: Option<&std::path::Path>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(host) = host {
        config.gateway.host = host;
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }

    if config.interpreter.api_key.is_empty() {
        bail!(
            "No interpreter API key configured. Run `boascontas onboard` and set interpreter.apiKey"
        );
    }

    let db = Arc::new(LedgerDb::open(resolve_path(&config.ledger.db_path))?);
    let interpreter = Arc::new(AnthropicInterpreter::new(&config.interpreter));
    let pipeline = Arc::new(MessagePipeline::new(db.clone(), interpreter, db));

    let state = AppState::new(pipeline, config.gateway.webhook_secret.clone());
    let handle = gateway::start(&config.gateway.host, config.gateway.port, state).await?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("shutting down");
    handle.abort();
    Ok(())
}

fn open_ledger(config_path: Option<&std::path::Path>) -> Result<LedgerDb> {
    let config = load_config(config_path)?;
    LedgerDb::open(resolve_path(&config.ledger.db_path))
}

async fn require_profile(db: &LedgerDb, chat_id: i64) -> Result<crate::ledger::Profile> {
    use crate::ledger::UserDirectory;
    db.profile_by_chat_id(chat_id)
        .await?
        .with_context(|| format!("No profile linked to chat {}; run `boascontas link` first", chat_id))
}
