use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use labelmail::auth::{TokenManager, token_store};
use labelmail::config::{load_config, load_config_from};
use labelmail::gmail::GmailClient;
use labelmail::pipeline::{self, Sink};

#[derive(Parser)]
#[command(name = "labelmail")]
#[command(
    about = "Pipe the bodies of labelled Gmail messages to stdout or a script",
    long_about = None
)]
struct Cli {
    /// Use this config file instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Store the OAuth client secret in keyring
    SetClientSecret {
        #[arg(long)]
        client_id: String,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    if let Some(Command::SetClientSecret { client_id }) = cli.cmd {
        eprintln!("Paste client secret (end with Ctrl-D):");
        let mut secret = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut secret)?;
        let secret = secret.trim();
        token_store::save_client_secret(&client_id, secret)?;
        println!("Saved client secret for client_id {}", client_id);
        return Ok(());
    }

    let cfg = match &cli.config {
        Some(path) => load_config_from(path),
        None => load_config(),
    }
    .map_err(|e| anyhow!("Configuration error: {e}"))?;

    let token_mgr = TokenManager::from_config(&cfg)?;
    let access_token = token_mgr.get_access_token()?;

    let gmail = GmailClient::new(access_token);
    let label_id = gmail.resolve_label(&cfg.label_name)?;

    // Sink mode is decided once here, not re-checked per message.
    let sink = match &cfg.external_script_path {
        Some(path) => Sink::Subprocess(path.clone()),
        None => Sink::Console,
    };

    let stats = pipeline::run(gmail.messages(&label_id), &gmail, &sink)?;
    log::info!("done: {} delivered, {} failed", stats.delivered, stats.failed);
    Ok(())
}
