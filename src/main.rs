use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use whatsapp_bridge::{Config, Daemon, logging};

/// Bridge Home Assistant shopping-list events to a `WhatsApp` bot
#[derive(Parser)]
#[command(name = "whatsapp-bridge", version, about)]
struct Cli {
    /// Port to listen on (overrides `WEBHOOK_PORT`)
    #[arg(long)]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file (default: ~/.config/whatsapp-bridge/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the effective configuration with secrets redacted
    CheckConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Logging may not be initialised yet
            eprintln!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(Command::CheckConfig) = cli.command {
        logging::init_cli();
        let config = Config::load(cli.config.as_deref())?;
        println!("{config}");
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?;

    let rust_log = std::env::var("RUST_LOG").ok();
    let directive =
        logging::filter_directive(rust_log.as_deref(), cli.verbose, &config.logging.level);
    let _logging = logging::init(&directive, config.logging.dir.as_deref())?;

    let port = cli.port.unwrap_or(config.webhook.port);
    Daemon::new(config, port).run().await?;

    Ok(())
}
