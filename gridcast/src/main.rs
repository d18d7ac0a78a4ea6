mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use gridcast_core::{logging, service::hash_password, Config};

use server::GridcastServer;

#[derive(Parser, Debug)]
#[command(name = "gridcast")]
#[command(about = "Gridcast live composition server", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, env = "GRIDCAST_CONFIG", default_value = "config.yaml")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Hash a password for the `auth.users` section of the config file
    HashPassword {
        /// Plaintext password to hash
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Command::HashPassword { password }) = cli.command {
        let hash = hash_password(&password).await?;
        println!("{hash}");
        return Ok(());
    }

    // 1. Load configuration
    let config = Config::load(Some(&cli.config))?;

    // 1.5. Validate configuration (fail fast on misconfigurations)
    if let Err(errors) = config.validate() {
        for e in &errors {
            eprintln!("Config validation error: {e}");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s)",
            errors.len()
        ));
    }

    // 2. Initialize logging. The returned guard must stay alive for the
    //    lifetime of the process or buffered file output is lost.
    let _log_guard = logging::init_logging(&config.logging)?;
    info!("Gridcast server starting...");
    info!("HTTP address: {}", config.http_address());

    // 3. Build services and run until a shutdown signal arrives
    let server = GridcastServer::new(config).await?;
    server.start().await
}
