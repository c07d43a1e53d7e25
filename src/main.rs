//! Main entry point for the Chat Gatekeeper

use chat_gatekeeper::cli::{CheckConfigArgs, ServeArgs};
use chat_gatekeeper::{init_logger_with_config, log_error, log_info};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chat-gatekeeper")]
#[command(about = "Access gates (hours, rate limit, roles) in front of a messaging app")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error), overrides the config file
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gatekeeper server
    #[command(name = "serve")]
    Serve(ServeArgs),

    /// Validate a configuration file and print the effective settings
    #[command(name = "check-config")]
    CheckConfig(CheckConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or_else(|| Commands::Serve(ServeArgs::default())) {
        Commands::Serve(args) => {
            let config = args.to_config()?;

            let level = if cli.verbose {
                "debug".to_string()
            } else {
                cli.log_level.unwrap_or_else(|| config.log_level.clone())
            };
            init_logger_with_config(&level, config.logging.enable_file_logging, &config.logging.log_dir);

            log_info!("🚀 Starting Chat Gatekeeper");
            log_info!("📋 Version: {}", env!("CARGO_PKG_VERSION"));

            if let Err(e) = args.start_server(config).await {
                log_error!("Gatekeeper error: {:#}", e);
                std::process::exit(1);
            }
        }
        Commands::CheckConfig(args) => {
            let rendered = args.execute()?;
            println!("{}", rendered);
        }
    }

    Ok(())
}
