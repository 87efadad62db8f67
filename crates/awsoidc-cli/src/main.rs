//! aws-cli-oidc CLI entrypoint.

use clap::{ArgAction, Parser};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;
mod handlers;

use awsoidc_cli::{CliConfig, progress};
use commands::{Commands, ConfigCommands};

#[derive(Parser)]
#[command(name = "aws-cli-oidc")]
#[command(author, version, about = "Get temporary AWS credentials by logging in with an OIDC provider", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    progress::report(run(cli.command).await, &mut std::io::stderr())
}

async fn run(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::GetCred(args) => {
            let config = CliConfig::load()?;
            handlers::get_cred(&config, &args).await?
        }
        Commands::Setup => handlers::setup()?,
        Commands::ClearSecret { provider, role } => {
            let config = CliConfig::load()?;
            handlers::clear_secret(&config, provider.as_deref(), role.as_deref()).await?
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show { provider } => {
                handlers::show_config(&CliConfig::load()?, provider.as_deref())?
            }
            ConfigCommands::Path => handlers::show_config_path()?,
        },
    }
    Ok(())
}

/// `RUST_LOG` wins; otherwise only warnings unless `-v` is given.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "warn,awsoidc_auth=debug,awsoidc_secrets=debug,awsoidc_cli=debug,aws_cli_oidc=debug",
        _ => "info,awsoidc_auth=trace,awsoidc_secrets=trace,awsoidc_cli=trace,aws_cli_oidc=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
