mod auth;
mod cli;
mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use healthvault_client::{ClientConfig, Connection};
use healthvault_core::RecordId;

use auth::StoredCredentials;
use cli::{Cli, Commands, OutputFormat};
use output::print_error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(if cli.verbose { "debug" } else { "warn" });

    if let Err(e) = run(cli).await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

/// RUST_LOG wins over the level derived from `--verbose`.
fn init_tracing(level: &str) {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run(cli: Cli) -> Result<()> {
    let profile = &cli.profile;
    let format = resolve_format(cli.format, profile)?;

    match &cli.command {
        Commands::Login(args) => {
            let server = config::resolve_server(&cli.server, profile)?;
            commands::auth::login(&server, args, profile).await?;
        }
        Commands::Logout => {
            commands::auth::logout(profile)?;
        }
        Commands::Whoami => {
            commands::auth::whoami(profile)?;
        }
        Commands::Config(args) => match &args.command {
            cli::ConfigCommands::Show => {
                let cfg = config::load_profile(profile)?;
                println!("{}: {}", "Profile".cyan(), profile);
                println!(
                    "{}: {}",
                    "Server".cyan(),
                    cfg.server.as_deref().unwrap_or("(not set)")
                );
                println!(
                    "{}: {}",
                    "Format".cyan(),
                    cfg.format.as_deref().unwrap_or("json")
                );
                println!(
                    "{}: {}",
                    "Record".cyan(),
                    cfg.record.as_deref().unwrap_or("(not set)")
                );
            }
            cli::ConfigCommands::Set(set_args) => {
                let mut cfg = config::load_profile(profile)?;
                config::set_value(&mut cfg, &set_args.key, &set_args.value)?;
                config::save_profile(profile, &cfg)?;
                output::print_success(&format!("Set {} = {}", set_args.key, set_args.value));
            }
        },
        Commands::Person => {
            let (creds, connection) = logged_in(&cli.server, profile)?;
            tracing::debug!(application_id = %creds.application_id, "Reading person info");
            commands::person::show(&connection, format).await?;
        }
        Commands::Things(args) => {
            let (creds, connection) = logged_in(&cli.server, profile)?;
            let stored_record = match config::load_profile(profile)?.record {
                Some(id) => Some(
                    id.parse::<RecordId>()
                        .with_context(|| format!("Invalid record id: {id}"))?,
                ),
                None => creds.record_id()?,
            };
            commands::things::run(&connection, args, stored_record, format).await?;
        }
    }

    Ok(())
}

fn resolve_format(flag: Option<OutputFormat>, profile: &str) -> Result<OutputFormat> {
    if let Some(format) = flag {
        return Ok(format);
    }
    Ok(match config::load_profile(profile)?.format.as_deref() {
        Some("table") => OutputFormat::Table,
        _ => OutputFormat::Json,
    })
}

/// Stored credentials for `profile`, connected to the resolved server.
fn logged_in(cli_server: &Option<String>, profile: &str) -> Result<(StoredCredentials, Connection)> {
    let mut creds = auth::load_credentials(profile)?
        .with_context(|| format!("Not logged in (profile: \"{profile}\"). Run: hv login"))?;
    creds.server = config::resolve_server(cli_server, profile)?;
    let connection = connect(&creds)?;
    Ok((creds, connection))
}

/// Client settings come from `./healthvault.toml` and `HEALTHVAULT__*`; the
/// server always comes from the profile.
fn connect(creds: &StoredCredentials) -> Result<Connection> {
    let mut client_config: ClientConfig = healthvault_client::config::loader::load_config(None)
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to load client configuration")?;
    client_config.service_url = creds.server.clone();
    client_config.application_id = Some(creds.application_id.clone());

    let credential = creds.to_credential(&client_config.auth)?;
    Ok(Connection::new(client_config, credential)?)
}
