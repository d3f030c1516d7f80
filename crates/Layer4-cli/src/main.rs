//! Harbor CLI - Main entry point

mod commands;

use clap::{Parser, Subcommand};
use harbor_foundation::AppConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Harbor - plugin host inspector
#[derive(Parser, Debug)]
#[command(name = "harbor")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Application config file (default: .harbor/harbor.json, then the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover plugins and show their registry state
    List,
    /// Mark a plugin as enabled in the registry
    Enable { id: String },
    /// Mark a plugin as disabled in the registry
    Disable { id: String },
    /// Read or write a plugin's configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Validate the application config, registry and every manifest
    Check,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the effective configuration
    Get { id: String },
    /// Validate and persist a new configuration document
    Set {
        id: String,
        /// JSON document (comments and trailing commas allowed)
        json: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let config_path = commands::config_path(args.config)?;
    let app = AppConfig::load(&config_path).await;

    // Initialize logging
    let log_level = if args.debug {
        "debug".to_string()
    } else {
        app.as_ref()
            .map(|a| a.log_level.clone())
            .unwrap_or_else(|_| "info".to_string())
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    tracing::debug!("Using config {}", config_path.display());

    match args.command {
        // check는 잘못된 앱 설정도 보고해야 하므로 Host 없이 실행
        Command::Check => commands::check(&config_path, app).await,
        Command::List => host(config_path, app)?.list().await,
        Command::Enable { id } => host(config_path, app)?.set_enabled(&id, true).await,
        Command::Disable { id } => host(config_path, app)?.set_enabled(&id, false).await,
        Command::Config(ConfigCommand::Get { id }) => host(config_path, app)?.config_get(&id).await,
        Command::Config(ConfigCommand::Set { id, json }) => {
            host(config_path, app)?.config_set(&id, &json).await
        }
    }
}

fn host(
    config_path: PathBuf,
    app: harbor_foundation::Result<AppConfig>,
) -> anyhow::Result<commands::Host> {
    Ok(commands::Host::new(config_path, app?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        let args = Args::try_parse_from(["harbor", "--debug", "check"]).unwrap();
        assert!(args.debug);
        assert!(matches!(args.command, Command::Check));

        let args = Args::try_parse_from(["harbor", "config", "set", "notes", "{}"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Config(ConfigCommand::Set { ref id, .. }) if id == "notes"
        ));
    }

    #[test]
    fn test_host_requires_valid_app_config() {
        let broken = Err(harbor_foundation::Error::Config("bad harbor.json".into()));
        assert!(host(PathBuf::from("harbor.json"), broken).is_err());
        assert!(host(PathBuf::from("harbor.json"), Ok(AppConfig::default())).is_ok());
    }
}
