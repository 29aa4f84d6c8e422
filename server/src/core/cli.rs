use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::constants::{ENV_CONFIG, ENV_DEBUG, ENV_HOST, ENV_PORT, ENV_POSTGRES_URL};

#[derive(Parser)]
#[command(name = "comanda")]
#[command(version, about = "Restaurant ordering platform API", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server host address
    #[arg(long, short = 'H', global = true, env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', global = true, env = ENV_PORT)]
    pub port: Option<u16>,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// PostgreSQL connection URL
    #[arg(long, global = true, env = ENV_POSTGRES_URL)]
    pub postgres_url: Option<String>,

    /// Enable debug mode (logs generated SQL at debug level)
    #[arg(long, global = true, env = ENV_DEBUG)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the server (default when no subcommand is given)
    Start,
}

/// Configuration values extracted from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub config: Option<PathBuf>,
    pub postgres_url: Option<String>,
    pub debug: bool,
}

/// Parse command line arguments into config overrides and an optional command
pub fn parse() -> (CliConfig, Option<Commands>) {
    let cli = Cli::parse();

    let config = CliConfig {
        host: cli.host,
        port: cli.port,
        config: cli.config,
        postgres_url: cli.postgres_url,
        debug: cli.debug,
    };

    (config, cli.command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_without_args() {
        let cli = Cli::try_parse_from(["comanda"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.host.is_none());
        assert!(!cli.debug);
    }

    #[test]
    fn cli_parses_start_with_overrides() {
        let cli =
            Cli::try_parse_from(["comanda", "start", "--host", "0.0.0.0", "-p", "8080"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Start)));
        assert_eq!(cli.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(cli.port, Some(8080));
    }
}
