//! faceid CLI - enroll and authenticate faces against a vector collection.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{AuthArgs, EnrollArgs};

/// faceid CLI - operator tool for the face matching engine.
///
/// Providers, collection and threshold come from a YAML or JSON config
/// file; `$VAR` and `${VAR}` references in URLs and keys are expanded from
/// the environment.
#[derive(Parser)]
#[command(name = "faceid")]
#[command(about = "Face identity enrollment and authentication")]
#[command(version)]
pub struct Cli {
    /// Config file (YAML or JSON)
    #[arg(long, global = true, default_value = "faceid.yaml")]
    pub config: PathBuf,

    /// Output as JSON (for piping)
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the collection if it does not exist
    Init,
    /// Show collection and provider status
    Status,
    /// Enroll one identity from one or more reference images
    Enroll(EnrollArgs),
    /// Authenticate a live frame against enrolled identities
    Auth(AuthArgs),
    /// Delete the collection and every enrolled vector
    Drop,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging; RUST_LOG overrides the level picked by --verbose.
    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Init => commands::init(&cli).await,
        Commands::Status => commands::status(&cli).await,
        Commands::Enroll(args) => args.run(&cli).await,
        Commands::Auth(args) => args.run(&cli).await,
        Commands::Drop => commands::drop_collection(&cli).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repeated_images() {
        let cli = Cli::try_parse_from([
            "faceid", "--json", "enroll", "--id", "alice01", "--image", "a.png", "--image",
            "b.jpg",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.config, PathBuf::from("faceid.yaml"));
        assert!(matches!(cli.command, Commands::Enroll(_)));
    }

    #[test]
    fn enroll_requires_an_image() {
        assert!(Cli::try_parse_from(["faceid", "enroll", "--id", "alice01"]).is_err());
    }

    #[test]
    fn auth_threshold_is_optional() {
        let cli =
            Cli::try_parse_from(["faceid", "auth", "--image", "live.png", "--config", "x.json"])
                .unwrap();
        assert_eq!(cli.config, PathBuf::from("x.json"));
        assert!(matches!(cli.command, Commands::Auth(_)));
    }
}
