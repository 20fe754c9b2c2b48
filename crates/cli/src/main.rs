use clap::{Parser, Subcommand};

mod commands;
mod wiring;

use commands::{IndexArgs, ServeArgs, ShowConfigArgs};

#[derive(Parser)]
#[command(name = "condswap")]
#[command(about = "Oracle-conditioned limit orders for the 1inch limit-order protocol", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web API with the condition monitor and pending-order sweeper
    Serve(ServeArgs),
    /// Read one index, or list all, through the configured oracle
    Index(IndexArgs),
    /// Print the resolved configuration with secrets redacted
    Config(ShowConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Serve(args) => commands::run_serve(args).await?,
        Commands::Index(args) => commands::run_index(args).await?,
        Commands::Config(args) => commands::run_show_config(&args)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_with_overrides() {
        let cli = Cli::try_parse_from([
            "condswap",
            "serve",
            "--config",
            "config/Config.test.toml",
            "--addr",
            "127.0.0.1:9000",
            "--no-monitor",
        ])
        .unwrap();
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.config.config, "config/Config.test.toml");
                assert_eq!(args.addr.as_deref(), Some("127.0.0.1:9000"));
                assert!(args.no_monitor);
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn index_id_is_optional() {
        let cli = Cli::try_parse_from(["condswap", "index"]).unwrap();
        assert!(matches!(cli.command, Commands::Index(IndexArgs { id: None, .. })));

        let cli = Cli::try_parse_from(["condswap", "index", "3"]).unwrap();
        assert!(matches!(cli.command, Commands::Index(IndexArgs { id: Some(3), .. })));
    }

    #[test]
    fn rejects_non_numeric_index() {
        assert!(Cli::try_parse_from(["condswap", "index", "vix"]).is_err());
    }
}
