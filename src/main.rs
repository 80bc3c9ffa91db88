use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use xfx::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for xfx::AppCommand {
    fn from(cmd: Commands) -> xfx::AppCommand {
        match cmd {
            Commands::Convert {
                amounts,
                from,
                to,
                round_trip,
            } => xfx::AppCommand::Convert {
                amounts,
                from,
                to,
                round_trip,
            },
            Commands::Rates { base, all, only } => xfx::AppCommand::Rates { base, all, only },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Convert one or more amounts between two currencies
    Convert {
        /// Amounts denominated in the source currency
        #[arg(required = true, num_args = 1..)]
        amounts: Vec<f64>,

        /// Source currency code (e.g. usd); config default when omitted
        #[arg(short, long)]
        from: Option<String>,

        /// Target currency code (e.g. inr); config default when omitted
        #[arg(short, long)]
        to: Option<String>,

        /// Also convert the last result back to the source currency
        #[arg(long)]
        round_trip: bool,
    },
    /// Display live exchange rates for a base currency
    Rates {
        /// Base currency code; config default when omitted
        base: Option<String>,

        /// List every available currency instead of the popular subset
        #[arg(short, long)]
        all: bool,

        /// Show only these currency codes
        #[arg(short, long, num_args = 1..)]
        only: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(cmd) => xfx::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}

fn setup() -> anyhow::Result<()> {
    use anyhow::Context;

    let path = xfx::config::AppConfig::default_config_path()?;

    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let default_config = r#"---
providers:
  primary:
    base_url: "https://cdn.jsdelivr.net/npm/@fawazahmed0/currency-api@latest"
  fallback:
    base_url: "https://latest.currency-api.pages.dev"

defaults:
  from: "usd"
  to: "inr"
"#;

    std::fs::write(&path, default_config)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    tracing::info!("Created default configuration at {}", path.display());
    Ok(())
}
