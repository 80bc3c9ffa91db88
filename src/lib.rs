pub mod app;
pub mod config;
pub mod engine;
pub mod error;
pub mod log;
pub mod providers;
pub mod rates;
pub mod source;
pub mod ui;

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

use crate::providers::currency_api::CurrencyApiProvider;
use crate::source::RateSource;

/// Commands the library knows how to run; the CLI maps its subcommands onto
/// these.
pub enum AppCommand {
    Convert {
        amounts: Vec<f64>,
        from: Option<String>,
        to: Option<String>,
        round_trip: bool,
    },
    Rates {
        base: Option<String>,
        all: bool,
        only: Vec<String>,
    },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Currency converter starting...");

    let config = match config_path {
        Some(path) => config::AppConfig::load_from_path(path)?,
        None => config::AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let primary_url = config
        .providers
        .primary
        .as_ref()
        .map_or(config::DEFAULT_PRIMARY_URL, |p| &p.base_url);
    let fallback_url = config
        .providers
        .fallback
        .as_ref()
        .map_or(config::DEFAULT_FALLBACK_URL, |p| &p.base_url);

    let primary = Arc::new(CurrencyApiProvider::new("primary", primary_url));
    let fallback = Arc::new(CurrencyApiProvider::new("fallback", fallback_url));
    let source = RateSource::new(primary, fallback);

    match command {
        AppCommand::Convert {
            amounts,
            from,
            to,
            round_trip,
        } => {
            let from = from.unwrap_or_else(|| config.defaults.from.clone());
            let to = to.unwrap_or_else(|| config.defaults.to.clone());
            app::run_convert(source, &amounts, &from, &to, round_trip).await
        }
        AppCommand::Rates { base, all, only } => {
            let base = base.unwrap_or_else(|| config.defaults.from.clone());
            app::run_rates(source, &base, all, &only).await
        }
    }
}
