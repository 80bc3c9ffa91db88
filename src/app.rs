//! Event-driven conversion controller and the CLI commands built on it.

use anyhow::{Context, Result, bail};
use chrono::Local;
use comfy_table::Cell;
use std::collections::VecDeque;
use tracing::debug;

use crate::engine::{ConversionEngine, ConversionRequest, ConversionResult};
use crate::rates::normalize_code;
use crate::source::RateSource;
use crate::ui;

/// Owns the rate source, the engine and the current request, and sequences
/// them: a base-currency change triggers a resolve (once per distinct base),
/// any input change triggers a recompute while rates are available.
pub struct Converter {
    source: RateSource,
    engine: ConversionEngine,
    request: ConversionRequest,
    converted_amount: Option<f64>,
}

impl Converter {
    /// No network work happens here; the first hook call performs the
    /// initial resolution.
    pub fn new(source: RateSource, request: ConversionRequest) -> Self {
        Converter {
            source,
            engine: ConversionEngine::new(),
            request,
            converted_amount: None,
        }
    }

    /// The `from` currency changed: re-resolve if the held snapshot is for a
    /// different base, then recompute.
    pub async fn on_base_currency_changed(&mut self, code: &str) -> Option<ConversionResult> {
        self.request.from = normalize_code(code);
        self.resolve_if_base_changed().await;
        self.recompute().await
    }

    /// Any part of the request changed. Only a `from` change costs a fetch;
    /// `to`/`amount` changes recompute against the held snapshot.
    pub async fn on_request_changed(&mut self, request: ConversionRequest) -> Option<ConversionResult> {
        self.request = request;
        self.resolve_if_base_changed().await;
        self.recompute().await
    }

    /// Exchanges `from` and `to`, resolves the new base, then converts.
    pub async fn on_swap(&mut self) -> Option<ConversionResult> {
        let swapped = self.request.swapped();
        debug!(from = %swapped.from, to = %swapped.to, "swapping currencies");
        self.on_request_changed(swapped).await
    }

    /// Explicit submit. Same computation as the automatic triggers; a second
    /// call with identical inputs appends a second, identical history entry.
    pub async fn convert_now(&mut self) -> Option<ConversionResult> {
        self.recompute().await
    }

    async fn resolve_if_base_changed(&mut self) {
        let held = self.source.snapshot().await.map(|s| s.base);
        if held.as_deref() != Some(self.request.from.as_str()) {
            self.source.resolve(&self.request.from).await;
        }
    }

    async fn recompute(&mut self) -> Option<ConversionResult> {
        let snapshot = self.source.snapshot().await?;
        if snapshot.rates.is_empty() {
            return None;
        }
        let result = self.engine.convert(&snapshot, &self.request)?;
        self.converted_amount = Some(result.converted_amount);
        Some(result)
    }

    pub fn request(&self) -> &ConversionRequest {
        &self.request
    }

    pub fn converted_amount(&self) -> Option<f64> {
        self.converted_amount
    }

    pub fn history(&self) -> &VecDeque<ConversionResult> {
        self.engine.history()
    }

    pub fn source(&self) -> &RateSource {
        &self.source
    }
}

/// Converts one or more amounts between a currency pair and prints the
/// results, the rolling history and the rate freshness.
pub async fn run_convert(
    source: RateSource,
    amounts: &[f64],
    from: &str,
    to: &str,
    round_trip: bool,
) -> Result<()> {
    let first = amounts
        .first()
        .copied()
        .context("At least one amount is required")?;
    let request = ConversionRequest::new(from, to, first)?;

    let mut converter = Converter::new(source, request.clone());

    let spinner = ui::new_spinner(&format!(
        "Fetching exchange rates for {}...",
        request.from.to_uppercase()
    ));
    converter.on_base_currency_changed(&request.from).await;
    spinner.finish_and_clear();

    if let Some(message) = converter.source().error().await {
        bail!(message);
    }

    for amount in &amounts[1..] {
        let next = ConversionRequest::new(&request.from, &request.to, *amount)?;
        converter.on_request_changed(next).await;
    }

    let Some(forward) = converter.history().front().cloned() else {
        bail!(
            "No rate available for '{}' with base '{}'",
            request.to,
            request.from
        );
    };
    println!("{}", format_result_line(&forward));

    if let Some(rate) = converter
        .source()
        .snapshot()
        .await
        .and_then(|s| s.rates.get(&request.to).copied())
    {
        println!(
            "{}",
            ui::style_text(
                &format!(
                    "1 {} = {} {}",
                    request.from.to_uppercase(),
                    format_rate(rate),
                    request.to.to_uppercase()
                ),
                ui::StyleType::Subtle
            )
        );
    }

    if round_trip {
        let spinner = ui::new_spinner(&format!(
            "Fetching exchange rates for {}...",
            request.to.to_uppercase()
        ));
        converter.on_swap().await;
        spinner.finish_and_clear();

        if let Some(message) = converter.source().error().await {
            bail!(message);
        }
        match converter.history().front() {
            Some(back) if back.from == request.to => {
                println!("{}", format_result_line(back));
            }
            _ => bail!(
                "No rate available for '{}' with base '{}'",
                request.from,
                request.to
            ),
        }
    }

    if converter.history().len() > 1 {
        println!("\n{}", ui::style_text("Recent Conversions", ui::StyleType::Title));
        println!("{}", history_table(converter.history()));
    }

    if let Some(updated) = converter.source().last_updated().await {
        println!(
            "{}",
            ui::style_text(
                &format!(
                    "Rates updated: {}",
                    updated.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
                ),
                ui::StyleType::Subtle
            )
        );
    }

    Ok(())
}

/// Prints the rate table for a base currency: the popular subset by default,
/// everything with `all`, or just the requested codes.
pub async fn run_rates(source: RateSource, base: &str, all: bool, only: &[String]) -> Result<()> {
    let base = normalize_code(base);
    if base.is_empty() {
        bail!("Currency codes must not be empty");
    }

    let spinner = ui::new_spinner(&format!(
        "Fetching exchange rates for {}...",
        base.to_uppercase()
    ));
    source.resolve(&base).await;
    spinner.finish_and_clear();

    if let Some(message) = source.error().await {
        bail!(message);
    }
    let snapshot = source
        .snapshot()
        .await
        .with_context(|| format!("No rates resolved for '{base}'"))?;

    let mut codes: Vec<String> = if !only.is_empty() {
        only.iter().map(|c| normalize_code(c)).collect()
    } else if all {
        let mut codes: Vec<String> = snapshot.rates.keys().cloned().collect();
        codes.sort();
        codes
    } else {
        ui::POPULAR_CURRENCIES
            .iter()
            .map(|c| c.to_string())
            .filter(|c| *c != base)
            .collect()
    };
    codes.dedup();

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Code"),
        ui::header_cell("Currency"),
        ui::header_cell(&format!("Rate (1 {})", base.to_uppercase())),
    ]);
    for code in &codes {
        let name = ui::currency_name(code).unwrap_or("-");
        let rate = match snapshot.rates.get(code) {
            Some(rate) => ui::amount_cell(&format_rate(*rate)),
            None => Cell::new("N/A"),
        };
        table.add_row(vec![Cell::new(code.to_uppercase()), Cell::new(name), rate]);
    }
    println!("{table}");

    if let Some(updated) = source.last_updated().await {
        println!(
            "{}",
            ui::style_text(
                &format!(
                    "Rates updated: {}",
                    updated.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
                ),
                ui::StyleType::Subtle
            )
        );
    }

    Ok(())
}

fn format_result_line(result: &ConversionResult) -> String {
    format!(
        "{:.2} {} = {} {}",
        result.amount,
        result.from.to_uppercase(),
        ui::style_text(
            &format!("{:.2}", result.converted_amount),
            ui::StyleType::ResultValue
        ),
        result.to.to_uppercase()
    )
}

/// Rates span several orders of magnitude (83.12 INR vs 0.000016 BTC per
/// USD); widen the precision for the tiny ones so they do not print as zero.
fn format_rate(rate: f64) -> String {
    if rate != 0.0 && rate.abs() < 0.01 {
        format!("{rate:.8}")
    } else {
        format!("{rate:.4}")
    }
}

fn history_table(history: &VecDeque<ConversionResult>) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Conversion"), ui::header_cell("Time")]);
    for entry in history {
        table.add_row(vec![
            Cell::new(format!(
                "{:.2} {} = {:.2} {}",
                entry.amount,
                entry.from.to_uppercase(),
                entry.converted_amount,
                entry.to.to_uppercase()
            )),
            Cell::new(
                entry
                    .computed_at
                    .with_timezone(&Local)
                    .format("%H:%M:%S")
                    .to_string(),
            ),
        ]);
    }
    table.to_string()
}
