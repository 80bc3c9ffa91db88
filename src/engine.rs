//! Synchronous conversion engine with a bounded history.

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use tracing::debug;

use crate::rates::normalize_code;
use crate::source::RateSnapshot;

/// Number of past conversions retained, most recent first.
pub const HISTORY_LIMIT: usize = 5;

/// What to convert: `amount` denominated in `from`, expressed in `to`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    pub from: String,
    pub to: String,
    pub amount: f64,
}

impl ConversionRequest {
    /// Builds a request with normalized currency codes. Codes must be
    /// non-empty and `amount` a finite non-negative number.
    pub fn new(from: &str, to: &str, amount: f64) -> Result<Self> {
        let from = normalize_code(from);
        let to = normalize_code(to);
        if from.is_empty() || to.is_empty() {
            bail!("Currency codes must not be empty");
        }
        if !amount.is_finite() || amount < 0.0 {
            bail!("Amount must be a non-negative number, got {amount}");
        }
        Ok(ConversionRequest { from, to, amount })
    }

    /// Exchanges `from` and `to`. Applying twice returns the original
    /// request. Rates are base-relative, so the caller must re-resolve for
    /// the new base before the next conversion is meaningful.
    pub fn swapped(&self) -> Self {
        ConversionRequest {
            from: self.to.clone(),
            to: self.from.clone(),
            amount: self.amount,
        }
    }
}

/// One completed conversion. `converted_amount` is rounded to 4 decimal
/// places; display formatting (2 decimals, uppercasing) is the UI's concern.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub from: String,
    pub to: String,
    pub amount: f64,
    pub converted_amount: f64,
    pub computed_at: DateTime<Utc>,
}

/// Rounds to 4 decimal places, half away from zero.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Computes conversions from a [`RateSnapshot`] and keeps the rolling
/// history. Fully synchronous; never suspends, never fails. A request the
/// snapshot cannot answer is a no-op.
#[derive(Debug, Default)]
pub struct ConversionEngine {
    history: VecDeque<ConversionResult>,
}

impl ConversionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Converts `request.amount` using `snapshot.rates[request.to]` and
    /// prepends the result to the history, evicting the oldest entry past
    /// [`HISTORY_LIMIT`].
    ///
    /// Returns `None` without touching the history when the snapshot's base
    /// does not match `request.from` or the target rate is absent: the
    /// "rates not yet loaded" case, distinct from a fetch error.
    pub fn convert(
        &mut self,
        snapshot: &RateSnapshot,
        request: &ConversionRequest,
    ) -> Option<ConversionResult> {
        if snapshot.base != request.from {
            debug!(
                base = %snapshot.base,
                from = %request.from,
                "snapshot base does not match request, skipping conversion"
            );
            return None;
        }
        let rate = *snapshot.rates.get(&request.to)?;

        let converted_amount = round4(request.amount * rate);
        let result = ConversionResult {
            from: request.from.clone(),
            to: request.to.clone(),
            amount: request.amount,
            converted_amount,
            computed_at: Utc::now(),
        };
        debug!(
            from = %result.from,
            to = %result.to,
            amount = result.amount,
            rate,
            converted_amount,
            "converted"
        );

        self.history.push_front(result.clone());
        self.history.truncate(HISTORY_LIMIT);
        Some(result)
    }

    /// Past conversions, most recent first.
    pub fn history(&self) -> &VecDeque<ConversionResult> {
        &self.history
    }
}
