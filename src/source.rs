//! Rate acquisition with a primary and a fallback source.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::BothSourcesFailed;
use crate::rates::{RateTable, RateTableProvider, normalize_code};

/// User-facing message set on the `error` observable when the primary and the
/// fallback source both fail.
pub const SOURCES_FAILED_MSG: &str =
    "Failed to fetch currency data from all sources. Please try again later.";

/// Rate table for one base currency at one point in time. Immutable once
/// constructed; superseded wholesale when the base changes.
#[derive(Debug, Clone)]
pub struct RateSnapshot {
    pub base: String,
    pub rates: RateTable,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Default)]
struct SourceState {
    snapshot: Option<RateSnapshot>,
    loading: bool,
    error: Option<String>,
    last_updated: Option<DateTime<Utc>>,
}

/// Resolves a base currency to a [`RateSnapshot`], trying the primary
/// endpoint and falling back to the secondary on failure.
///
/// All failure paths terminate in the `error` observable; `resolve` never
/// surfaces an error to the caller. A resolution that completes after a newer
/// one has been issued is discarded, so the snapshot always belongs to the
/// most recently requested base.
pub struct RateSource {
    primary: Arc<dyn RateTableProvider>,
    fallback: Arc<dyn RateTableProvider>,
    state: Mutex<SourceState>,
    latest_request: AtomicU64,
}

impl RateSource {
    pub fn new(primary: Arc<dyn RateTableProvider>, fallback: Arc<dyn RateTableProvider>) -> Self {
        RateSource {
            primary,
            fallback,
            state: Mutex::new(SourceState::default()),
            latest_request: AtomicU64::new(0),
        }
    }

    /// Fetch the rate table for `base`, primary first, fallback on any
    /// failure. No retries beyond that single fallback attempt.
    pub async fn resolve(&self, base: &str) {
        let base = normalize_code(base);
        let request_id = self.latest_request.fetch_add(1, Ordering::SeqCst) + 1;

        {
            let mut state = self.state.lock().await;
            state.loading = true;
            state.error = None;
        }

        if base.is_empty() {
            let mut state = self.state.lock().await;
            if self.latest_request.load(Ordering::SeqCst) == request_id {
                state.error = Some("Currency code must not be empty.".to_string());
                state.loading = false;
            }
            return;
        }

        debug!(%base, request_id, "resolving rate table");

        let outcome = match self.primary.fetch_rates(&base).await {
            Ok(rates) => Ok(rates),
            Err(primary_err) => {
                warn!(
                    provider = self.primary.name(),
                    error = %primary_err,
                    "primary rate source failed, trying fallback"
                );
                match self.fallback.fetch_rates(&base).await {
                    Ok(rates) => Ok(rates),
                    Err(fallback_err) => Err(BothSourcesFailed {
                        base: base.clone(),
                        primary: primary_err,
                        fallback: fallback_err,
                    }),
                }
            }
        };

        let mut state = self.state.lock().await;

        // A newer resolve was issued while this one was in flight; its result
        // wins regardless of arrival order.
        if self.latest_request.load(Ordering::SeqCst) != request_id {
            debug!(%base, request_id, "discarding stale resolution");
            return;
        }

        match outcome {
            Ok(rates) => {
                let now = Utc::now();
                debug!(%base, count = rates.len(), "installed rate snapshot");
                state.snapshot = Some(RateSnapshot {
                    base,
                    rates,
                    fetched_at: now,
                });
                state.last_updated = Some(now);
                state.error = None;
            }
            Err(err) => {
                warn!(error = %err, "all rate sources failed");
                // Previously held snapshot stays usable for the old base.
                state.error = Some(SOURCES_FAILED_MSG.to_string());
            }
        }
        state.loading = false;
    }

    pub async fn snapshot(&self) -> Option<RateSnapshot> {
        self.state.lock().await.snapshot.clone()
    }

    /// Current rate table; empty when nothing has resolved yet.
    pub async fn rates(&self) -> RateTable {
        self.state
            .lock()
            .await
            .snapshot
            .as_ref()
            .map(|s| s.rates.clone())
            .unwrap_or_default()
    }

    pub async fn is_loading(&self) -> bool {
        self.state.lock().await.loading
    }

    pub async fn error(&self) -> Option<String> {
        self.state.lock().await.error.clone()
    }

    pub async fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.last_updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Scripted provider: per-base rate tables or failures, optional delay,
    /// call counting.
    struct ScriptedProvider {
        name: String,
        tables: HashMap<String, RateTable>,
        delays: HashMap<String, Duration>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(name: &str) -> Self {
            ScriptedProvider {
                name: name.to_string(),
                tables: HashMap::new(),
                delays: HashMap::new(),
                calls: AtomicUsize::new(0),
            }
        }

        fn with_table(mut self, base: &str, rates: &[(&str, f64)]) -> Self {
            let table = rates
                .iter()
                .map(|(code, rate)| (code.to_string(), *rate))
                .collect();
            self.tables.insert(base.to_string(), table);
            self
        }

        fn with_delay(mut self, base: &str, delay: Duration) -> Self {
            self.delays.insert(base.to_string(), delay);
            self
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RateTableProvider for ScriptedProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn fetch_rates(&self, base: &str) -> Result<RateTable, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delays.get(base) {
                tokio::time::sleep(*delay).await;
            }
            self.tables
                .get(base)
                .cloned()
                .ok_or_else(|| FetchError::UpstreamStatus {
                    url: format!("scripted://{}/{base}", self.name),
                    status: 404,
                })
        }
    }

    fn source_with(primary: ScriptedProvider, fallback: ScriptedProvider) -> RateSource {
        RateSource::new(Arc::new(primary), Arc::new(fallback))
    }

    #[tokio::test]
    async fn test_primary_success() {
        let primary = ScriptedProvider::new("primary").with_table("usd", &[("inr", 83.12)]);
        let fallback = ScriptedProvider::new("fallback");
        let source = source_with(primary, fallback);

        source.resolve("usd").await;

        let snapshot = source.snapshot().await.unwrap();
        assert_eq!(snapshot.base, "usd");
        assert_eq!(snapshot.rates["inr"], 83.12);
        assert!(source.error().await.is_none());
        assert!(!source.is_loading().await);
        assert!(source.last_updated().await.is_some());
    }

    #[tokio::test]
    async fn test_fallback_attempted_once_after_primary_failure() {
        let primary = ScriptedProvider::new("primary");
        let fallback = ScriptedProvider::new("fallback").with_table("usd", &[("eur", 0.91)]);
        let source = RateSource::new(Arc::new(primary), Arc::new(fallback));

        source.resolve("usd").await;

        let snapshot = source.snapshot().await.unwrap();
        assert_eq!(snapshot.rates["eur"], 0.91);
        assert!(source.error().await.is_none());
    }

    #[tokio::test]
    async fn test_both_sources_failed_on_first_resolution() {
        let primary = Arc::new(ScriptedProvider::new("primary"));
        let fallback = Arc::new(ScriptedProvider::new("fallback"));
        let primary_dyn: Arc<dyn RateTableProvider> = primary.clone();
        let fallback_dyn: Arc<dyn RateTableProvider> = fallback.clone();
        let source = RateSource::new(primary_dyn, fallback_dyn);

        source.resolve("usd").await;

        assert_eq!(source.error().await.as_deref(), Some(SOURCES_FAILED_MSG));
        assert!(source.snapshot().await.is_none());
        assert!(source.rates().await.is_empty());
        assert!(!source.is_loading().await);
        // Exactly one attempt against each source, no retries.
        assert_eq!(primary.call_count(), 1);
        assert_eq!(fallback.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_refetch_keeps_previous_snapshot() {
        let primary = ScriptedProvider::new("primary").with_table("usd", &[("inr", 83.12)]);
        let fallback = ScriptedProvider::new("fallback");
        let source = source_with(primary, fallback);

        source.resolve("usd").await;
        assert!(source.error().await.is_none());

        // Neither source knows "eur"; the usd snapshot survives the failure.
        source.resolve("eur").await;
        assert_eq!(source.error().await.as_deref(), Some(SOURCES_FAILED_MSG));
        let snapshot = source.snapshot().await.unwrap();
        assert_eq!(snapshot.base, "usd");
    }

    #[tokio::test]
    async fn test_base_is_normalized() {
        let primary = ScriptedProvider::new("primary").with_table("usd", &[("inr", 83.12)]);
        let fallback = ScriptedProvider::new("fallback");
        let source = source_with(primary, fallback);

        // The scripted table is keyed lowercase, so an un-normalized base
        // would miss it.
        source.resolve(" USD ").await;
        assert_eq!(source.snapshot().await.unwrap().base, "usd");
    }

    #[tokio::test]
    async fn test_empty_code_terminates_in_error() {
        let primary = Arc::new(ScriptedProvider::new("primary"));
        let primary_dyn: Arc<dyn RateTableProvider> = primary.clone();
        let source = RateSource::new(
            primary_dyn,
            Arc::new(ScriptedProvider::new("fallback")),
        );

        source.resolve("   ").await;

        assert!(source.error().await.is_some());
        assert!(!source.is_loading().await);
        assert_eq!(primary.call_count(), 0);
    }

    #[tokio::test]
    async fn test_stale_resolution_is_discarded() {
        // "usd" resolves slowly, "eur" quickly; the "eur" request is issued
        // second, so the late "usd" result must be thrown away.
        let primary = ScriptedProvider::new("primary")
            .with_table("usd", &[("inr", 83.12)])
            .with_delay("usd", Duration::from_millis(100))
            .with_table("eur", &[("usd", 1.09)])
            .with_delay("eur", Duration::from_millis(10));
        let fallback = ScriptedProvider::new("fallback");
        let source = Arc::new(source_with(primary, fallback));

        let first = {
            let source = Arc::clone(&source);
            async move { source.resolve("usd").await }
        };
        let second = {
            let source = Arc::clone(&source);
            async move { source.resolve("eur").await }
        };
        tokio::join!(first, second);

        let snapshot = source.snapshot().await.unwrap();
        assert_eq!(snapshot.base, "eur");
        assert_eq!(snapshot.rates["usd"], 1.09);
        assert!(source.error().await.is_none());
        assert!(!source.is_loading().await);
    }

    #[tokio::test]
    async fn test_stale_failure_does_not_clobber_fresh_snapshot() {
        // The superseded request fails on both sources after the newer one
        // succeeded; the error from the stale request must not surface.
        let primary = ScriptedProvider::new("primary")
            .with_delay("xyz", Duration::from_millis(100))
            .with_table("eur", &[("usd", 1.09)]);
        let fallback = ScriptedProvider::new("fallback").with_delay("xyz", Duration::from_millis(100));
        let source = Arc::new(source_with(primary, fallback));

        let first = {
            let source = Arc::clone(&source);
            async move { source.resolve("xyz").await }
        };
        let second = {
            let source = Arc::clone(&source);
            async move { source.resolve("eur").await }
        };
        tokio::join!(first, second);

        assert_eq!(source.snapshot().await.unwrap().base, "eur");
        assert!(source.error().await.is_none());
    }
}
