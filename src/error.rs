//! Error types for the rate acquisition boundary.

use thiserror::Error;

/// A single fetch attempt against one rate endpoint failed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network unreachable, timeout, DNS failure.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Endpoint answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    UpstreamStatus { url: String, status: u16 },

    /// Body did not contain a usable rate table for the requested base.
    #[error("malformed response from {url}: {detail}")]
    MalformedResponse { url: String, detail: String },
}

/// Terminal failure: the primary and the fallback endpoint both failed.
#[derive(Debug, Error)]
#[error("both rate sources failed for '{base}' (primary: {primary}; fallback: {fallback})")]
pub struct BothSourcesFailed {
    pub base: String,
    pub primary: FetchError,
    pub fallback: FetchError,
}
