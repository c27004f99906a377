// src/fetch/mod.rs

//! Fetch resilience layer.
//!
//! [`Fetcher`] turns one logical GET into a walk up the escalation ladder,
//! accounting bandwidth and probing mirror health on the way.

pub mod bandwidth;
pub mod block;
pub mod headers;
pub mod health;
pub mod ladder;
pub mod mirrors;
pub mod solver;
pub mod transport;

use thiserror::Error;

pub use bandwidth::{BandwidthMeter, BandwidthUsage, BudgetLevel};
pub use block::{BlockReason, Verdict, body_block_signature, classify, is_challenge_page};
pub use headers::HeaderProfiles;
pub use health::{SiteHealthEntry, SiteHealthMonitor};
pub use ladder::{
    BrowserPolicy, FetchIntent, FetchRequest, Fetched, Fetcher, LadderStep, SiteTraits,
};
pub use solver::ChallengeSolver;
pub use transport::{HttpTransport, OutboundRequest, RawResponse, Route, Transport, TransportError};

/// Final failure of one logical fetch.
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("{url} returned HTTP {status}")]
    NotFound { url: String, status: u16 },

    #[error("all fetch strategies failed for {url} after {attempts} attempts (last: {last})")]
    Exhausted {
        url: String,
        attempts: usize,
        last: String,
    },
}
