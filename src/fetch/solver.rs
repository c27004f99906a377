// src/fetch/solver.rs

//! Client for a FlareSolverr-compatible challenge resolution proxy.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use super::block::challenge_signature;
use super::transport::{RawResponse, Transport, TransportError};

/// Bodies shorter than this are treated as a failed solve.
const MIN_SOLVED_BYTES: usize = 500;

#[derive(Error, Debug)]
pub enum SolverError {
    #[error("solver unreachable: {0}")]
    Transport(#[from] TransportError),

    #[error("solver returned HTTP {0}")]
    Status(u16),

    #[error("malformed solver response: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("solve rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Deserialize)]
struct SolverResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    solution: Option<Solution>,
}

#[derive(Debug, Deserialize)]
struct Solution {
    #[serde(default)]
    url: String,
    #[serde(default)]
    status: u16,
    #[serde(default)]
    response: String,
}

/// Delegates a GET to an external headless solver.
#[derive(Debug, Clone)]
pub struct ChallengeSolver {
    endpoint: String,
    max_timeout_ms: u64,
}

impl ChallengeSolver {
    pub fn new(endpoint: impl Into<String>, max_timeout_ms: u64) -> Self {
        Self {
            endpoint: endpoint.into(),
            max_timeout_ms,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Ask the solver for `url` and validate what comes back.
    pub async fn solve(
        &self,
        transport: &dyn Transport,
        url: &str,
    ) -> Result<RawResponse, SolverError> {
        let payload = json!({
            "cmd": "request.get",
            "url": url,
            "maxTimeout": self.max_timeout_ms,
        });
        // Leave the solver room to report its own timeout
        let timeout = Duration::from_millis(self.max_timeout_ms) + Duration::from_secs(10);

        let response = transport
            .post_json(&self.endpoint, &payload, timeout)
            .await?;
        if response.status != 200 {
            return Err(SolverError::Status(response.status));
        }

        let parsed: SolverResponse = serde_json::from_str(&response.body)?;
        if parsed.status != "ok" {
            return Err(SolverError::Rejected(if parsed.message.is_empty() {
                parsed.status
            } else {
                parsed.message
            }));
        }

        let solution = parsed
            .solution
            .ok_or_else(|| SolverError::Rejected("missing solution".into()))?;
        if solution.status >= 400 {
            return Err(SolverError::Rejected(format!(
                "upstream status {}",
                solution.status
            )));
        }
        if solution.response.len() < MIN_SOLVED_BYTES {
            return Err(SolverError::Rejected("empty or too short response".into()));
        }
        if let Some(sig) = challenge_signature(&solution.response) {
            return Err(SolverError::Rejected(format!("challenge still present ({sig})")));
        }

        log::info!(
            "Challenge solver succeeded for {} ({} bytes)",
            url,
            solution.response.len()
        );
        let final_url = if solution.url.is_empty() {
            url.to_string()
        } else {
            solution.url
        };
        Ok(RawResponse {
            status: solution.status.max(200),
            final_url,
            content_length: Some(solution.response.len() as u64),
            body: solution.response,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;

    fn solver_body(status: &str, upstream: u16, html: &str) -> String {
        json!({
            "status": status,
            "message": "",
            "solution": { "url": "https://site.com/x", "status": upstream, "response": html }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_successful_solve() {
        let transport = ScriptedTransport::new();
        let html = format!("<html><body>{}</body></html>", "text ".repeat(200));
        transport.push_post(200, &solver_body("ok", 200, &html));

        let solver = ChallengeSolver::new("http://solver:8191/v1", 60_000);
        let response = solver.solve(&transport, "https://site.com/x").await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, html);
        assert_eq!(transport.posted_urls(), vec!["http://solver:8191/v1"]);
    }

    #[tokio::test]
    async fn test_rejects_short_or_challenged_solutions() {
        let solver = ChallengeSolver::new("http://solver:8191/v1", 60_000);

        let transport = ScriptedTransport::new();
        transport.push_post(200, &solver_body("ok", 200, "<p>tiny</p>"));
        assert!(matches!(
            solver.solve(&transport, "https://site.com/x").await,
            Err(SolverError::Rejected(_))
        ));

        let transport = ScriptedTransport::new();
        let html = format!("<title>Just a moment...</title>{}", "x".repeat(600));
        transport.push_post(200, &solver_body("ok", 200, &html));
        assert!(matches!(
            solver.solve(&transport, "https://site.com/x").await,
            Err(SolverError::Rejected(_))
        ));

        let transport = ScriptedTransport::new();
        transport.push_post(200, &solver_body("error", 0, ""));
        assert!(solver.solve(&transport, "https://site.com/x").await.is_err());
    }
}
