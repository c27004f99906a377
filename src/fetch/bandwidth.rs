//! Monthly bandwidth accounting against a soft budget.
//!
//! Exceeding the budget never fails a request; it only raises log warnings,
//! once at 70% and once at 90% per calendar month.

use std::sync::Mutex;

use chrono::Utc;
use serde::Serialize;

/// Usage fraction that triggers the first warning.
pub const SOFT_THRESHOLD: f64 = 0.7;
/// Usage fraction that triggers the error-level warning.
pub const HARD_THRESHOLD: f64 = 0.9;

/// Budget position after recording a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetLevel {
    Normal,
    Soft,
    Hard,
}

/// Snapshot of the current month's usage.
#[derive(Debug, Clone, Serialize)]
pub struct BandwidthUsage {
    pub month: String,
    pub bytes: u64,
    pub budget_bytes: u64,
}

#[derive(Debug, Default)]
struct MeterState {
    month: String,
    bytes: u64,
    warned_soft: bool,
    warned_hard: bool,
}

/// Thread-safe byte counter that resets when the month changes.
#[derive(Debug)]
pub struct BandwidthMeter {
    budget_bytes: u64,
    state: Mutex<MeterState>,
}

impl BandwidthMeter {
    /// A zero budget disables warnings but still counts bytes.
    pub fn new(budget_bytes: u64) -> Self {
        Self {
            budget_bytes,
            state: Mutex::new(MeterState::default()),
        }
    }

    /// Record bytes for the current UTC month.
    pub fn record(&self, bytes: u64) -> BudgetLevel {
        self.record_in(&current_month(), bytes)
    }

    fn record_in(&self, month: &str, bytes: u64) -> BudgetLevel {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.month != month {
            *state = MeterState {
                month: month.to_string(),
                ..MeterState::default()
            };
        }
        state.bytes += bytes;

        if self.budget_bytes == 0 {
            return BudgetLevel::Normal;
        }

        let used_mb = state.bytes as f64 / 1_048_576.0;
        let budget_mb = self.budget_bytes as f64 / 1_048_576.0;
        let usage = state.bytes as f64 / self.budget_bytes as f64;

        if usage >= HARD_THRESHOLD {
            if !state.warned_hard {
                state.warned_hard = true;
                state.warned_soft = true;
                log::error!(
                    "Bandwidth ~90% used ({:.1} MB of {:.0} MB). Reduce requests or rotate proxies.",
                    used_mb,
                    budget_mb
                );
            }
            BudgetLevel::Hard
        } else if usage >= SOFT_THRESHOLD {
            if !state.warned_soft {
                state.warned_soft = true;
                log::warn!(
                    "Bandwidth ~70% used ({:.1} MB of {:.0} MB). Consider pausing heavy scraping.",
                    used_mb,
                    budget_mb
                );
            }
            BudgetLevel::Soft
        } else {
            BudgetLevel::Normal
        }
    }

    pub fn usage(&self) -> BandwidthUsage {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        BandwidthUsage {
            month: state.month.clone(),
            bytes: state.bytes,
            budget_bytes: self.budget_bytes,
        }
    }
}

fn current_month() -> String {
    Utc::now().format("%Y-%m").to_string()
}
