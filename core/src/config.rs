use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Query-time policy. `results_frac` and `min_to_check` bound how many
/// retained minimizers are checked; `max_results` bounds how many candidates
/// are resolved and aligned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_results_frac")]
    pub results_frac: f64,
    #[serde(default = "default_min_to_check")]
    pub min_to_check: usize,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_results_frac() -> f64 { 0.5 }
fn default_min_to_check() -> usize { 10 }
fn default_max_results() -> usize { 50 }
fn default_timeout_ms() -> u64 { 5_000 }

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            results_frac: default_results_frac(),
            min_to_check: default_min_to_check(),
            max_results: default_max_results(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<()> {
        validate_results_frac(self.results_frac)
    }
}

pub(crate) fn validate_results_frac(results_frac: f64) -> Result<()> {
    if results_frac > 0.0 && results_frac <= 1.0 {
        Ok(())
    } else {
        Err(Error::InvalidParams(format!("results_frac must be in (0, 1], got {results_frac}")))
    }
}
