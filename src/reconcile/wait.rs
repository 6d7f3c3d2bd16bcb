//! Delay policies between reconciliation passes.

use std::collections::BTreeSet;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::invoker::OperationRegistry;
use crate::types::Tag;

/// How long to wait before re-running pending chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum WaitPolicy {
  Static { wait_in_seconds: f64 },
  /// `wait_in_seconds * multiplier^run_count`
  Exponential { wait_in_seconds: f64, multiplier: f64 },
  /// Uniform in `[min_value, max_value]` seconds.
  Random { min_value: f64, max_value: f64 },
}

impl Default for WaitPolicy {
  fn default() -> Self {
    WaitPolicy::Static {
      wait_in_seconds: 3.0,
    }
  }
}

impl WaitPolicy {
  pub fn none() -> Self {
    WaitPolicy::Static {
      wait_in_seconds: 0.0,
    }
  }

  /// Delay before rerun number `run_count` (0-based).
  pub fn delay(&self, run_count: u32) -> Duration {
    let secs = match self {
      WaitPolicy::Static { wait_in_seconds } => *wait_in_seconds,
      WaitPolicy::Exponential {
        wait_in_seconds,
        multiplier,
      } => wait_in_seconds * multiplier.powi(run_count.min(i32::MAX as u32) as i32),
      WaitPolicy::Random {
        min_value,
        max_value,
      } => {
        let (lo, hi) = if min_value <= max_value {
          (*min_value, *max_value)
        } else {
          (*max_value, *min_value)
        };
        if lo.is_finite() && hi.is_finite() {
          rand::thread_rng().gen_range(lo..=hi)
        } else {
          0.0
        }
      }
    };
    seconds(secs)
  }
}

fn seconds(secs: f64) -> Duration {
  if secs.is_nan() || secs <= 0.0 {
    return Duration::ZERO;
  }
  Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Longest delay requested by any pending chunk's provider.
pub fn delay_for(
  pending: &BTreeSet<Tag>,
  registry: &OperationRegistry,
  default: &WaitPolicy,
  run_count: u32,
) -> Duration {
  pending
    .iter()
    .map(|tag| {
      registry
        .wait_policy(tag.state())
        .unwrap_or(default)
        .delay(run_count)
    })
    .max()
    .unwrap_or(Duration::ZERO)
}
