//! Runtime tuning knobs.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a [`Runtime`](crate::runtime::Runtime).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Upper bound of component executions per tick; remaining work continues next tick.
    pub max_steps_per_tick: usize,
    /// Interval at which the async run loop re-polls watch subscriptions.
    pub watch_poll_interval_ms: u64,
    /// Maximum nesting of call-action invocations.
    pub max_call_depth: usize,
    /// Flow started as the root flow state. Defaults to the first flow.
    pub entry_flow: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_steps_per_tick: 10_000,
            watch_poll_interval_ms: 16,
            max_call_depth: 64,
            entry_flow: None,
        }
    }
}

impl RuntimeConfig {
    /// Create configuration from environment variables.
    ///
    /// - `NAGARE_MAX_STEPS_PER_TICK`
    /// - `NAGARE_WATCH_POLL_MS`
    /// - `NAGARE_MAX_CALL_DEPTH`
    /// - `NAGARE_ENTRY_FLOW`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let parsed = |name: &str| std::env::var(name).ok().and_then(|s| s.parse::<u64>().ok());

        Self {
            max_steps_per_tick: parsed("NAGARE_MAX_STEPS_PER_TICK")
                .map(|v| v as usize)
                .unwrap_or(defaults.max_steps_per_tick)
                .max(1),
            watch_poll_interval_ms: parsed("NAGARE_WATCH_POLL_MS")
                .unwrap_or(defaults.watch_poll_interval_ms),
            max_call_depth: parsed("NAGARE_MAX_CALL_DEPTH")
                .map(|v| v as usize)
                .unwrap_or(defaults.max_call_depth),
            entry_flow: std::env::var("NAGARE_ENTRY_FLOW").ok(),
        }
    }

    pub fn with_max_steps_per_tick(mut self, max: usize) -> Self {
        self.max_steps_per_tick = max.max(1);
        self
    }

    pub fn with_watch_poll_interval(mut self, interval: Duration) -> Self {
        self.watch_poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_entry_flow(mut self, flow: &str) -> Self {
        self.entry_flow = Some(flow.to_string());
        self
    }

    pub fn watch_poll_interval(&self) -> Duration {
        Duration::from_millis(self.watch_poll_interval_ms.max(1))
    }
}
