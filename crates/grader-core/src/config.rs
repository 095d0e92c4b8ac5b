//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Grading engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum entries in the in-process cache tier.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Base URL of the distributed cache. `None` disables the tier.
    #[serde(default)]
    pub remote_url: Option<String>,

    /// Expiry requested for distributed cache entries, in seconds.
    #[serde(default = "default_remote_ttl")]
    pub remote_ttl_secs: u64,

    /// Request timeout for the distributed cache, in seconds.
    #[serde(default = "default_remote_timeout")]
    pub remote_timeout_secs: u64,

    /// Whether the heuristic template tier answers cache misses.
    #[serde(default = "default_true")]
    pub heuristic_templates: bool,

    /// Per-category timeout for the scoring backend, in seconds. 0 disables it.
    #[serde(default = "default_judge_timeout")]
    pub judge_timeout_secs: u64,

    /// Score failed backend calls with the reference backend instead of failing.
    #[serde(default)]
    pub fallback_on_backend_error: bool,

    /// Make the reference backend sleep like a remote one.
    #[serde(default)]
    pub simulate_latency: bool,
}

fn default_cache_capacity() -> usize {
    1000
}

fn default_remote_ttl() -> u64 {
    3600
}

fn default_remote_timeout() -> u64 {
    2
}

fn default_judge_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
            remote_url: None,
            remote_ttl_secs: default_remote_ttl(),
            remote_timeout_secs: default_remote_timeout(),
            heuristic_templates: true,
            judge_timeout_secs: default_judge_timeout(),
            fallback_on_backend_error: false,
            simulate_latency: false,
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

impl EngineConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `GRADER_CACHE_CAPACITY` | In-process cache capacity |
    /// | `GRADER_CACHE_URL` | Distributed cache base URL |
    /// | `GRADER_CACHE_TTL` | Distributed entry expiry (seconds) |
    /// | `GRADER_CACHE_TIMEOUT` | Distributed cache request timeout (seconds) |
    /// | `GRADER_TEMPLATES` | Enable heuristic template matches |
    /// | `GRADER_JUDGE_TIMEOUT` | Backend timeout per category (seconds, 0 = none) |
    /// | `GRADER_BACKEND_FALLBACK` | Degrade to reference scoring on backend failure |
    /// | `GRADER_SIMULATE_LATENCY` | Simulated latency in the reference backend |
    pub fn from_env() -> Self {
        Self {
            cache_capacity: env_parse("GRADER_CACHE_CAPACITY").unwrap_or_else(default_cache_capacity),
            remote_url: std::env::var("GRADER_CACHE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            remote_ttl_secs: env_parse("GRADER_CACHE_TTL").unwrap_or_else(default_remote_ttl),
            remote_timeout_secs: env_parse("GRADER_CACHE_TIMEOUT")
                .unwrap_or_else(default_remote_timeout),
            heuristic_templates: env_flag("GRADER_TEMPLATES").unwrap_or(true),
            judge_timeout_secs: env_parse("GRADER_JUDGE_TIMEOUT")
                .unwrap_or_else(default_judge_timeout),
            fallback_on_backend_error: env_flag("GRADER_BACKEND_FALLBACK").unwrap_or(false),
            simulate_latency: env_flag("GRADER_SIMULATE_LATENCY").unwrap_or(false),
        }
    }

    /// Set the distributed cache URL.
    pub fn with_remote_url(mut self, url: impl Into<String>) -> Self {
        self.remote_url = Some(url.into());
        self
    }

    /// Set the in-process cache capacity.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Enable or disable template matches.
    pub fn with_heuristic_templates(mut self, enabled: bool) -> Self {
        self.heuristic_templates = enabled;
        self
    }

    /// Enable or disable degraded scoring.
    pub fn with_fallback(mut self, enabled: bool) -> Self {
        self.fallback_on_backend_error = enabled;
        self
    }

    /// Set the per-category backend timeout (seconds, 0 = none).
    pub fn with_judge_timeout_secs(mut self, secs: u64) -> Self {
        self.judge_timeout_secs = secs;
        self
    }

    pub fn judge_timeout(&self) -> Option<Duration> {
        (self.judge_timeout_secs > 0).then(|| Duration::from_secs(self.judge_timeout_secs))
    }
}
