// src/config.rs

//! Build configuration
//!
//! Owned by the caller, not the engine: the retry budget and timeout are
//! policy, and different frontends (CLI, tests, an embedding package
//! manager) want different policy. `jobs` is a concurrency hint exported
//! to steps as MAKEFLAGS; the engine itself runs steps strictly
//! sequentially.

use std::path::PathBuf;
use std::time::Duration;

/// Default retry budget per step
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default timeout for a single step (1 hour, builds can be long)
const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(3600);

/// Configuration for one builder instance
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Retry budget per step; 0 means first failure is final
    pub max_attempts: u32,
    /// Time limit for a single command step
    pub step_timeout: Duration,
    /// Parallel-jobs hint handed to build tools via MAKEFLAGS
    pub jobs: u32,
    /// Roots searched for patches and templates, in order
    pub search_roots: Vec<PathBuf>,
    /// Keep the working directory after the build (for debugging)
    pub keep_workdir: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        let jobs = std::thread::available_parallelism()
            .map(|p| p.get() as u32)
            .unwrap_or(4);

        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            step_timeout: DEFAULT_STEP_TIMEOUT,
            jobs,
            search_roots: vec![PathBuf::from(".")],
            keep_workdir: false,
        }
    }
}

impl BuildConfig {
    /// Defaults with environment overrides applied.
    ///
    /// Recognized variables: GALLEY_MAX_ATTEMPTS, GALLEY_STEP_TIMEOUT
    /// (seconds), GALLEY_JOBS. Unparsable values fall back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(n) = read_env_u32("GALLEY_MAX_ATTEMPTS") {
            config.max_attempts = n;
        }
        if let Some(secs) = read_env_u32("GALLEY_STEP_TIMEOUT") {
            config.step_timeout = Duration::from_secs(u64::from(secs));
        }
        if let Some(n) = read_env_u32("GALLEY_JOBS") {
            config.jobs = n.max(1);
        }

        config
    }

    /// Set the retry budget
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the per-step timeout
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    /// Replace the search roots
    pub fn with_search_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.search_roots = roots;
        self
    }
}

fn read_env_u32(key: &str) -> Option<u32> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
