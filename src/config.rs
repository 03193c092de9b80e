//! Runtime configuration.
//!
//! Everything here is built once from the command line (with environment
//! fallbacks) and passed down explicitly.

use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

/// Default SGLang runtime port.
pub const DEFAULT_PORT: u16 = 30000;

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default number of in-flight pipelines in batch mode.
pub const DEFAULT_CONCURRENCY: usize = 64;

/// Files larger than this are skipped (1MB).
pub const DEFAULT_MAX_FILE_BYTES: u64 = 1024 * 1024;

/// Retry schedule: exponential backoff from `base_delay`, plus jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    /// Jitter is at most `delay / jitter_divisor`.
    pub jitter_divisor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            jitter_divisor: 4, // + up to 25% jitter
        }
    }
}

impl RetryPolicy {
    #[cfg(test)]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_retries + 1
    }

    /// Backoff before retry number `attempt` (0-based), without jitter.
    pub fn base_delay_for(&self, attempt: usize) -> Duration {
        let multiplier = 1u32.checked_shl(attempt as u32).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(multiplier)
    }
}

/// Where the generation backend lives and how to talk to it.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: Url,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl BackendConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }

    /// `http://localhost:<port>`
    pub fn for_local_port(port: u16) -> Result<Self> {
        let url = format!("http://localhost:{}", port);
        Ok(Self::new(Url::parse(&url).with_context(|| {
            format!("Invalid backend URL: {}", url)
        })?))
    }

    /// Explicit URL wins over the port.
    pub fn resolve(backend_url: Option<&str>, port: u16) -> Result<Self> {
        match backend_url {
            Some(raw) => {
                let url = Url::parse(raw).with_context(|| format!("Invalid backend URL: {}", raw))?;
                Ok(Self::new(url))
            }
            None => Self::for_local_port(port),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// How files are analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisMode {
    /// One file at a time, one backend request at a time.
    Single,
    /// Each analysis runs as one concurrent batch across all files.
    #[default]
    Batch,
}

/// Knobs for the analysis pipeline.
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub mode: AnalysisMode,
    pub concurrency: usize,
    pub temperature: f32,
    pub max_file_bytes: u64,
    pub respect_ignore: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            mode: AnalysisMode::default(),
            concurrency: DEFAULT_CONCURRENCY,
            temperature: 0.0,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            respect_ignore: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_prefers_explicit_url() {
        let config = BackendConfig::resolve(Some("http://gpu-box:8000/"), 1234).unwrap();
        assert_eq!(config.base_url.as_str(), "http://gpu-box:8000/");

        let config = BackendConfig::resolve(None, 30001).unwrap();
        assert_eq!(config.base_url.as_str(), "http://localhost:30001/");
    }

    #[test]
    fn test_resolve_rejects_garbage() {
        assert!(BackendConfig::resolve(Some("not a url"), 1).is_err());
    }

    #[test]
    fn test_retry_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.base_delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.base_delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.base_delay_for(3), Duration::from_secs(8));
        // Overflowing shifts saturate instead of panicking.
        assert!(policy.base_delay_for(200) >= Duration::from_secs(8));
    }
}
