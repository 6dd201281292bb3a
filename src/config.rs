use std::time::Duration;

/// Tunables for a pipeline run. Retry counts, backoff and concurrency are
/// deliberate defaults, not inferred behavior; every field can be overridden
/// from the CLI.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Max pages in flight at once.
    pub concurrency: usize,
    /// Minimum pause before each fetch, per worker slot.
    pub rate_limit: Duration,
    /// Request timeout for a single HTTP fetch.
    pub fetch_timeout: Duration,
    /// Extra fetch attempts after the first (linear backoff).
    pub fetch_retries: u32,
    pub fetch_backoff: Duration,
    /// Extra generateContent attempts after the first (exponential backoff).
    pub api_retries: u32,
    pub api_backoff: Duration,
    /// Deadline for the whole fetch + clean + summarize chain of one URL.
    pub url_deadline: Duration,
    pub model: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            rate_limit: Duration::from_millis(500),
            fetch_timeout: Duration::from_millis(15_000),
            fetch_retries: 2,
            fetch_backoff: Duration::from_millis(1_000),
            api_retries: 3,
            api_backoff: Duration::from_millis(2_000),
            url_deadline: Duration::from_secs(120),
            model: crate::gemini::DEFAULT_MODEL.to_string(),
        }
    }
}
