//! Pipeline configuration.
//!
//! All knobs are read once (at startup or job start) and injected into
//! the pipeline. Nothing in the pipeline reads the environment mid-run.

use std::time::Duration;

/// Auto-scroll behaviour during headless rendering.
#[derive(Debug, Clone)]
pub struct ScrollConfig {
    /// Pixels scrolled per step
    pub step_px: u32,

    /// Delay between steps
    pub delay: Duration,

    /// Hard cap on scroll iterations
    pub max_iterations: u32,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            step_px: 1200,
            delay: Duration::from_millis(400),
            max_iterations: 12,
        }
    }
}

/// Configuration for the extraction pipeline.
///
/// `Default` matches the self-hosted Ollama deployment the pipeline was
/// built against; `from_env` overrides individual fields.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Model identifier passed to the chat endpoint
    pub model: String,

    /// Base URL of the OpenAI-compatible chat endpoint
    pub model_base_url: String,

    /// Bypass the model entirely and return one synthetic record
    pub mock_mode: bool,

    /// Sampling temperature (low for deterministic extraction)
    pub temperature: f32,

    /// Output token bound per chunk
    pub max_tokens: u32,

    /// Desktop user agent for plain fetches
    pub user_agent: String,

    /// Locale header for plain fetches
    pub accept_language: String,

    /// Plain fetch timeout
    pub request_timeout: Duration,

    /// Headless navigation timeout
    pub navigation_timeout: Duration,

    /// Auto-scroll settings
    pub scroll: ScrollConfig,

    /// Minimum visible text length to stop waiting after render
    pub visible_text_min: usize,

    /// Upper bound on the visible-text wait
    pub visible_text_wait: Duration,

    /// Minimum body length for a captured API response to be retained
    pub min_api_body_len: usize,

    /// Cap on captured API responses per render
    pub max_captured_responses: usize,

    /// Chunk size budget in bytes
    pub chunk_max_bytes: usize,

    /// Lookback window for paragraph-boundary cuts
    pub chunk_lookback: usize,

    /// Compact text below this length (with large raw HTML) triggers escalation
    pub sparse_compact_min: usize,

    /// Raw HTML above this size makes short compact text suspicious
    pub sparse_raw_html_min: usize,

    /// Absolute floor: below this the run ends with zero records
    pub abort_text_min: usize,

    /// Ring buffer capacity per job
    pub ring_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: "llama3.1:8b".to_string(),
            model_base_url: "http://localhost:11434".to_string(),
            mock_mode: false,
            temperature: 0.1,
            max_tokens: 2048,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            accept_language: "es-CL,es;q=0.9,en;q=0.8".to_string(),
            request_timeout: Duration::from_secs(30),
            navigation_timeout: Duration::from_secs(30),
            scroll: ScrollConfig::default(),
            visible_text_min: 200,
            visible_text_wait: Duration::from_secs(3),
            min_api_body_len: 256,
            max_captured_responses: 20,
            chunk_max_bytes: 20_000,
            chunk_lookback: 2_000,
            sparse_compact_min: 500,
            sparse_raw_html_min: 20_000,
            abort_text_min: 100,
            ring_capacity: 1000,
        }
    }
}

impl PipelineConfig {
    /// Build a config from the environment, falling back to defaults.
    ///
    /// Recognized variables: `EXTRACTION_MODEL`, `MODEL_BASE_URL`,
    /// `MOCK_MODE` (`1`/`true`), `RING_CAPACITY`, `CHUNK_MAX_BYTES`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(model) = std::env::var("EXTRACTION_MODEL") {
            config.model = model;
        }
        if let Ok(base) = std::env::var("MODEL_BASE_URL") {
            config.model_base_url = base;
        }
        if let Ok(mock) = std::env::var("MOCK_MODE") {
            config.mock_mode = matches!(mock.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Ok(cap) = std::env::var("RING_CAPACITY") {
            if let Ok(cap) = cap.parse() {
                config.ring_capacity = cap;
            }
        }
        if let Ok(max) = std::env::var("CHUNK_MAX_BYTES") {
            if let Ok(max) = max.parse() {
                config.chunk_max_bytes = max;
            }
        }

        config
    }

    /// Enable mock mode (builder style, for tests).
    pub fn with_mock_mode(mut self, mock: bool) -> Self {
        self.mock_mode = mock;
        self
    }

    /// Override the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}
