//! Page acquisition: escalating fetch with challenge detection.
//!
//! Acquisition is an explicit state machine:
//!
//! ```text
//! PlainFetch -> ChallengeCheck -> [HeadlessRender] -> Done
//! ```
//!
//! A failed plain fetch or a detected anti-bot challenge escalates to a
//! headless render. A failed render falls back to the plain HTML already
//! in hand (challenge unresolved) rather than failing the job.

pub mod browser;
pub mod challenge;
pub mod http;

pub use browser::{find_chromium, HeadlessRenderer, RenderOutcome};
pub use challenge::is_challenge_page;
pub use http::HttpFetcher;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::embedded;
use crate::error::{AcquireError, AcquireResult};
use crate::traits::PageSource;
use crate::types::PageContent;

/// Reject anything that is not an absolute http(s) URL before any rung
/// of the ladder runs (a bad URL must not launch a browser).
fn validate_url(url: &str) -> AcquireResult<()> {
    let parsed = url::Url::parse(url).map_err(|_| AcquireError::InvalidUrl {
        url: url.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AcquireError::InvalidUrl {
            url: url.to_string(),
        });
    }
    Ok(())
}

/// States of the acquisition machine.
enum AcquireState {
    /// Initial GET with browser-like headers
    PlainFetch,

    /// Scan the plain body for anti-bot markers
    ChallengeCheck { html: String },

    /// Escalate to a scoped headless session; `fallback` holds the plain
    /// HTML to degrade to if the render itself fails
    HeadlessRender { fallback: Option<String> },

    /// Terminal state
    Done(PageContent),
}

/// Escalating page acquirer.
///
/// Owns one HTTP client; headless sessions are created per acquisition
/// and torn down inside the call.
pub struct PageAcquirer {
    fetcher: HttpFetcher,
    renderer: HeadlessRenderer,
}

impl PageAcquirer {
    /// Build an acquirer from pipeline config.
    pub fn new(config: &PipelineConfig) -> AcquireResult<Self> {
        Ok(Self {
            fetcher: HttpFetcher::new(config)?,
            renderer: HeadlessRenderer::new(config),
        })
    }

    /// Acquire a page, escalating through the state machine as needed.
    pub async fn acquire(&self, url: &str) -> AcquireResult<PageContent> {
        validate_url(url)?;
        let mut state = AcquireState::PlainFetch;

        loop {
            state = match state {
                AcquireState::PlainFetch => match self.fetcher.fetch(url).await {
                    Ok(html) => AcquireState::ChallengeCheck { html },
                    Err(e) => {
                        // A fetch error triggers escalation, not failure.
                        warn!(url = %url, error = %e, "plain fetch failed, escalating to headless render");
                        AcquireState::HeadlessRender { fallback: None }
                    }
                },

                AcquireState::ChallengeCheck { html } => {
                    if is_challenge_page(&html) {
                        info!(url = %url, "challenge markers detected, escalating to headless render");
                        AcquireState::HeadlessRender {
                            fallback: Some(html),
                        }
                    } else {
                        AcquireState::Done(PageContent::plain(html))
                    }
                }

                AcquireState::HeadlessRender { fallback } => match self.render(url).await {
                    Ok(content) => AcquireState::Done(content),
                    Err(e) => match fallback {
                        // Challenge unresolved: proceed with best-available HTML.
                        Some(html) => {
                            warn!(url = %url, error = %e, "headless render failed, falling back to plain HTML");
                            AcquireState::Done(PageContent::plain(html))
                        }
                        None => return Err(e),
                    },
                },

                AcquireState::Done(content) => return Ok(content),
            };
        }
    }

    /// Render directly (used by the sparse-content escalation policy,
    /// which skips the plain rungs).
    pub async fn render(&self, url: &str) -> AcquireResult<PageContent> {
        validate_url(url)?;
        let outcome = self.renderer.render(url).await?;

        // Each captured body goes through the same recursive text
        // extraction used for embedded script data.
        let fragments: Vec<String> = outcome
            .captured_json
            .iter()
            .filter_map(|body| embedded::api_payload_text(body))
            .collect();

        let api_text = if fragments.is_empty() {
            None
        } else {
            Some(fragments.join("\n"))
        };

        Ok(PageContent::rendered(outcome.html, api_text))
    }
}

#[async_trait]
impl PageSource for PageAcquirer {
    async fn acquire(&self, url: &str) -> AcquireResult<PageContent> {
        PageAcquirer::acquire(self, url).await
    }

    async fn render(&self, url: &str) -> AcquireResult<PageContent> {
        PageAcquirer::render(self, url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_http_urls() {
        assert!(matches!(
            validate_url("ftp://example.com/listings"),
            Err(AcquireError::InvalidUrl { .. })
        ));
        assert!(matches!(
            validate_url("propiedades"),
            Err(AcquireError::InvalidUrl { .. })
        ));
        assert!(validate_url("https://example.com/propiedades").is_ok());
    }
}
