//! Page source trait - how the runner obtains page content.

use async_trait::async_trait;

use crate::error::AcquireResult;
use crate::types::PageContent;

/// Supplies page content to the runner.
///
/// The production implementation is the escalating acquirer; tests
/// substitute fixtures so runs stay hermetic.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Acquire a page, escalating as needed.
    async fn acquire(&self, url: &str) -> AcquireResult<PageContent>;

    /// Force a headless render, skipping the plain rungs (used by the
    /// sparse-content escalation).
    async fn render(&self, url: &str) -> AcquireResult<PageContent>;
}
