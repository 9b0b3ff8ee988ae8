//! Test fixtures shared by unit and integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::AcquireResult;
use crate::traits::PageSource;
use crate::types::PageContent;

/// Page source that serves a fixed document and counts render calls.
pub struct FixturePageSource {
    html: String,
    rendered_html: Option<String>,
    render_calls: AtomicUsize,
}

impl FixturePageSource {
    /// Serve the same document for plain fetches and renders.
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            rendered_html: None,
            render_calls: AtomicUsize::new(0),
        }
    }

    /// Serve a different document when rendered (simulates a page that
    /// only materializes under a browser).
    pub fn with_rendered(mut self, html: impl Into<String>) -> Self {
        self.rendered_html = Some(html.into());
        self
    }

    /// How many times a render was requested.
    pub fn render_calls(&self) -> usize {
        self.render_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageSource for FixturePageSource {
    async fn acquire(&self, _url: &str) -> AcquireResult<PageContent> {
        Ok(PageContent::plain(self.html.clone()))
    }

    async fn render(&self, _url: &str) -> AcquireResult<PageContent> {
        self.render_calls.fetch_add(1, Ordering::SeqCst);
        let html = self.rendered_html.as_ref().unwrap_or(&self.html).clone();
        Ok(PageContent::rendered(html, None))
    }
}

/// A server-rendered listings page with enough visible text to clear
/// the sparse-content floor.
pub fn listing_page_html() -> String {
    let mut body = String::from("<html><body><main class=\"listing-results\">");
    for i in 0..30 {
        body.push_str(&format!(
            "<article>Casa en venta {i}, 3 dormitorios, 2 ba\u{f1}os, \
             precio $180.000.000, 120 m2, Providencia Santiago</article>"
        ));
    }
    body.push_str("</main></body></html>");
    body
}

/// A client-rendered shell: large markup, almost no visible text.
pub fn sparse_spa_html() -> String {
    let mut html = String::from("<html><body><div class=\"app\">stub</div>");
    html.push_str(&"<!-- filler -->".repeat(2500));
    html.push_str("</body></html>");
    html
}
