//! Headless rendering via chromiumoxide.
//!
//! One renderer session is scoped to a single acquisition: launched,
//! driven, and torn down inside [`HeadlessRenderer::render`], success or
//! failure. Sessions are never shared across jobs or reused.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EventResponseReceived, GetResponseBodyParams,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::{PipelineConfig, ScrollConfig};
use crate::error::{AcquireError, AcquireResult};

/// URL fragments whose responses are never captured, even when JSON.
/// Tracking, analytics, and asset/bundle endpoints carry no listing data.
const CAPTURE_DENYLIST: &[&str] = &[
    "google-analytics",
    "googletagmanager",
    "doubleclick",
    "facebook.",
    "hotjar",
    "segment.io",
    "sentry",
    "datadog",
    "amplitude",
    "intercom",
    "recaptcha",
    "/fonts/",
    "/static/",
    "/assets/",
];

/// Path extensions that mark a response as a bundled asset, checked
/// against the URL path only so `listings.json` stays capturable.
const ASSET_EXTENSIONS: &[&str] = &[".js", ".css", ".map", ".woff", ".woff2"];

/// Find a Chromium executable: `CHROME_PATH` first, then the system PATH.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("CHROME_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    None
}

/// Result of one headless render.
#[derive(Debug)]
pub struct RenderOutcome {
    /// Final rendered DOM
    pub html: String,

    /// Raw bodies of intercepted JSON API responses, in arrival order
    pub captured_json: Vec<String>,
}

/// Headless renderer for a single acquisition.
pub struct HeadlessRenderer {
    navigation_timeout: std::time::Duration,
    scroll: ScrollConfig,
    visible_text_min: usize,
    visible_text_wait: std::time::Duration,
    min_api_body_len: usize,
    max_captured_responses: usize,
}

impl HeadlessRenderer {
    /// Build a renderer from pipeline config.
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            navigation_timeout: config.navigation_timeout,
            scroll: config.scroll.clone(),
            visible_text_min: config.visible_text_min,
            visible_text_wait: config.visible_text_wait,
            min_api_body_len: config.min_api_body_len,
            max_captured_responses: config.max_captured_responses,
        }
    }

    /// Render a URL, capturing JSON API responses along the way.
    ///
    /// The browser is always torn down before this returns.
    pub async fn render(&self, url: &str) -> AcquireResult<RenderOutcome> {
        let executable = find_chromium()
            .ok_or_else(|| AcquireError::Browser("no Chromium executable found".to_string()))?;

        let browser_config = BrowserConfig::builder()
            .chrome_executable(executable)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .build()
            .map_err(AcquireError::Browser)?;

        let (mut browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| AcquireError::Browser(format!("launch failed: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let result = self.drive(&browser, url).await;

        let _ = browser.close().await;
        handler_task.abort();

        result
    }

    /// Navigate, scroll, wait, and collect - with the session already up.
    async fn drive(&self, browser: &Browser, url: &str) -> AcquireResult<RenderOutcome> {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| AcquireError::Browser(format!("new page failed: {e}")))?;

        let captured: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let capture_task = self.spawn_capture(&page, Arc::clone(&captured)).await?;

        // Bounded navigation; a timeout is tolerated because some SPAs
        // never reach network idle.
        let navigation = tokio::time::timeout(self.navigation_timeout, async {
            page.goto(url).await?;
            page.wait_for_navigation().await.map(|_| ())
        })
        .await;

        match navigation {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                capture_task.abort();
                return Err(AcquireError::Browser(format!("navigation failed: {e}")));
            }
            Err(_) => {
                warn!(url = %url, "navigation did not quiesce, continuing with partial page");
            }
        }

        self.auto_scroll(&page).await;
        self.wait_for_visible_text(&page).await;

        // Give in-flight body fetches a moment to land before we stop.
        tokio::time::sleep(std::time::Duration::from_millis(250)).await;
        capture_task.abort();

        let html: String = page
            .evaluate("document.documentElement.outerHTML")
            .await
            .map_err(|e| AcquireError::Browser(format!("failed to read DOM: {e}")))?
            .into_value()
            .map_err(|e| AcquireError::Browser(format!("failed to decode DOM: {e:?}")))?;

        let _ = page.close().await;

        let captured_json = {
            let mut guard = captured.lock().await;
            std::mem::take(&mut *guard)
        };

        debug!(
            url = %url,
            html_bytes = html.len(),
            captured = captured_json.len(),
            "headless render completed"
        );

        Ok(RenderOutcome {
            html,
            captured_json,
        })
    }

    /// Spawn the response-interception task for this page.
    async fn spawn_capture(
        &self,
        page: &Page,
        sink: Arc<Mutex<Vec<String>>>,
    ) -> AcquireResult<tokio::task::JoinHandle<()>> {
        let mut events = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(|e| AcquireError::Browser(format!("event listener failed: {e}")))?;

        let capture_page = page.clone();
        let min_len = self.min_api_body_len;
        let max_responses = self.max_captured_responses;

        Ok(tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let response = &event.response;
                if !is_capturable(&response.mime_type, &response.url) {
                    continue;
                }

                let params = GetResponseBodyParams::new(event.request_id.clone());
                let body = match capture_page.execute(params).await {
                    Ok(body) => body,
                    Err(_) => continue, // body already evicted from the CDP buffer
                };

                if body.base64_encoded || body.body.len() < min_len {
                    continue;
                }

                let mut guard = sink.lock().await;
                if guard.len() < max_responses {
                    guard.push(body.body.clone());
                }
            }
        }))
    }

    /// Fixed-step auto-scroll to trigger lazy-loaded content, with early
    /// exit once near the document bottom.
    async fn auto_scroll(&self, page: &Page) {
        let script = format!(
            "(() => {{ window.scrollBy(0, {step}); \
             return (window.scrollY + window.innerHeight) >= (document.body.scrollHeight - {step}); }})()",
            step = self.scroll.step_px
        );

        for _ in 0..self.scroll.max_iterations {
            let at_bottom: bool = match page.evaluate(script.clone()).await {
                Ok(value) => value.into_value().unwrap_or(true),
                Err(_) => true,
            };
            if at_bottom {
                break;
            }
            tokio::time::sleep(self.scroll.delay).await;
        }
    }

    /// Wait (bounded) until visible text exceeds the configured minimum.
    async fn wait_for_visible_text(&self, page: &Page) {
        let deadline = Instant::now() + self.visible_text_wait;

        loop {
            let len: u64 = match page
                .evaluate("document.body ? document.body.innerText.length : 0")
                .await
            {
                Ok(value) => value.into_value().unwrap_or(0),
                Err(_) => 0,
            };

            if len as usize >= self.visible_text_min || Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        }
    }
}

/// Whether an intercepted response is worth keeping: JSON content type,
/// URL not on the asset/tracking denylist.
fn is_capturable(mime_type: &str, url: &str) -> bool {
    if !mime_type.to_lowercase().contains("json") {
        return false;
    }
    let lowered = url.to_lowercase();
    if CAPTURE_DENYLIST.iter().any(|d| lowered.contains(d)) {
        return false;
    }
    let path = lowered.split(['?', '#']).next().unwrap_or(&lowered);
    !ASSET_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capturable_filters_by_mime() {
        assert!(is_capturable(
            "application/json; charset=utf-8",
            "https://site.cl/api/listings?page=1"
        ));
        assert!(!is_capturable("text/html", "https://site.cl/api/listings"));
    }

    #[test]
    fn test_capturable_filters_denylisted_urls() {
        assert!(!is_capturable(
            "application/json",
            "https://www.google-analytics.com/collect"
        ));
        assert!(!is_capturable(
            "application/json",
            "https://cdn.site.cl/bundles/data.json.js"
        ));
    }

    #[test]
    fn test_json_path_extension_is_not_an_asset() {
        assert!(is_capturable(
            "application/json",
            "https://site.cl/api/listings.json?page=2"
        ));
    }
}
