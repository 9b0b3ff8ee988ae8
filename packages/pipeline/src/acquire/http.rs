//! Plain HTTP fetching with realistic browser headers.

use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::error::{AcquireError, AcquireResult};

/// Plain HTTP fetcher.
///
/// First rung of the escalation ladder: a single GET with a realistic
/// desktop user agent and locale header. Anything beyond that (JS
/// execution, lazy loading) belongs to the headless renderer.
pub struct HttpFetcher {
    client: reqwest::Client,
    user_agent: String,
    accept_language: String,
}

impl HttpFetcher {
    /// Build a fetcher from pipeline config.
    pub fn new(config: &PipelineConfig) -> AcquireResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AcquireError::Browser(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
            accept_language: config.accept_language.clone(),
        })
    }

    /// Fetch a URL and return the body on a 2xx response.
    pub async fn fetch(&self, url: &str) -> AcquireResult<String> {
        debug!(url = %url, "plain fetch starting");

        let response = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .header("Accept-Language", &self.accept_language)
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "plain fetch failed");
                if e.is_timeout() {
                    AcquireError::Timeout {
                        url: url.to_string(),
                    }
                } else {
                    AcquireError::Http {
                        url: url.to_string(),
                        source: e,
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AcquireError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| AcquireError::Http {
            url: url.to_string(),
            source: e,
        })?;

        debug!(url = %url, bytes = body.len(), "plain fetch completed");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_regex, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_sends_browser_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/listings"))
            .and(header_regex("Accept-Language", "es-CL"))
            .and(header_regex("User-Agent", "Chrome"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&PipelineConfig::default()).unwrap();
        let body = fetcher
            .fetch(&format!("{}/listings", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&PipelineConfig::default()).unwrap();
        let err = fetcher.fetch(&server.uri()).await.unwrap_err();
        assert!(matches!(err, AcquireError::Status { status: 403, .. }));
    }
}
