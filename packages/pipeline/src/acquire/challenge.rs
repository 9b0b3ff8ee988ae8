//! Anti-bot / JS-challenge detection.
//!
//! A plain fetch that lands on a challenge interstitial or a JS-gated
//! shell is not worth reducing; these markers decide whether the
//! acquirer escalates to a headless render.

/// Fixed marker set scanned case-insensitively against the body.
///
/// Covers challenge-verification tokens, forced-reload bootstrap
/// scripts, and "requires JavaScript" banners.
const CHALLENGE_MARKERS: &[&str] = &[
    // Cloudflare-style verification
    "cf-browser-verification",
    "cf_chl_opt",
    "challenge-platform",
    "checking your browser",
    "just a moment",
    // Forced reload / redirect bootstrap
    "window.location.reload(",
    "document.location.reload(",
    // JS-gated shells
    "please enable javascript",
    "requires javascript",
    "you need to enable javascript",
    "noscript-warning",
];

/// Returns `true` if the body looks like an anti-bot or JS-challenge
/// page rather than real content.
pub fn is_challenge_page(html: &str) -> bool {
    let lowered = html.to_lowercase();
    CHALLENGE_MARKERS.iter().any(|m| lowered.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_cloudflare_interstitial() {
        let html = r#"<html><head><title>Just a moment...</title></head>
            <body><div id="cf-browser-verification">Checking your browser</div></body></html>"#;
        assert!(is_challenge_page(html));
    }

    #[test]
    fn test_detects_js_gate() {
        let html = "<html><body><noscript>Please enable JavaScript to view listings</noscript></body></html>";
        assert!(is_challenge_page(html));
    }

    #[test]
    fn test_plain_content_passes() {
        let html = "<html><body><main><h1>3 bedroom house for sale</h1></main></body></html>";
        assert!(!is_challenge_page(html));
    }
}
