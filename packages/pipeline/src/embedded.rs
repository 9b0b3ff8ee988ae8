//! Embedded data recovery from script tags and API payloads.
//!
//! Runs on the *original* HTML - reduction skips script tags, so any
//! framework hydration state, JSON-LD, or inline JSON must be recovered
//! before reduction's view takes over. The same recursive flattening is
//! applied to JSON bodies intercepted during headless rendering.

use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

/// Script `id` attributes that mark framework hydration payloads.
const HYDRATION_IDS: &[&str] = &[
    "__NEXT_DATA__",
    "__NUXT__",
    "__NUXT_DATA__",
    "__INITIAL_STATE__",
    "__APOLLO_STATE__",
    "__REDUX_STATE__",
];

/// Keys that carry framework/build metadata, never listing content.
const SKIP_KEYS: &[&str] = &[
    "buildid",
    "assetprefix",
    "runtimeconfig",
    "scriptloader",
    "chunks",
    "webpack",
    "manifest",
    "locale",
    "locales",
    "defaultlocale",
    "i18n",
    "icons",
    "polyfill",
    "csp",
    "nonce",
    "gip",
    "gssp",
];

/// File extensions and path fragments that identify asset URLs.
const ASSET_MARKERS: &[&str] = &[
    ".js", ".css", ".map", ".png", ".jpg", ".jpeg", ".webp", ".gif", ".svg", ".ico", ".woff",
    ".woff2", ".ttf", ".mp4", ".avif",
];

const ASSET_PATHS: &[&str] = &[
    "/_next/static",
    "/static/chunks",
    "/assets/",
    "/bundles/",
    "cdn.",
    "cloudfront",
];

/// Keywords that justify keeping a raw slice of an unparseable script.
const PRICE_KEYWORDS: &[&str] = &["price", "precio", "valor", "uf", "clp"];

/// Maximum recursion depth through nested objects/arrays.
const MAX_DEPTH: usize = 8;

/// Cap on items taken from any single array.
const MAX_ARRAY_ITEMS: usize = 20;

/// Minimum script size for the raw-slice fallback.
const RAW_FALLBACK_MIN_LEN: usize = 5_000;

/// Length cap on the raw-slice fallback.
const RAW_SLICE_MAX_LEN: usize = 2_000;

/// Kind of embedded payload, used only for fragment labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PayloadKind {
    Hydration,
    JsonLd,
    Json,
    Raw,
}

impl PayloadKind {
    fn label(self) -> &'static str {
        match self {
            Self::Hydration => "hydration",
            Self::JsonLd => "json-ld",
            Self::Json => "json",
            Self::Raw => "raw",
        }
    }
}

/// Whether a scalar string value is an asset URL or inline image data.
fn is_asset_value(value: &str) -> bool {
    let lowered = value.to_lowercase();
    if lowered.starts_with("data:image") {
        return true;
    }
    if ASSET_PATHS.iter().any(|p| lowered.contains(p)) {
        return true;
    }
    // Extension check only for URL-ish values.
    if lowered.starts_with("http") || lowered.starts_with('/') {
        return ASSET_MARKERS.iter().any(|ext| lowered.ends_with(ext));
    }
    false
}

/// Recursively flatten a JSON value into `key: value` lines.
fn flatten(value: &Value, key: &str, depth: usize, out: &mut String) {
    if depth > MAX_DEPTH {
        return;
    }

    match value {
        Value::Object(map) => {
            for (k, v) in map {
                if SKIP_KEYS.contains(&k.to_lowercase().as_str()) {
                    continue;
                }
                flatten(v, k, depth + 1, out);
            }
        }
        Value::Array(items) => {
            for item in items.iter().take(MAX_ARRAY_ITEMS) {
                flatten(item, key, depth + 1, out);
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || is_asset_value(trimmed) {
                return;
            }
            out.push_str(key);
            out.push_str(": ");
            out.push_str(trimmed);
            out.push('\n');
        }
        Value::Number(n) => {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(&n.to_string());
            out.push('\n');
        }
        Value::Bool(b) => {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(if *b { "true" } else { "false" });
            out.push('\n');
        }
        Value::Null => {}
    }
}

/// Flatten one JSON payload (an intercepted API body, typically) into
/// plain text. Returns `None` when it fails to parse or yields nothing.
pub fn api_payload_text(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let mut out = String::new();
    flatten(&value, "", 0, &mut out);
    let out = out.trim().to_string();
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Truncate to a char boundary at or below `max` bytes.
fn bounded_slice(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Wrap a fragment in delimiter markers.
fn wrap_fragment(kind: PayloadKind, content: &str, out: &mut String) {
    out.push_str("----- embedded ");
    out.push_str(kind.label());
    out.push_str(" -----\n");
    out.push_str(content.trim());
    out.push_str("\n----- end -----\n");
}

/// Extract embedded structured data from the original HTML.
///
/// Recognizes framework hydration payloads (by script `id`), JSON-LD,
/// and generic JSON scripts; falls back to a bounded raw slice for
/// large unparseable scripts that mention prices. Fragments are wrapped
/// in delimiter markers and concatenated.
pub fn extract_embedded(html: &str) -> String {
    let document = Html::parse_document(html);
    let selector = Selector::parse("script").expect("static selector");

    let mut out = String::new();

    for script in document.select(&selector) {
        let element = script.value();
        let content: String = script.text().collect();
        let content = content.trim();
        if content.is_empty() {
            continue;
        }

        let id = element.attr("id").unwrap_or_default();
        let script_type = element.attr("type").unwrap_or_default().to_lowercase();

        let kind = if HYDRATION_IDS.iter().any(|h| id.eq_ignore_ascii_case(h)) {
            Some(PayloadKind::Hydration)
        } else if script_type == "application/ld+json" {
            Some(PayloadKind::JsonLd)
        } else if script_type == "application/json" {
            Some(PayloadKind::Json)
        } else {
            None
        };

        match kind {
            Some(kind) => match serde_json::from_str::<Value>(content) {
                Ok(value) => {
                    let mut text = String::new();
                    flatten(&value, "", 0, &mut text);
                    if !text.trim().is_empty() {
                        wrap_fragment(kind, &text, &mut out);
                    }
                }
                Err(e) => {
                    debug!(kind = kind.label(), error = %e, "embedded payload failed to parse");
                }
            },
            None => {
                // Last resort: a big inline script that talks about
                // prices probably carries listing state we cannot parse.
                let lowered = content.to_lowercase();
                if content.len() > RAW_FALLBACK_MIN_LEN
                    && PRICE_KEYWORDS.iter().any(|k| lowered.contains(k))
                {
                    wrap_fragment(
                        PayloadKind::Raw,
                        bounded_slice(content, RAW_SLICE_MAX_LEN),
                        &mut out,
                    );
                }
            }
        }
    }

    out.trim().to_string()
}

/// Combine the reducer's compact text with embedded data.
///
/// When the compact text is sparse the embedded data leads; otherwise it
/// is appended after the compact text.
pub fn merge_with_compact(compact: &str, embedded: &str, sparse_min: usize) -> String {
    if embedded.is_empty() {
        return compact.to_string();
    }
    if compact.len() < sparse_min {
        if compact.is_empty() {
            embedded.to_string()
        } else {
            format!("{embedded}\n\n{compact}")
        }
    } else {
        format!("{compact}\n\n{embedded}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hydration_payload_flattened() {
        let html = r#"<html><body><script id="__NEXT_DATA__" type="application/json">
            {"props":{"pageProps":{"listings":[{"title":"Casa Vitacura","price":250000000}]}},
             "buildId":"abc123","assetPrefix":"/static"}
        </script></body></html>"#;

        let out = extract_embedded(html);
        assert!(out.contains("embedded hydration"));
        assert!(out.contains("title: Casa Vitacura"));
        assert!(out.contains("price: 250000000"));
        assert!(!out.contains("abc123")); // buildId skipped
    }

    #[test]
    fn test_json_ld_recognized() {
        let html = r#"<script type="application/ld+json">
            {"@type":"RealEstateListing","name":"Depto Centro","offers":{"price":"95000000"}}
        </script>"#;

        let out = extract_embedded(html);
        assert!(out.contains("embedded json-ld"));
        assert!(out.contains("name: Depto Centro"));
    }

    #[test]
    fn test_asset_values_skipped() {
        let html = r#"<script type="application/json">
            {"image":"https://cdn.site.cl/photos/1.jpg","hero":"data:image/png;base64,AAAA","title":"Casa"}
        </script>"#;

        let out = extract_embedded(html);
        assert!(out.contains("title: Casa"));
        assert!(!out.contains("cdn.site.cl"));
        assert!(!out.contains("base64"));
    }

    #[test]
    fn test_array_cap_bounds_output() {
        let items: Vec<String> = (0..100).map(|i| format!(r#"{{"n":{i}}}"#)).collect();
        let html = format!(
            r#"<script type="application/json">{{"rows":[{}]}}</script>"#,
            items.join(",")
        );

        let out = extract_embedded(&html);
        assert!(out.contains("n: 0"));
        assert!(out.contains("n: 19"));
        assert!(!out.contains("n: 20"));
    }

    #[test]
    fn test_raw_fallback_for_large_price_script() {
        let filler = "var x = 1; ".repeat(600); // > 5000 bytes
        let html = format!("<script>var precio = 95000000; {filler}</script>");

        let out = extract_embedded(&html);
        assert!(out.contains("embedded raw"));
        // Bounded slice, not the whole script.
        assert!(out.len() < 2_500);
    }

    #[test]
    fn test_small_unparseable_script_ignored() {
        let out = extract_embedded("<script>var precio = 1;</script>");
        assert!(out.is_empty());
    }

    #[test]
    fn test_api_payload_text() {
        let body = r#"{"results":[{"address":"Av. Apoquindo 123","bedrooms":3}]}"#;
        let text = api_payload_text(body).unwrap();
        assert!(text.contains("address: Av. Apoquindo 123"));
        assert!(text.contains("bedrooms: 3"));

        assert!(api_payload_text("not json").is_none());
    }

    #[test]
    fn test_merge_policy() {
        let merged = merge_with_compact("short", "EMBEDDED", 500);
        assert!(merged.starts_with("EMBEDDED"));

        let long_compact = "x".repeat(600);
        let merged = merge_with_compact(&long_compact, "EMBEDDED", 500);
        assert!(merged.starts_with('x'));
        assert!(merged.ends_with("EMBEDDED"));

        assert_eq!(merge_with_compact("text", "", 500), "text");
    }
}
