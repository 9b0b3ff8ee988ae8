//! Model response parsing with one-shot repair of truncated output.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{ExtractError, ExtractResult};
use crate::types::Listing;

/// Raw listing as the model emits it - lenient about numeric fields
/// arriving as strings despite the prompt rules.
#[derive(Debug, Deserialize)]
struct RawListing {
    title: Option<String>,
    #[serde(default)]
    price: Option<Value>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    neighborhood: Option<String>,
    #[serde(default)]
    bedrooms: Option<Value>,
    #[serde(default)]
    bathrooms: Option<Value>,
    #[serde(default)]
    area_m2: Option<Value>,
    #[serde(default)]
    property_type: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    source_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExtractionResponse {
    #[serde(default)]
    properties: Vec<RawListing>,
}

/// Digits-only price normalization: "$ 180.000.000" -> 180000000.
fn normalize_price(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        }
        _ => None,
    }
}

fn normalize_count(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().map(|v| v as u32),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn normalize_area(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s
            .trim()
            .trim_end_matches("m²")
            .trim_end_matches("m2")
            .trim()
            .replace(',', ".")
            .parse()
            .ok(),
        _ => None,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl RawListing {
    fn into_listing(self) -> Option<Listing> {
        let title = non_empty(self.title)?;

        Some(Listing {
            title,
            price: self.price.as_ref().and_then(normalize_price),
            currency: non_empty(self.currency),
            address: non_empty(self.address),
            city: non_empty(self.city),
            region: non_empty(self.region),
            neighborhood: non_empty(self.neighborhood),
            bedrooms: self.bedrooms.as_ref().and_then(normalize_count),
            bathrooms: self.bathrooms.as_ref().and_then(normalize_count),
            area_m2: self.area_m2.as_ref().and_then(normalize_area),
            property_type: non_empty(self.property_type),
            description: non_empty(self.description),
            source_url: non_empty(self.source_url),
        })
    }
}

/// Strip markdown code fences and leading prose around the JSON block.
fn isolate_json(text: &str) -> &str {
    let mut text = text.trim();

    if let Some(rest) = text.strip_prefix("```") {
        // Drop the fence line ("```json" or bare "```").
        text = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
        if let Some(stripped) = text.trim_end().strip_suffix("```") {
            text = stripped;
        }
    }

    // Some models preface the JSON with a sentence.
    let start = text.find(['{', '[']).unwrap_or(0);
    text[start..].trim()
}

fn parse_once(json: &str) -> Result<Vec<RawListing>, serde_json::Error> {
    if json.trim_start().starts_with('[') {
        serde_json::from_str::<Vec<RawListing>>(json)
    } else {
        serde_json::from_str::<ExtractionResponse>(json).map(|r| r.properties)
    }
}

/// Close-sequence needed to complete a truncated JSON prefix, or `None`
/// if the prefix ends inside a string.
fn closing_sequence(prefix: &str) -> Option<String> {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in prefix.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.pop() != Some(c) {
                    return None; // mismatched - not repairable
                }
            }
            _ => {}
        }
    }

    if in_string {
        return None;
    }
    Some(stack.into_iter().rev().collect())
}

/// One repair attempt for truncated model output: trim back to the last
/// syntactically complete array element and re-close the structure.
fn repair_truncated(json: &str) -> Option<String> {
    // Walk '}' positions from the end; the first prefix that closes
    // cleanly and parses is the repaired document.
    for (idx, _) in json.char_indices().rev().filter(|(_, c)| *c == '}').take(50) {
        let prefix = &json[..=idx];
        let Some(closers) = closing_sequence(prefix) else {
            continue;
        };
        let candidate = format!("{prefix}{closers}");
        if serde_json::from_str::<Value>(&candidate).is_ok() {
            return Some(candidate);
        }
    }
    None
}

/// Parse a model response into listings.
///
/// Fences are stripped, the JSON block isolated, and on a parse failure
/// a single repair attempt is made before giving up. Listings without a
/// title are dropped.
pub fn parse_response(text: &str) -> ExtractResult<Vec<Listing>> {
    let json = isolate_json(text);

    let raw = match parse_once(json) {
        Ok(raw) => raw,
        Err(first_err) => {
            debug!(error = %first_err, "model output failed to parse, attempting repair");
            let repaired = repair_truncated(json).ok_or(ExtractError::MalformedOutput(first_err))?;
            parse_once(&repaired)?
        }
    };

    Ok(raw.into_iter().filter_map(RawListing::into_listing).collect())
}
