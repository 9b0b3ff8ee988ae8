//! Extraction prompt for the structured extractor.

/// Schema-constrained instruction set sent with every chunk.
///
/// The fixed field names mirror [`crate::types::Listing`]; the model is
/// told to use `null` rather than invent data, and to normalize prices
/// to digits only.
pub const EXTRACT_PROMPT: &str = r#"You are extracting real-estate listings from page text.

Find EVERY distinct property listing in the text below and return a single JSON object:

{
    "properties": [
        {
            "title": "listing title or headline",
            "price": 123456789,
            "currency": "CLP" | "UF" | "USD" | null,
            "address": "street address" | null,
            "city": "city" | null,
            "region": "region or state" | null,
            "neighborhood": "neighborhood or commune" | null,
            "bedrooms": 3 | null,
            "bathrooms": 2 | null,
            "area_m2": 120.5 | null,
            "property_type": "house" | "apartment" | "land" | "other" | null,
            "description": "short description" | null,
            "source_url": "link to the listing's detail page" | null
        }
    ]
}

Rules:
1. ALWAYS return the JSON object above, even for a single listing or none ("properties": []).
2. Use null for any field not present in the text. NEVER invent data.
3. "price" must be digits only: strip currency symbols, dots, and thousands separators.
4. Numeric fields must be JSON numbers, not strings.
5. Link targets appear in the text as [/path] bracket notation after link text; use them for source_url.
6. Return ONLY the JSON, no explanations and no markdown.

Page text:
{chunk}"#;

/// Fill the chunk into the extraction prompt.
pub fn format_extract_prompt(chunk: &str) -> String {
    EXTRACT_PROMPT.replace("{chunk}", chunk)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_injects_chunk() {
        let prompt = format_extract_prompt("3 dormitorios, UF 4.200");
        assert!(prompt.contains("3 dormitorios, UF 4.200"));
        assert!(!prompt.contains("{chunk}"));
        assert!(prompt.contains("\"properties\""));
    }
}
