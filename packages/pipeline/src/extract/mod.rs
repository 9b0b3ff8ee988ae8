//! Structured extraction: prompt -> model -> parse/repair.

pub mod model;
pub mod parse;
pub mod prompt;

pub use model::{ChatModel, ExtractionModel, MockModel};
pub use parse::parse_response;
pub use prompt::{format_extract_prompt, EXTRACT_PROMPT};

use crate::error::ExtractResult;
use crate::types::Listing;

/// Extract listings from one chunk of compact text.
///
/// Chunk-level failures (invocation or unrepairable output) surface as
/// errors here; the runner logs them and continues with the next chunk.
pub async fn extract_chunk(
    model: &dyn ExtractionModel,
    chunk: &str,
) -> ExtractResult<Vec<Listing>> {
    let prompt = format_extract_prompt(chunk);
    let response = model.complete(&prompt).await?;
    parse_response(&response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_extract_chunk_with_mock_model() {
        let model = MockModel::new();
        let listings = extract_chunk(&model, "any chunk text").await.unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].title, "Synthetic Test Property");
        assert_eq!(listings[0].price, Some(100_000_000));
    }
}
