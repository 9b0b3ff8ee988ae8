//! Transient page content from one acquisition.

/// The result of one page acquisition.
///
/// Lives for a single acquirer invocation; the pipeline derives its
/// reduced and embedded views from it and discards it.
#[derive(Debug, Clone)]
pub struct PageContent {
    /// Raw HTML (plain-fetched or post-render DOM)
    pub html: String,

    /// Concatenated text extracted from intercepted JSON API responses,
    /// present only after a headless render that captured any
    pub api_text: Option<String>,

    /// Whether this content came from a headless render
    pub rendered: bool,
}

impl PageContent {
    /// Plain-fetched content.
    pub fn plain(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            api_text: None,
            rendered: false,
        }
    }

    /// Rendered content with optional captured API text.
    pub fn rendered(html: impl Into<String>, api_text: Option<String>) -> Self {
        Self {
            html: html.into(),
            api_text,
            rendered: true,
        }
    }
}
