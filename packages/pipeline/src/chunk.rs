//! Token-budgeted text chunking at paragraph boundaries.

/// Split text into chunks bounded by `max_bytes`.
///
/// When a cut would land mid-content, the splitter searches backward
/// (within `lookback` bytes) for a paragraph boundary (double newline)
/// and cuts there instead - provided the resulting chunk stays over half
/// the budget. Otherwise the hard cut stands, adjusted to a UTF-8 char
/// boundary. Chunks preserve input order.
pub fn chunk_text(text: &str, max_bytes: usize, lookback: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if text.len() <= max_bytes {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let remaining = &text[start..];
        if remaining.len() <= max_bytes {
            chunks.push(remaining.to_string());
            break;
        }

        let mut end = max_bytes;
        while !remaining.is_char_boundary(end) {
            end -= 1;
        }

        // Prefer a paragraph boundary inside the lookback window.
        let window_start = end.saturating_sub(lookback);
        if let Some(pos) = remaining[window_start..end].rfind("\n\n") {
            let candidate = window_start + pos;
            if candidate > max_bytes / 2 {
                end = candidate;
            }
        }

        chunks.push(remaining[..end].trim().to_string());
        start += end;

        // Skip the boundary itself.
        while start < text.len() && text.as_bytes()[start] == b'\n' {
            start += 1;
        }
    }

    chunks.retain(|c| !c.is_empty());
    chunks
}
