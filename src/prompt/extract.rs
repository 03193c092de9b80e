//! Answer extraction from finished transcripts.

use super::transcript::{ChatTemplate, Transcript};

/// Everything strictly after the last occurrence of `anchor` in `text`.
///
/// Falls back to the whole text when the anchor does not occur.
pub fn extract_after<'a>(text: &'a str, anchor: &str) -> &'a str {
    if anchor.is_empty() {
        return text;
    }
    match text.rfind(anchor) {
        Some(idx) => &text[idx + anchor.len()..],
        None => text,
    }
}

/// Render `transcript` and return the answer portion after `anchor`.
pub fn extract(transcript: &Transcript, anchor: &str, chat: &ChatTemplate) -> String {
    let text = transcript.render(chat);
    extract_after(&text, anchor).to_string()
}
