//! Fenced code block extraction from free-form model output.
//!
//! A well-formed response contains exactly one fenced block. Anything else
//! is a [`ParseError`] so the caller can regenerate instead of panicking on
//! a malformed response.

use thiserror::Error;

const FENCE: &str = "```";

/// Language tags the service is known to emit on the opening fence.
const LANGUAGE_TAGS: &[&str] = &["typescript", "ts", "tsx", "javascript", "js"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("response contains no fenced code block")]
    MissingFence,
    #[error("response contains an unterminated fenced code block")]
    UnterminatedFence,
    #[error("response contains {0} fence delimiters, expected exactly two")]
    AmbiguousFences(usize),
}

/// Extract the interior of the single fenced block in `response`.
///
/// The segment between the first pair of fence delimiters is returned,
/// trimmed, with a leading language-tag token stripped if present.
pub fn extract_fenced_block(response: &str) -> Result<String, ParseError> {
    let fences = response.matches(FENCE).count();
    match fences {
        0 => return Err(ParseError::MissingFence),
        1 => return Err(ParseError::UnterminatedFence),
        2 => {}
        n => return Err(ParseError::AmbiguousFences(n)),
    }

    let mut parts = response.splitn(3, FENCE);
    // splitn(3) yields before/inside/after; fence count was checked above.
    let _before = parts.next();
    let inside = parts.next().ok_or(ParseError::MissingFence)?;
    Ok(strip_language_tag(inside).trim().to_string())
}

/// Drop a leading language-tag token (e.g. `typescript`) from block interior.
fn strip_language_tag(block: &str) -> &str {
    let trimmed = block.trim_start_matches([' ', '\t']);
    for tag in LANGUAGE_TAGS {
        if let Some(rest) = trimmed.strip_prefix(tag) {
            // Only treat it as a tag when it ends the first line.
            if rest.starts_with('\n') || rest.starts_with("\r\n") {
                return rest;
            }
        }
    }
    block
}
