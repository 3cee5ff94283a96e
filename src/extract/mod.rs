//! PDF text extraction and cleanup
//!
//! Pulls raw text out of uploaded PDF bytes and normalizes it before
//! chunking. Extraction is a pure transformation of the byte stream;
//! unreadable or encrypted PDFs surface as `Error::Extraction`.

use crate::error::{Error, Result};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// Extract the text content of a PDF, pages in order, joined by newlines.
///
/// The final result is trimmed. Returns `Error::Extraction` for corrupt,
/// password-protected, or otherwise unreadable input.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| Error::Extraction(format!("Error extracting text from PDF: {}", e)))?;
    debug!("Extracted {} characters from PDF", text.len());
    Ok(text.trim().to_string())
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

fn special_chars_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s.,!?;:\-()]").unwrap())
}

/// Clean and normalize extracted text.
///
/// Whitespace runs collapse to a single space first, then characters outside
/// word characters, whitespace, and basic punctuation become spaces. The
/// order matters: replacement spaces are not re-collapsed, matching the
/// chunker's expectations about character offsets.
pub fn clean_text(text: &str) -> String {
    let collapsed = whitespace_re().replace_all(text, " ");
    let stripped = special_chars_re().replace_all(&collapsed, " ");
    stripped.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_collapses_whitespace() {
        assert_eq!(clean_text("hola   mundo\n\n\tbien"), "hola mundo bien");
    }

    #[test]
    fn test_clean_keeps_basic_punctuation() {
        assert_eq!(
            clean_text("¿Qué es un árbol (binario)? ¡Dime!"),
            "Qué es un árbol (binario)?  Dime!"
        );
    }

    #[test]
    fn test_clean_replaces_special_chars_with_space() {
        assert_eq!(clean_text("a€b"), "a b");
        assert_eq!(clean_text("x = y"), "x   y");
    }

    #[test]
    fn test_clean_is_deterministic_and_trims() {
        let input = "  foo…bar  ";
        assert_eq!(clean_text(input), clean_text(input));
        assert_eq!(clean_text(input), "foo bar");
    }

    #[test]
    fn test_clean_empty() {
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text("   \n\t "), "");
    }

    #[test]
    fn test_extract_rejects_garbage_bytes() {
        let err = extract_pdf_text(b"definitely not a pdf").unwrap_err();
        match err {
            Error::Extraction(msg) => assert!(msg.contains("Error extracting text")),
            other => panic!("expected extraction error, got {other:?}"),
        }
    }
}
