//! Text extraction from rendered filing artifacts.
//!
//! The catalog's rendered artifacts are PDFs; extraction returns numbered
//! pages so downstream chunks can cite where in the document they came from.
//! Non-PDF content (an HTML or plain-text artifact published alongside)
//! passes through as a single page.

use std::path::Path;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_HTML: &str = "text/html";
pub const MIME_TEXT: &str = "text/plain";

/// Extraction error. Fatal for the document being indexed.
#[derive(Debug)]
pub enum ExtractError {
    Pdf(String),
    UnsupportedContentType(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::UnsupportedContentType(ct) => {
                write!(f, "unsupported content-type: {}", ct)
            }
        }
    }
}

impl std::error::Error for ExtractError {}

/// One page of extracted artifact text. Page numbers are 1-based.
#[derive(Debug, Clone)]
pub struct Page {
    pub number: i64,
    pub text: String,
}

/// Guess the content type of an artifact from its URL or filename.
pub fn content_type_for(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    if path.ends_with(".pdf") {
        MIME_PDF
    } else if path.ends_with(".htm") || path.ends_with(".html") {
        MIME_HTML
    } else {
        MIME_TEXT
    }
}

/// Extract the pages of an artifact already streamed to `path`.
pub fn extract_pages(path: &Path, content_type: &str) -> Result<Vec<Page>, ExtractError> {
    let bytes = std::fs::read(path).map_err(|e| ExtractError::Pdf(e.to_string()))?;
    extract_pages_from_bytes(&bytes, content_type)
}

pub fn extract_pages_from_bytes(
    bytes: &[u8],
    content_type: &str,
) -> Result<Vec<Page>, ExtractError> {
    match content_type {
        MIME_PDF => pdf_pages(bytes),
        MIME_HTML | MIME_TEXT => Ok(single_page(String::from_utf8_lossy(bytes).into_owned())),
        other => Err(ExtractError::UnsupportedContentType(other.to_string())),
    }
}

fn pdf_pages(bytes: &[u8]) -> Result<Vec<Page>, ExtractError> {
    let text =
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;

    // The extractor separates pages with form feeds when it can tell them
    // apart; a document with no separator is one page.
    let mut pages: Vec<Page> = text
        .split('\u{c}')
        .enumerate()
        .map(|(i, page_text)| Page {
            number: (i + 1) as i64,
            text: page_text.trim().to_string(),
        })
        .filter(|p| !p.text.is_empty())
        .collect();

    if pages.is_empty() {
        pages = single_page(text.trim().to_string());
    }
    Ok(pages)
}

fn single_page(text: String) -> Vec<Page> {
    vec![Page { number: 1, text }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_from_url() {
        assert_eq!(
            content_type_for("https://x.example.com/a/primary-document.pdf"),
            MIME_PDF
        );
        assert_eq!(
            content_type_for("file:///srv/filings/aapl-20220930.htm"),
            MIME_HTML
        );
        assert_eq!(content_type_for("https://x.example.com/notes.txt"), MIME_TEXT);
        assert_eq!(
            content_type_for("https://x.example.com/doc.pdf?version=2"),
            MIME_PDF
        );
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_pages_from_bytes(b"not a pdf", MIME_PDF).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn text_passes_through_as_one_page() {
        let pages = extract_pages_from_bytes(b"net sales were flat", MIME_TEXT).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].number, 1);
        assert_eq!(pages[0].text, "net sales were flat");
    }

    #[test]
    fn unknown_content_type_is_rejected() {
        let err = extract_pages_from_bytes(b"zip zip", "application/zip").unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedContentType(_)));
    }
}
