//! Paragraph-boundary chunker over extracted artifact pages.
//!
//! Splits page text into [`Chunk`]s that respect a configurable `max_tokens`
//! limit, preferring paragraph boundaries (`\n\n`). Chunks never span pages,
//! so each one can cite the page it came from; indices are contiguous across
//! the whole document. Every chunk carries its owning document id and a
//! SHA-256 hash of its text.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::extract::Page;
use crate::models::Chunk;

/// Approximate chars-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

/// Chunk a document's extracted pages. Returns at least one chunk, with
/// contiguous indices starting at 0.
pub fn chunk_pages(document_id: &str, pages: &[Page], max_tokens: usize) -> Vec<Chunk> {
    let max_chars = max_tokens * CHARS_PER_TOKEN;
    let mut chunks = Vec::new();

    for page in pages {
        chunk_page(document_id, page, max_chars, &mut chunks);
    }

    if chunks.is_empty() {
        let page = pages.first().map(|p| p.number).unwrap_or(1);
        chunks.push(make_chunk(document_id, 0, page, ""));
    }

    chunks
}

fn chunk_page(document_id: &str, page: &Page, max_chars: usize, out: &mut Vec<Chunk>) {
    let mut buf = String::new();

    for para in page.text.split("\n\n") {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }

        let merged_len = if buf.is_empty() {
            para.len()
        } else {
            buf.len() + 2 + para.len()
        };

        if merged_len > max_chars && !buf.is_empty() {
            flush(document_id, page.number, &mut buf, out);
        }

        if para.len() > max_chars {
            flush(document_id, page.number, &mut buf, out);
            hard_split(document_id, page.number, para, max_chars, out);
        } else {
            if !buf.is_empty() {
                buf.push_str("\n\n");
            }
            buf.push_str(para);
        }
    }

    flush(document_id, page.number, &mut buf, out);
}

/// Split a paragraph that exceeds the limit on its own, preferring newline
/// or space boundaries over mid-word cuts.
fn hard_split(document_id: &str, page: i64, text: &str, max_chars: usize, out: &mut Vec<Chunk>) {
    let mut remaining = text;
    while !remaining.is_empty() {
        let limit = remaining.len().min(max_chars);
        let cut = if limit < remaining.len() {
            remaining[..limit]
                .rfind('\n')
                .or_else(|| remaining[..limit].rfind(' '))
                .map(|pos| pos + 1)
                .unwrap_or(limit)
        } else {
            limit
        };
        let piece = remaining[..cut].trim();
        if !piece.is_empty() {
            let index = out.len() as i64;
            out.push(make_chunk(document_id, index, page, piece));
        }
        remaining = &remaining[cut..];
    }
}

fn flush(document_id: &str, page: i64, buf: &mut String, out: &mut Vec<Chunk>) {
    if buf.is_empty() {
        return;
    }
    let index = out.len() as i64;
    out.push(make_chunk(document_id, index, page, buf));
    buf.clear();
}

fn make_chunk(document_id: &str, index: i64, page: i64, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        chunk_index: index,
        page,
        text: text.to_string(),
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(number: i64, text: &str) -> Page {
        Page {
            number,
            text: text.to_string(),
        }
    }

    #[test]
    fn small_page_is_one_chunk() {
        let chunks = chunk_pages("doc1", &[page(1, "Net sales were flat.")], 512);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].page, 1);
        assert_eq!(chunks[0].document_id, "doc1");
    }

    #[test]
    fn empty_document_still_yields_a_chunk() {
        let chunks = chunk_pages("doc1", &[], 512);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "");
    }

    #[test]
    fn chunks_never_span_pages() {
        let pages = [page(1, "First page."), page(2, "Second page.")];
        let chunks = chunk_pages("doc1", &pages, 512);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].page, 1);
        assert_eq!(chunks[1].page, 2);
    }

    #[test]
    fn indices_contiguous_across_pages() {
        let long: String = (0..30)
            .map(|i| format!("Paragraph number {}.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let pages = [page(1, &long), page(2, &long)];
        let chunks = chunk_pages("doc1", &pages, 10);
        assert!(chunks.len() > 2);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64, "index mismatch at {}", i);
        }
    }

    #[test]
    fn oversized_paragraph_is_hard_split() {
        let para = "word ".repeat(200);
        let chunks = chunk_pages("doc1", &[page(1, &para)], 10);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.len() <= 40 + 5);
        }
    }

    #[test]
    fn hashes_are_deterministic() {
        let pages = [page(1, "Alpha\n\nBeta\n\nGamma")];
        let a = chunk_pages("doc1", &pages, 5);
        let b = chunk_pages("doc1", &pages, 5);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.text, y.text);
            assert_eq!(x.hash, y.hash);
            assert_eq!(x.page, y.page);
        }
    }
}
