//! Per-page text via `pdf-extract`.

use std::path::Path;

use super::{ExtractError, PageReader};

/// Reads page text with `pdf_extract::extract_text_from_mem_by_pages`.
pub struct PdfTextReader;

impl PageReader for PdfTextReader {
    fn page_texts(&self, path: &Path) -> Result<Vec<String>, ExtractError> {
        let bytes = std::fs::read(path).map_err(|source| ExtractError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        pdf_extract::extract_text_from_mem_by_pages(&bytes).map_err(|e| ExtractError::Pdf {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }
}

/// Page text with surrounding whitespace removed, or `None` for a blank page.
pub fn page_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
