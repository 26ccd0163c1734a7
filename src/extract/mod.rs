//! Content extraction: one PDF in, an ordered stream of typed records out.
//!
//! Three passes run over each document, one per content kind:
//!
//! | Kind | Source | Module |
//! |------|--------|--------|
//! | text | per-page text from `pdf-extract` | [`text`] |
//! | table | layout-based detection over page text | [`table`] |
//! | image | full-page raster via pdfium, PNG-encoded | [`render`] |
//!
//! The passes are merged and stably sorted by page, with ties broken by the
//! configured kind order, before source ids are assigned. Any failure in a
//! pass fails the whole document with an [`ExtractError`]; record-level
//! problems (blank pages, malformed table rows) only drop that record.

pub mod render;
pub mod table;
pub mod text;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use docsift_core::models::{assign_source_ids, ContentKind, ContentRecord, ImageEncoding, Payload};

use crate::config::Config;

/// Document-level extraction failure.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("PDF '{path}' could not be parsed: {detail}")]
    Pdf { path: PathBuf, detail: String },

    #[error("failed to rasterize page {page} of '{path}': {detail}")]
    Render {
        path: PathBuf,
        page: u32,
        detail: String,
    },

    #[error("pdfium library unavailable: {0}\nSet extract.pdfium_lib_path or PDFIUM_LIB_PATH, or disable extract.images.")]
    PdfiumUnavailable(String),

    #[error("failed to write page image '{path}': {source}")]
    WriteImage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Yields the text of every page, index 0 = page 1.
pub trait PageReader: Send + Sync {
    fn page_texts(&self, path: &Path) -> Result<Vec<String>, ExtractError>;
}

/// A rendered page, PNG-encoded.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// 1-based.
    pub page: u32,
    pub png: Vec<u8>,
}

/// Rasterizes every page of a document.
pub trait PageRasterizer: Send + Sync {
    fn render_pages(&self, path: &Path) -> Result<Vec<RenderedPage>, ExtractError>;
}

/// Output of extracting one document.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Document identifier used in source ids: the path relative to the
    /// input root, `/`-separated.
    pub document: String,
    /// `document` without its extension; names the artifacts.
    pub stem: String,
    pub page_count: usize,
    pub records: Vec<ContentRecord>,
    /// Malformed table rows skipped during extraction.
    pub dropped: usize,
    pub saved_images: Vec<PathBuf>,
}

/// Path of the persisted PNG for one page.
pub fn page_image_path(images_dir: &Path, document_stem: &str, page: u32) -> PathBuf {
    images_dir.join(format!("{}_page_{}.png", document_stem, page))
}

/// Identifier of the document at `path`: its path relative to `root` with
/// `/` separators, or the bare file name when there is no root or the path
/// lies outside it.
pub fn document_id(path: &Path, root: Option<&Path>) -> String {
    let relative = root
        .and_then(|r| path.strip_prefix(r).ok())
        .filter(|rel| rel.components().next().is_some());
    match relative {
        Some(rel) => rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/"),
        None => path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string()),
    }
}

/// Artifact stem for a document id: the id minus its final extension.
pub fn document_stem(document: &str) -> String {
    match document.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !stem.ends_with('/') && !ext.contains('/') => {
            stem.to_string()
        }
        _ => document.to_string(),
    }
}

/// Extracts content records from PDF files.
#[derive(Clone)]
pub struct Extractor {
    reader: Arc<dyn PageReader>,
    rasterizer: Option<Arc<dyn PageRasterizer>>,
    tables: bool,
    kind_order: Vec<ContentKind>,
    images_dir: Option<PathBuf>,
    input_root: Option<PathBuf>,
}

impl Extractor {
    pub fn new(reader: Arc<dyn PageReader>, rasterizer: Option<Arc<dyn PageRasterizer>>) -> Self {
        Self {
            reader,
            rasterizer,
            tables: true,
            kind_order: ContentKind::ALL.to_vec(),
            images_dir: None,
            input_root: None,
        }
    }

    /// Build the production extractor: pdf-extract text and, when image
    /// extraction is enabled, a pdfium rasterizer. A missing pdfium library is
    /// a startup error.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let rasterizer: Option<Arc<dyn PageRasterizer>> = if config.extract.images {
            Some(Arc::new(render::PdfiumRasterizer::new(
                config.extract.pdfium_lib_path.as_deref(),
                config.extract.render_max_pixels,
            )?))
        } else {
            None
        };

        let images_dir = if config.output.save_images {
            Some(config.output.images_dir.clone())
        } else {
            None
        };

        Ok(Self::new(Arc::new(text::PdfTextReader), rasterizer)
            .with_tables(config.extract.tables)
            .with_kind_order(config.extract.kind_order.clone())
            .with_images_dir(images_dir)
            .with_input_root(Some(config.input.dir.clone())))
    }

    pub fn with_tables(mut self, enabled: bool) -> Self {
        self.tables = enabled;
        self
    }

    pub fn with_kind_order(mut self, order: Vec<ContentKind>) -> Self {
        self.kind_order = order;
        self
    }

    pub fn with_images_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.images_dir = dir;
        self
    }

    /// Directory that document ids are taken relative to.
    pub fn with_input_root(mut self, root: Option<PathBuf>) -> Self {
        self.input_root = root;
        self
    }

    fn kind_rank(&self, kind: ContentKind) -> usize {
        self.kind_order
            .iter()
            .position(|k| *k == kind)
            .unwrap_or(self.kind_order.len())
    }

    /// Extract one document. Blocking; run under `spawn_blocking`.
    pub fn extract(&self, path: &Path) -> Result<Extraction, ExtractError> {
        let document = document_id(path, self.input_root.as_deref());
        let stem = document_stem(&document);
        let page_texts = self.reader.page_texts(path)?;
        let page_count = page_texts.len();

        let mut items: Vec<(u32, Payload)> = Vec::new();
        let mut dropped = 0;

        for (idx, raw) in page_texts.iter().enumerate() {
            let page = idx as u32 + 1;

            match text::page_text(raw) {
                Some(t) => items.push((page, Payload::Text(t))),
                None => debug!(document = %document, page, "skipping page with no text"),
            }

            if self.tables {
                for detected in table::detect_tables(raw) {
                    if detected.dropped_rows > 0 {
                        warn!(
                            document = %document,
                            page,
                            dropped = detected.dropped_rows,
                            "dropped malformed table rows"
                        );
                        dropped += detected.dropped_rows;
                    }
                    items.push((page, Payload::Table(detected.rows)));
                }
            }
        }

        let mut saved_images = Vec::new();
        if let Some(rasterizer) = &self.rasterizer {
            for rendered in rasterizer.render_pages(path)? {
                if let Some(dir) = &self.images_dir {
                    let out = page_image_path(dir, &stem, rendered.page);
                    out.parent()
                        .map_or(Ok(()), std::fs::create_dir_all)
                        .and_then(|_| std::fs::write(&out, &rendered.png))
                        .map_err(|source| ExtractError::WriteImage {
                            path: out.clone(),
                            source,
                        })?;
                    saved_images.push(out);
                }
                items.push((
                    rendered.page,
                    Payload::Image {
                        data: rendered.png,
                        encoding: ImageEncoding::Png,
                    },
                ));
            }
        }

        items.sort_by_key(|(page, payload)| (*page, self.kind_rank(payload.kind())));

        Ok(Extraction {
            records: assign_source_ids(&document, items),
            document,
            stem,
            page_count,
            dropped,
            saved_images,
        })
    }
}
