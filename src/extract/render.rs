//! Page rasterization via pdfium.
//!
//! Every page is rendered with its longest edge capped at
//! `extract.render_max_pixels`, then encoded as PNG. pdfium keeps
//! thread-local state, so each call binds the library on the calling thread;
//! callers run this under `spawn_blocking`.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::ImageFormat;
use pdfium_render::prelude::*;
use tracing::debug;

use super::{ExtractError, PageRasterizer, RenderedPage};

/// Renders PDF pages with a dynamically bound pdfium library.
pub struct PdfiumRasterizer {
    lib_path: Option<PathBuf>,
    max_pixels: u32,
}

impl PdfiumRasterizer {
    /// Resolve the library location and check that it binds.
    ///
    /// Lookup order: `lib_path` (a directory or the library file itself),
    /// `PDFIUM_LIB_PATH`, then the system library search path.
    pub fn new(lib_path: Option<&Path>, max_pixels: u32) -> Result<Self, ExtractError> {
        let lib_path = lib_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));
        let rasterizer = Self {
            lib_path,
            max_pixels,
        };
        rasterizer.bind()?;
        Ok(rasterizer)
    }

    fn bind(&self) -> Result<Pdfium, ExtractError> {
        let bindings = match &self.lib_path {
            Some(path) if path.is_dir() => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(path))
            }
            Some(path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_system_library(),
        };
        bindings
            .map(Pdfium::new)
            .map_err(|e| ExtractError::PdfiumUnavailable(e.to_string()))
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn render_pages(&self, path: &Path) -> Result<Vec<RenderedPage>, ExtractError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| ExtractError::Pdf {
                path: path.to_path_buf(),
                detail: format!("{:?}", e),
            })?;

        let render_config = PdfRenderConfig::new()
            .set_target_width(self.max_pixels as i32)
            .set_maximum_height(self.max_pixels as i32);

        let mut pages = Vec::new();
        for (idx, page) in document.pages().iter().enumerate() {
            let page_no = idx as u32 + 1;
            let image = page
                .render_with_config(&render_config)
                .map_err(|e| ExtractError::Render {
                    path: path.to_path_buf(),
                    page: page_no,
                    detail: format!("{:?}", e),
                })?
                .as_image();

            let mut png = Vec::new();
            image
                .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
                .map_err(|e| ExtractError::Render {
                    path: path.to_path_buf(),
                    page: page_no,
                    detail: e.to_string(),
                })?;

            debug!(
                page = page_no,
                width = image.width(),
                height = image.height(),
                "rendered page"
            );
            pages.push(RenderedPage { page: page_no, png });
        }

        Ok(pages)
    }
}
