//! PDFium-backed rasterizer
//!
//! Available with the `pdfium` feature. The PDFium shared library is looked up
//! next to the executable, then in the working directory, then on the system
//! library path.

use crate::{Bitmap, RasterError, RasterResult, Rasterizer};
use pdfium_render::prelude::*;
use std::path::Path;

/// Rasterizer over a single PDF document
pub struct PdfiumRasterizer {
    /// The loaded PDF document (owns the Pdfium instance internally)
    document: PdfDocument<'static>,
}

impl PdfiumRasterizer {
    fn init_pdfium() -> RasterResult<Pdfium> {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()));

        if let Some(ref dir) = exe_dir {
            if let Ok(bindings) =
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
            {
                return Ok(Pdfium::new(bindings));
            }
        }

        Ok(Pdfium::new(
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library())
                .map_err(|e| RasterError::Load(e.to_string()))?,
        ))
    }

    /// Open a PDF file for rendering
    pub fn open<P: AsRef<Path>>(path: P) -> RasterResult<Self> {
        let pdfium = Box::leak(Box::new(Self::init_pdfium()?));

        let document = pdfium
            .load_pdf_from_file(path.as_ref(), None)
            .map_err(|e| RasterError::Load(e.to_string()))?;

        tracing::info!(
            path = %path.as_ref().display(),
            pages = document.pages().len(),
            "opened PDF"
        );
        Ok(Self { document })
    }

    /// Open a PDF held in memory
    pub fn from_bytes(data: Vec<u8>) -> RasterResult<Self> {
        let pdfium = Box::leak(Box::new(Self::init_pdfium()?));
        let data_static: &'static [u8] = Box::leak(data.into_boxed_slice());

        let document = pdfium
            .load_pdf_from_byte_slice(data_static, None)
            .map_err(|e| RasterError::Load(e.to_string()))?;

        Ok(Self { document })
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn render(&mut self, page_index: usize, target_width: u32) -> RasterResult<Bitmap> {
        let count = self.page_count();
        let index = u16::try_from(page_index)
            .ok()
            .filter(|&i| (i as usize) < count)
            .ok_or(RasterError::PageOutOfRange {
                index: page_index,
                count,
            })?;

        let page = self
            .document
            .pages()
            .get(index)
            .map_err(|e| RasterError::Render(e.to_string()))?;

        let page_width = page.width().value.max(1.0);
        let page_height = page.height().value;
        let target_height =
            ((target_width as f32) * page_height / page_width).round().max(1.0) as u32;

        let config = PdfRenderConfig::new()
            .set_target_width(target_width as i32)
            .set_target_height(target_height as i32);

        let rendered = page
            .render_with_config(&config)
            .map_err(|e| RasterError::Render(e.to_string()))?;

        Ok(Bitmap::new(
            target_width,
            target_height,
            rendered.as_rgba_bytes().to_vec(),
        ))
    }
}
