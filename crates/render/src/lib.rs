//! NotePdf Render Library
//!
//! Page bitmaps and the rasterizer contract the viewer core renders through.
//! A PDFium-backed rasterizer is available behind the `pdfium` feature.

pub mod bitmap;
#[cfg(feature = "pdfium")]
pub mod pdf;
pub mod rasterizer;

pub use bitmap::Bitmap;
#[cfg(feature = "pdfium")]
pub use pdf::PdfiumRasterizer;
pub use rasterizer::{RasterError, RasterResult, Rasterizer};
