//! Page rasterizer contract
//!
//! The viewer core never talks to a PDF library directly. It renders through
//! this trait so the backend can be swapped (PDFium, a test double, ...).

use crate::Bitmap;

/// Errors a rasterizer can report for a single page
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    /// Page index past the end of the document
    #[error("page {index} out of range (document has {count} pages)")]
    PageOutOfRange { index: usize, count: usize },

    /// Failed to open or parse the document
    #[error("document load error: {0}")]
    Load(String),

    /// The backend failed while rendering the page (missing or corrupt page)
    #[error("render error: {0}")]
    Render(String),
}

/// Result type for rasterizer operations
pub type RasterResult<T> = Result<T, RasterError>;

/// Renders document pages to bitmaps
///
/// Implementations are not required to be reentrant: callers serialize every
/// call behind a single lock, which is why `render` takes `&mut self`.
pub trait Rasterizer: Send {
    /// Number of pages in the open document
    fn page_count(&self) -> usize;

    /// Render a page at the given pixel width, preserving the page's aspect ratio
    fn render(&mut self, page_index: usize, target_width: u32) -> RasterResult<Bitmap>;
}

impl<R: Rasterizer + ?Sized> Rasterizer for Box<R> {
    fn page_count(&self) -> usize {
        (**self).page_count()
    }

    fn render(&mut self, page_index: usize, target_width: u32) -> RasterResult<Bitmap> {
        (**self).render(page_index, target_width)
    }
}
