//! NotePDF viewer core
//!
//! Page rendering cache, background text extraction, cross-page search,
//! annotations with ink undo/redo, and word selection for a document viewer.
//! Rasterization, OCR and persistent storage are external collaborators
//! reached through the [`Rasterizer`], [`OcrService`] and
//! [`AnnotationRepository`] traits.

pub mod annotation;
pub mod annotation_store;
pub mod config;
pub mod error;
pub mod extraction;
pub mod geometry;
pub mod ocr;
pub mod page_store;
pub mod repository;
pub mod scan;
pub mod search;
pub mod selection;
pub mod session;
pub mod word_index;

#[cfg(test)]
pub(crate) mod testing;

pub use annotation::{
    BoxRect, Color, DocumentId, InkStroke, NoteBox, NoteId, NoteText, PageNotes, StrokeId,
    ToolKind, ToolMode,
};
pub use annotation_store::{AnnotationStore, DocumentChanges, InkOperation};
pub use config::{ExtractionConfig, InkConfig, PageStoreConfig, SelectionConfig, ViewerConfig};
pub use error::{
    AnnotationError, AnnotationResult, ConfigError, OcrError, RepositoryError, RepositoryResult,
    SessionError,
};
pub use extraction::ExtractionQueue;
pub use geometry::{NormalizedPoint, NormalizedRect, Point, Rect, Viewport};
pub use ocr::{OcrService, PixelBox, RecognizedElement};
pub use page_store::PageStore;
pub use repository::{
    AnnotationRepository, ChangeEvent, ChangeKind, MemoryRepository, NoteBoxRow, NoteTextRow,
    RepositorySnapshot, StrokeRow,
};
pub use scan::{DocumentScanner, ScanReport};
pub use search::{SearchIndex, SearchMatch};
pub use selection::{merge_highlight_rects, Handle, PageSelection, SelectionEngine, SelectionState};
pub use session::DocumentSession;
pub use word_index::{PageWords, Word, WordIndex};

pub use notepdf_cache::CacheStats;
pub use notepdf_render::{Bitmap, RasterError, RasterResult, Rasterizer};
#[cfg(feature = "pdfium")]
pub use notepdf_render::PdfiumRasterizer;
