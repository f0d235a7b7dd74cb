//! In-test collaborator fakes

use crate::annotation::{DocumentId, NoteId, StrokeId};
use crate::error::{OcrError, RepositoryError, RepositoryResult};
use crate::ocr::{OcrService, PixelBox, RecognizedElement};
use crate::repository::{
    AnnotationRepository, ChangeEvent, MemoryRepository, NoteBoxRow, NoteTextRow, StrokeRow,
};
use notepdf_render::{Bitmap, RasterError, RasterResult, Rasterizer};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Default)]
struct RasterState {
    renders: usize,
    in_flight: usize,
    max_in_flight: usize,
    failing: HashSet<usize>,
}

/// Rasterizer that stamps the page index into the first pixel and counts renders
#[derive(Clone)]
pub struct FakeRasterizer {
    pages: usize,
    state: Arc<Mutex<RasterState>>,
}

impl FakeRasterizer {
    pub fn new(pages: usize) -> Self {
        Self {
            pages,
            state: Arc::default(),
        }
    }

    pub fn render_count(&self) -> usize {
        self.state.lock().unwrap().renders
    }

    pub fn max_concurrent_renders(&self) -> usize {
        self.state.lock().unwrap().max_in_flight
    }

    pub fn fail_page(&self, page: usize) {
        self.state.lock().unwrap().failing.insert(page);
    }

    pub fn heal_page(&self, page: usize) {
        self.state.lock().unwrap().failing.remove(&page);
    }

    /// Page index a bitmap from this rasterizer was rendered for
    pub fn page_of(bitmap: &Bitmap) -> usize {
        bitmap.pixels()[0] as usize
    }
}

impl Rasterizer for FakeRasterizer {
    fn page_count(&self) -> usize {
        self.pages
    }

    fn render(&mut self, page_index: usize, target_width: u32) -> RasterResult<Bitmap> {
        if page_index >= self.pages {
            return Err(RasterError::PageOutOfRange {
                index: page_index,
                count: self.pages,
            });
        }
        {
            let mut state = self.state.lock().unwrap();
            state.renders += 1;
            if state.failing.contains(&page_index) {
                return Err(RasterError::Render(format!("page {page_index} is corrupt")));
            }
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
        }

        thread::sleep(Duration::from_millis(1));

        let mut bitmap = Bitmap::blank(target_width.max(1), target_width.max(1));
        let mut pixels = bitmap.pixels().to_vec();
        pixels[0] = page_index as u8;
        bitmap = Bitmap::new(bitmap.width(), bitmap.height(), pixels);

        self.state.lock().unwrap().in_flight -= 1;
        Ok(bitmap)
    }
}

/// OCR service answering from a per-page script and recording call order
#[derive(Clone, Default)]
pub struct ScriptedOcr {
    pages: Arc<Mutex<HashMap<usize, Vec<&'static str>>>>,
    failing: Arc<Mutex<HashSet<usize>>>,
    calls: Arc<Mutex<Vec<usize>>>,
}

impl ScriptedOcr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Words returned for a page, laid out left to right on one line
    pub fn with_page(self, page: usize, words: &[&'static str]) -> Self {
        self.pages.lock().unwrap().insert(page, words.to_vec());
        self
    }

    pub fn with_failure(self, page: usize) -> Self {
        self.failing.lock().unwrap().insert(page);
        self
    }

    pub fn calls(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }
}

impl OcrService for ScriptedOcr {
    fn recognize(&self, bitmap: &Bitmap) -> Result<Vec<RecognizedElement>, OcrError> {
        let page = FakeRasterizer::page_of(bitmap);
        self.calls.lock().unwrap().push(page);

        if self.failing.lock().unwrap().contains(&page) {
            return Err(OcrError::Recognition(format!("page {page} unreadable")));
        }

        let words = self.pages.lock().unwrap().get(&page).cloned().unwrap_or_default();
        let slot = bitmap.width() as i32 / words.len().max(1) as i32;
        Ok(words
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let left = i as i32 * slot;
                RecognizedElement::new(text, PixelBox::new(left, 0, left + slot, slot / 4))
            })
            .collect())
    }
}

/// Repository wrapper that fails the next call when armed
#[derive(Default)]
pub struct FlakyRepository {
    inner: MemoryRepository,
    fail_next: AtomicBool,
}

impl FlakyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> RepositoryResult<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(RepositoryError::Backend("disk full".to_string()));
        }
        Ok(())
    }
}

impl AnnotationRepository for FlakyRepository {
    fn insert_stroke(&self, row: StrokeRow) -> RepositoryResult<StrokeId> {
        self.check()?;
        self.inner.insert_stroke(row)
    }

    fn delete_stroke(&self, id: StrokeId) -> RepositoryResult<bool> {
        self.check()?;
        self.inner.delete_stroke(id)
    }

    fn strokes_for_document(&self, document_id: DocumentId) -> RepositoryResult<Vec<StrokeRow>> {
        self.check()?;
        self.inner.strokes_for_document(document_id)
    }

    fn strokes_for_page(
        &self,
        document_id: DocumentId,
        page_index: usize,
    ) -> RepositoryResult<Vec<StrokeRow>> {
        self.check()?;
        self.inner.strokes_for_page(document_id, page_index)
    }

    fn insert_note_box(&self, row: NoteBoxRow) -> RepositoryResult<NoteId> {
        self.check()?;
        self.inner.insert_note_box(row)
    }

    fn update_note_box(&self, row: NoteBoxRow) -> RepositoryResult<()> {
        self.check()?;
        self.inner.update_note_box(row)
    }

    fn delete_note_box(&self, id: NoteId) -> RepositoryResult<bool> {
        self.check()?;
        self.inner.delete_note_box(id)
    }

    fn note_boxes_for_page(
        &self,
        document_id: DocumentId,
        page_index: usize,
    ) -> RepositoryResult<Vec<NoteBoxRow>> {
        self.check()?;
        self.inner.note_boxes_for_page(document_id, page_index)
    }

    fn insert_note_text(&self, row: NoteTextRow) -> RepositoryResult<NoteId> {
        self.check()?;
        self.inner.insert_note_text(row)
    }

    fn update_note_text(&self, row: NoteTextRow) -> RepositoryResult<()> {
        self.check()?;
        self.inner.update_note_text(row)
    }

    fn delete_note_text(&self, id: NoteId) -> RepositoryResult<bool> {
        self.check()?;
        self.inner.delete_note_text(id)
    }

    fn note_texts_for_page(
        &self,
        document_id: DocumentId,
        page_index: usize,
    ) -> RepositoryResult<Vec<NoteTextRow>> {
        self.check()?;
        self.inner.note_texts_for_page(document_id, page_index)
    }

    fn subscribe(&self) -> Receiver<ChangeEvent> {
        self.inner.subscribe()
    }
}
