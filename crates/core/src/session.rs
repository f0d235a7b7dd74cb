//! Document session
//!
//! Wires the components together for one open document: page renders feed the
//! extraction queue, extracted words feed search and selection, and
//! annotations are stored alongside. This is the surface a presentation layer
//! drives.

use crate::annotation::{DocumentId, NoteText, ToolMode};
use crate::annotation_store::AnnotationStore;
use crate::config::ViewerConfig;
use crate::error::SessionError;
use crate::extraction::ExtractionQueue;
use crate::geometry::{NormalizedRect, Point, Viewport};
use crate::ocr::OcrService;
use crate::page_store::PageStore;
use crate::repository::AnnotationRepository;
use crate::scan::DocumentScanner;
use crate::search::{SearchIndex, SearchMatch};
use crate::selection::{Handle, PageSelection, SelectionEngine, SelectionState};
use crate::word_index::{PageWords, WordIndex};
use notepdf_cache::CacheStats;
use notepdf_render::{Bitmap, Rasterizer};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One open document and all of its viewer state
pub struct DocumentSession {
    document_id: DocumentId,
    config: ViewerConfig,
    pages: Arc<PageStore>,
    index: Arc<WordIndex>,
    extraction: Arc<ExtractionQueue>,
    scanner: DocumentScanner,
    search: Mutex<SearchIndex>,
    selection: Mutex<PageSelection>,
    tool: Mutex<ToolMode>,
    annotations: AnnotationStore,
}

impl DocumentSession {
    /// Open a session and start the extraction worker
    pub fn open<R: Rasterizer + 'static>(
        document_id: DocumentId,
        rasterizer: R,
        ocr: Arc<dyn OcrService>,
        repository: Arc<dyn AnnotationRepository>,
        config: ViewerConfig,
    ) -> Result<Self, SessionError> {
        let pages = Arc::new(PageStore::new(rasterizer, config.page_store.clone()));
        let index = Arc::new(WordIndex::new());
        let extraction = Arc::new(ExtractionQueue::new(ocr, index.clone()));
        extraction.start()?;

        let scanner =
            DocumentScanner::new(pages.clone(), extraction.clone(), config.extraction.clone());
        let annotations = AnnotationStore::new(repository, document_id, config.ink.clone());

        tracing::info!(
            document = %document_id,
            pages = pages.page_count(),
            "document session opened"
        );
        Ok(Self {
            document_id,
            search: Mutex::new(SearchIndex::new(index.clone())),
            selection: Mutex::new(PageSelection::new()),
            tool: Mutex::new(ToolMode::default()),
            config,
            pages,
            index,
            extraction,
            scanner,
            annotations,
        })
    }

    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn page_count(&self) -> usize {
        self.pages.page_count()
    }

    /// Bitmap of a visible page; also queues the page for text extraction
    pub fn page(&self, page_index: usize) -> Option<Arc<Bitmap>> {
        let bitmap = self.pages.get(page_index)?;
        self.extraction.submit(page_index, bitmap.clone());
        Some(bitmap)
    }

    /// Recognized words of a page, `None` until it has been extracted
    pub fn words_for(&self, page_index: usize) -> Option<PageWords> {
        self.index.words_for(page_index)
    }

    pub fn word_index(&self) -> &Arc<WordIndex> {
        &self.index
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.pages.cache_stats()
    }

    /// Queued extraction requests
    pub fn pending_extractions(&self) -> usize {
        self.extraction.pending()
    }

    // Search

    /// Replace the search query and restart the full-document scan
    pub fn set_search_query(&self, query: &str) -> Result<(), SessionError> {
        lock(&self.search).set_query(query);
        self.scanner.restart(query)?;
        Ok(())
    }

    pub fn search_query(&self) -> String {
        lock(&self.search).query().to_string()
    }

    /// Current matches, recomputed if more pages were extracted
    pub fn search_matches(&self) -> Vec<SearchMatch> {
        let mut search = lock(&self.search);
        search.refresh();
        search.matches().to_vec()
    }

    pub fn current_match_index(&self) -> Option<usize> {
        let mut search = lock(&self.search);
        search.refresh();
        search.current_match_index()
    }

    pub fn current_match(&self) -> Option<SearchMatch> {
        let mut search = lock(&self.search);
        search.refresh();
        search.current_match().cloned()
    }

    pub fn next_match(&self) -> Option<SearchMatch> {
        let mut search = lock(&self.search);
        search.refresh();
        search.next();
        search.current_match().cloned()
    }

    pub fn previous_match(&self) -> Option<SearchMatch> {
        let mut search = lock(&self.search);
        search.refresh();
        search.previous();
        search.current_match().cloned()
    }

    /// Close the search bar
    pub fn clear_search(&self) {
        self.scanner.cancel();
        lock(&self.search).clear();
    }

    pub fn is_scanning(&self) -> bool {
        self.scanner.is_running()
    }

    // Selection

    fn engine(&self, page_index: usize, viewport: Viewport) -> Option<SelectionEngine> {
        let words = self.index.words_for(page_index)?;
        Some(SelectionEngine::new(
            words,
            viewport,
            self.config.selection.hit_tolerance,
        ))
    }

    /// Tap on a page: select the word under `point` or clear the selection
    pub fn select_at(
        &self,
        page_index: usize,
        point: Point,
        viewport: Viewport,
    ) -> Option<SelectionState> {
        let mut selection = lock(&self.selection);
        let hit = self
            .engine(page_index, viewport)
            .and_then(|engine| engine.select_at(point));

        match hit {
            Some(state) => selection.set(page_index, state),
            None => selection.clear(),
        }
        hit
    }

    /// Drag from the anchor word to `point`
    pub fn extend_selection(
        &self,
        page_index: usize,
        point: Point,
        viewport: Viewport,
    ) -> Option<SelectionState> {
        let mut selection = lock(&self.selection);
        let current = selection.get(page_index)?;
        let engine = self.engine(page_index, viewport)?;

        let next = engine.extend_to(point, &current);
        selection.set(page_index, next);
        Some(next)
    }

    pub fn move_selection_handle(
        &self,
        page_index: usize,
        handle: Handle,
        point: Point,
        viewport: Viewport,
    ) -> Option<SelectionState> {
        let mut selection = lock(&self.selection);
        let current = selection.get(page_index)?;
        let engine = self.engine(page_index, viewport)?;

        let next = engine.move_handle(handle, point, &current);
        selection.set(page_index, next);
        Some(next)
    }

    /// Active selection and the page it is on
    pub fn selection(&self) -> Option<(usize, SelectionState)> {
        lock(&self.selection).active()
    }

    /// Highlight bands of the active selection
    pub fn selection_rects(&self) -> Vec<NormalizedRect> {
        self.selection()
            .and_then(|(page, state)| Some(state.highlight_rects(&self.index.words_for(page)?)))
            .unwrap_or_default()
    }

    pub fn selected_text(&self) -> Option<String> {
        let (page, state) = self.selection()?;
        Some(state.selected_text(&self.index.words_for(page)?))
    }

    pub fn clear_selection(&self) {
        lock(&self.selection).clear();
    }

    /// Scrolling starts: any selection is dropped
    pub fn on_scroll(&self) {
        self.clear_selection();
    }

    /// Attach a comment to the selected text and drop the selection
    pub fn comment_selection(&self, comment: &str) -> Result<Option<NoteText>, SessionError> {
        let Some((page, state)) = self.selection() else {
            return Ok(None);
        };
        let Some(words) = self.index.words_for(page) else {
            return Ok(None);
        };

        let note = self.annotations.add_note_text(
            page,
            state.highlight_rects(&words),
            state.selected_text(&words),
            comment,
        )?;
        self.clear_selection();
        Ok(Some(note))
    }

    // Tools and annotations

    /// Switch tool mode; any selection is dropped
    pub fn set_tool(&self, mode: ToolMode) {
        *lock(&self.tool) = mode;
        self.clear_selection();
    }

    pub fn tool(&self) -> ToolMode {
        *lock(&self.tool)
    }

    pub fn annotations(&self) -> &AnnotationStore {
        &self.annotations
    }

    /// End the session
    ///
    /// Cancels the scan, stops the extraction worker, and drops every
    /// transient cache. Stored annotations are untouched.
    pub fn close(&self) -> Result<(), SessionError> {
        self.scanner.cancel();
        self.scanner.wait();
        self.extraction.shutdown()?;

        self.index.clear();
        self.pages.invalidate();
        lock(&self.search).clear();
        self.clear_selection();
        self.annotations.clear_history();

        tracing::info!(document = %self.document_id, "document session closed");
        Ok(())
    }
}
