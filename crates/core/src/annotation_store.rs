//! Annotation store with ink undo/redo
//!
//! Wraps the repository for one document. Ink stroke additions and removals
//! are recorded in a linear two-stack history; note boxes and text notes are
//! plain CRUD without history.
//!
//! Re-inserting a stroke (undoing a removal, redoing an addition) gives it a
//! new storage id. Every history entry still holding the old id is rewritten
//! to the new one, so later steps never act on a stale id.

use crate::annotation::{
    BoxRect, Color, DocumentId, InkStroke, NoteBox, NoteId, NoteText, PageNotes, StrokeId,
    ToolKind,
};
use crate::config::InkConfig;
use crate::error::AnnotationResult;
use crate::geometry::{NormalizedPoint, NormalizedRect, Point, Viewport};
use crate::repository::{
    AnnotationRepository, ChangeEvent, ChangeKind, NoteBoxRow, NoteTextRow, StrokeRow,
};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// One undoable ink mutation
#[derive(Debug, Clone, PartialEq)]
pub enum InkOperation {
    Added { stroke_id: StrokeId, stroke: InkStroke },
    Removed { stroke: InkStroke },
}

impl InkOperation {
    fn remap(&mut self, old: StrokeId, new: StrokeId) {
        match self {
            InkOperation::Added { stroke_id, stroke } => {
                if *stroke_id == old {
                    *stroke_id = new;
                    stroke.id = new;
                }
            }
            InkOperation::Removed { stroke } => {
                if stroke.id == old {
                    stroke.id = new;
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct InkHistory {
    undo: Vec<InkOperation>,
    redo: Vec<InkOperation>,
}

impl InkHistory {
    fn record(&mut self, operation: InkOperation) {
        self.undo.push(operation);
        self.redo.clear();
    }

    fn remap(&mut self, old: StrokeId, new: StrokeId) {
        for operation in self.undo.iter_mut().chain(self.redo.iter_mut()) {
            operation.remap(old, new);
        }
    }
}

/// Change notifications for one document
pub struct DocumentChanges {
    document_id: DocumentId,
    events: Receiver<ChangeEvent>,
}

impl DocumentChanges {
    /// Kinds of every change received so far, without blocking
    pub fn drain(&self) -> Vec<ChangeKind> {
        self.events
            .try_iter()
            .filter(|e| e.document_id == self.document_id)
            .map(|e| e.kind)
            .collect()
    }

    /// Wait for the next change to this document
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ChangeKind> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.events.recv_timeout(remaining) {
                Ok(event) if event.document_id == self.document_id => return Some(event.kind),
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    }
}

/// Annotations of one document
pub struct AnnotationStore {
    repository: Arc<dyn AnnotationRepository>,
    document_id: DocumentId,
    config: InkConfig,
    history: Mutex<InkHistory>,
}

impl AnnotationStore {
    pub fn new(
        repository: Arc<dyn AnnotationRepository>,
        document_id: DocumentId,
        config: InkConfig,
    ) -> Self {
        Self {
            repository,
            document_id,
            config,
            history: Mutex::new(InkHistory::default()),
        }
    }

    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    pub fn config(&self) -> &InkConfig {
        &self.config
    }

    fn lock_history(&self) -> MutexGuard<'_, InkHistory> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, stroke: &InkStroke) -> AnnotationResult<StrokeId> {
        let row = StrokeRow::from_stroke(self.document_id, stroke);
        Ok(self.repository.insert_stroke(row)?)
    }

    /// Commit a finished stroke
    ///
    /// Highlighter strokes are translucent, pen strokes opaque.
    pub fn add_stroke(
        &self,
        page_index: usize,
        points: Vec<NormalizedPoint>,
        color: Color,
        stroke_width: f32,
        tool: ToolKind,
    ) -> AnnotationResult<InkStroke> {
        let mut stroke = InkStroke {
            id: 0,
            page_index,
            color,
            stroke_width,
            alpha: tool.alpha(&self.config),
            tool,
            points,
        };

        let mut history = self.lock_history();
        stroke.id = self.insert(&stroke)?;
        history.record(InkOperation::Added {
            stroke_id: stroke.id,
            stroke: stroke.clone(),
        });
        tracing::debug!(stroke = stroke.id, page = page_index, "stroke added");
        Ok(stroke)
    }

    /// Commit a stroke drawn with the tool's default width
    pub fn add_default_stroke(
        &self,
        page_index: usize,
        points: Vec<NormalizedPoint>,
        color: Color,
        tool: ToolKind,
    ) -> AnnotationResult<InkStroke> {
        let width = tool.default_width(&self.config);
        self.add_stroke(page_index, points, color, width, tool)
    }

    /// Delete a stroke
    ///
    /// Returns `false` (and records nothing) if the stroke was already gone.
    pub fn remove_stroke(&self, stroke: &InkStroke) -> AnnotationResult<bool> {
        let mut history = self.lock_history();
        if !self.repository.delete_stroke(stroke.id)? {
            return Ok(false);
        }
        history.record(InkOperation::Removed {
            stroke: stroke.clone(),
        });
        tracing::debug!(stroke = stroke.id, "stroke removed");
        Ok(true)
    }

    /// Remove the first stroke on a page passing within the eraser radius
    ///
    /// `point` is in screen pixels of `viewport`.
    pub fn erase_at(
        &self,
        page_index: usize,
        point: Point,
        viewport: Viewport,
    ) -> AnnotationResult<Option<InkStroke>> {
        let hit = self
            .strokes_for_page(page_index)?
            .into_iter()
            .find(|stroke| stroke.is_near(point, viewport, self.config.eraser_radius));

        let Some(stroke) = hit else {
            return Ok(None);
        };
        Ok(self.remove_stroke(&stroke)?.then_some(stroke))
    }

    /// Revert the most recent ink mutation
    ///
    /// Returns `false` if there was nothing to undo. On a storage error the
    /// history is left as it was.
    pub fn undo(&self) -> AnnotationResult<bool> {
        let mut history = self.lock_history();
        let Some(operation) = history.undo.pop() else {
            return Ok(false);
        };

        match self.revert(&mut history, &operation) {
            Ok(inverse) => {
                history.redo.push(inverse);
                Ok(true)
            }
            Err(e) => {
                history.undo.push(operation);
                Err(e)
            }
        }
    }

    /// Reapply the most recently undone ink mutation
    pub fn redo(&self) -> AnnotationResult<bool> {
        let mut history = self.lock_history();
        let Some(operation) = history.redo.pop() else {
            return Ok(false);
        };

        match self.reapply(&mut history, &operation) {
            Ok(applied) => {
                history.undo.push(applied);
                Ok(true)
            }
            Err(e) => {
                history.redo.push(operation);
                Err(e)
            }
        }
    }

    fn revert(
        &self,
        history: &mut InkHistory,
        operation: &InkOperation,
    ) -> AnnotationResult<InkOperation> {
        match operation {
            InkOperation::Added { stroke_id, .. } => {
                self.repository.delete_stroke(*stroke_id)?;
                tracing::debug!(stroke = stroke_id, "undo add");
                Ok(operation.clone())
            }
            InkOperation::Removed { stroke } => {
                let restored = self.reinsert(history, stroke)?;
                tracing::debug!(stroke = restored.id, "undo remove");
                Ok(InkOperation::Removed { stroke: restored })
            }
        }
    }

    fn reapply(
        &self,
        history: &mut InkHistory,
        operation: &InkOperation,
    ) -> AnnotationResult<InkOperation> {
        match operation {
            InkOperation::Added { stroke, .. } => {
                let restored = self.reinsert(history, stroke)?;
                tracing::debug!(stroke = restored.id, "redo add");
                Ok(InkOperation::Added {
                    stroke_id: restored.id,
                    stroke: restored,
                })
            }
            InkOperation::Removed { stroke } => {
                self.repository.delete_stroke(stroke.id)?;
                tracing::debug!(stroke = stroke.id, "redo remove");
                Ok(operation.clone())
            }
        }
    }

    fn reinsert(
        &self,
        history: &mut InkHistory,
        stroke: &InkStroke,
    ) -> AnnotationResult<InkStroke> {
        let new_id = self.insert(stroke)?;
        history.remap(stroke.id, new_id);
        Ok(InkStroke {
            id: new_id,
            ..stroke.clone()
        })
    }

    pub fn can_undo(&self) -> bool {
        !self.lock_history().undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.lock_history().redo.is_empty()
    }

    /// Drop the whole history (the document was closed)
    pub fn clear_history(&self) {
        let mut history = self.lock_history();
        history.undo.clear();
        history.redo.clear();
    }

    pub fn strokes_for_page(&self, page_index: usize) -> AnnotationResult<Vec<InkStroke>> {
        Ok(self
            .repository
            .strokes_for_page(self.document_id, page_index)?
            .into_iter()
            .map(StrokeRow::into_stroke)
            .collect())
    }

    /// Every stroke of the document grouped by page
    pub fn strokes_by_page(&self) -> AnnotationResult<BTreeMap<usize, Vec<InkStroke>>> {
        let mut pages: BTreeMap<usize, Vec<InkStroke>> = BTreeMap::new();
        for row in self.repository.strokes_for_document(self.document_id)? {
            let stroke = row.into_stroke();
            pages.entry(stroke.page_index).or_default().push(stroke);
        }
        Ok(pages)
    }

    pub fn add_note_box(
        &self,
        page_index: usize,
        rect: BoxRect,
        text: impl Into<String>,
    ) -> AnnotationResult<NoteBox> {
        let mut note = NoteBox {
            id: 0,
            page_index,
            rect,
            text: text.into(),
            created_at: Utc::now(),
        };
        note.id = self
            .repository
            .insert_note_box(NoteBoxRow::from_note(self.document_id, &note))?;
        Ok(note)
    }

    pub fn update_note_box(&self, note: &NoteBox) -> AnnotationResult<()> {
        Ok(self
            .repository
            .update_note_box(NoteBoxRow::from_note(self.document_id, note))?)
    }

    pub fn delete_note_box(&self, id: NoteId) -> AnnotationResult<bool> {
        Ok(self.repository.delete_note_box(id)?)
    }

    pub fn add_note_text(
        &self,
        page_index: usize,
        anchor_rects: Vec<NormalizedRect>,
        quoted_text: impl Into<String>,
        comment: impl Into<String>,
    ) -> AnnotationResult<NoteText> {
        let mut note = NoteText {
            id: 0,
            page_index,
            anchor_rects,
            quoted_text: quoted_text.into(),
            comment: comment.into(),
            created_at: Utc::now(),
        };
        note.id = self
            .repository
            .insert_note_text(NoteTextRow::from_note(self.document_id, &note))?;
        Ok(note)
    }

    pub fn update_note_text(&self, note: &NoteText) -> AnnotationResult<()> {
        Ok(self
            .repository
            .update_note_text(NoteTextRow::from_note(self.document_id, note))?)
    }

    pub fn delete_note_text(&self, id: NoteId) -> AnnotationResult<bool> {
        Ok(self.repository.delete_note_text(id)?)
    }

    /// Note boxes and text notes of one page
    pub fn page_notes(&self, page_index: usize) -> AnnotationResult<PageNotes> {
        let boxes = self
            .repository
            .note_boxes_for_page(self.document_id, page_index)?
            .into_iter()
            .map(NoteBoxRow::into_note)
            .collect();
        let texts = self
            .repository
            .note_texts_for_page(self.document_id, page_index)?
            .into_iter()
            .map(NoteTextRow::into_note)
            .collect();
        Ok(PageNotes { boxes, texts })
    }

    /// Subscribe to changes of this document's annotations
    pub fn subscribe(&self) -> DocumentChanges {
        DocumentChanges {
            document_id: self.document_id,
            events: self.repository.subscribe(),
        }
    }
}
