//! Persistent annotation storage contract
//!
//! Annotations are stored as flat rows keyed by document and page, with
//! geometry serialized as JSON text. The storage collaborator assigns row ids
//! and publishes a change event after every committed mutation.
//! [`MemoryRepository`] is the in-process implementation; file-backed stores
//! wrap it.

use crate::annotation::{
    decode_points, decode_rects, encode_points, encode_rects, BoxRect, Color, DocumentId, InkStroke,
    NoteBox, NoteId, NoteText, StrokeId, ToolKind,
};
use crate::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Stored form of an [`InkStroke`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeRow {
    pub id: StrokeId,
    pub document_id: DocumentId,
    pub page_index: usize,

    /// Packed ARGB
    pub color: u32,
    pub stroke_width: f32,
    pub alpha: f32,
    pub tool: ToolKind,
    pub points_json: String,
}

impl StrokeRow {
    pub fn from_stroke(document_id: DocumentId, stroke: &InkStroke) -> Self {
        Self {
            id: stroke.id,
            document_id,
            page_index: stroke.page_index,
            color: stroke.color.to_argb(),
            stroke_width: stroke.stroke_width,
            alpha: stroke.alpha,
            tool: stroke.tool,
            points_json: encode_points(&stroke.points),
        }
    }

    pub fn into_stroke(self) -> InkStroke {
        InkStroke {
            id: self.id,
            page_index: self.page_index,
            color: Color::from_argb(self.color),
            stroke_width: self.stroke_width,
            alpha: self.alpha,
            tool: self.tool,
            points: decode_points(&self.points_json),
        }
    }
}

/// Stored form of a [`NoteBox`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteBoxRow {
    pub id: NoteId,
    pub document_id: DocumentId,
    pub page_index: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl NoteBoxRow {
    pub fn from_note(document_id: DocumentId, note: &NoteBox) -> Self {
        Self {
            id: note.id,
            document_id,
            page_index: note.page_index,
            x: note.rect.x,
            y: note.rect.y,
            width: note.rect.width,
            height: note.rect.height,
            text: note.text.clone(),
            created_at: note.created_at,
        }
    }

    pub fn into_note(self) -> NoteBox {
        NoteBox {
            id: self.id,
            page_index: self.page_index,
            rect: BoxRect::new(self.x, self.y, self.width, self.height),
            text: self.text,
            created_at: self.created_at,
        }
    }
}

/// Stored form of a [`NoteText`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteTextRow {
    pub id: NoteId,
    pub document_id: DocumentId,
    pub page_index: usize,
    pub rects_json: String,
    pub text: String,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl NoteTextRow {
    pub fn from_note(document_id: DocumentId, note: &NoteText) -> Self {
        Self {
            id: note.id,
            document_id,
            page_index: note.page_index,
            rects_json: encode_rects(&note.anchor_rects),
            text: note.quoted_text.clone(),
            comment: note.comment.clone(),
            created_at: note.created_at,
        }
    }

    pub fn into_note(self) -> NoteText {
        NoteText {
            id: self.id,
            page_index: self.page_index,
            anchor_rects: decode_rects(&self.rects_json),
            quoted_text: self.text,
            comment: self.comment,
            created_at: self.created_at,
        }
    }
}

/// Which table a change touched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Strokes,
    NoteBoxes,
    NoteTexts,
}

/// Notification sent after a committed mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub document_id: DocumentId,
    pub kind: ChangeKind,
}

/// Row store for annotations
///
/// Inserts ignore the row's `id` and return the newly assigned one. Deletes
/// are idempotent and report whether a row was removed. Updates of a missing
/// row fail with [`RepositoryError::NotFound`].
pub trait AnnotationRepository: Send + Sync {
    fn insert_stroke(&self, row: StrokeRow) -> RepositoryResult<StrokeId>;
    fn delete_stroke(&self, id: StrokeId) -> RepositoryResult<bool>;
    fn strokes_for_document(&self, document_id: DocumentId) -> RepositoryResult<Vec<StrokeRow>>;
    fn strokes_for_page(
        &self,
        document_id: DocumentId,
        page_index: usize,
    ) -> RepositoryResult<Vec<StrokeRow>>;

    fn insert_note_box(&self, row: NoteBoxRow) -> RepositoryResult<NoteId>;
    fn update_note_box(&self, row: NoteBoxRow) -> RepositoryResult<()>;
    fn delete_note_box(&self, id: NoteId) -> RepositoryResult<bool>;
    fn note_boxes_for_page(
        &self,
        document_id: DocumentId,
        page_index: usize,
    ) -> RepositoryResult<Vec<NoteBoxRow>>;

    fn insert_note_text(&self, row: NoteTextRow) -> RepositoryResult<NoteId>;
    fn update_note_text(&self, row: NoteTextRow) -> RepositoryResult<()>;
    fn delete_note_text(&self, id: NoteId) -> RepositoryResult<bool>;
    fn note_texts_for_page(
        &self,
        document_id: DocumentId,
        page_index: usize,
    ) -> RepositoryResult<Vec<NoteTextRow>>;

    /// Receive a [`ChangeEvent`] for every mutation committed from now on
    fn subscribe(&self) -> Receiver<ChangeEvent>;
}

trait Row: Clone {
    const KIND: &'static str;
    fn id(&self) -> i64;
    fn set_id(&mut self, id: i64);
    fn document_id(&self) -> DocumentId;
    fn page_index(&self) -> usize;
}

macro_rules! impl_row {
    ($row:ty, $kind:literal) => {
        impl Row for $row {
            const KIND: &'static str = $kind;

            fn id(&self) -> i64 {
                self.id
            }

            fn set_id(&mut self, id: i64) {
                self.id = id;
            }

            fn document_id(&self) -> DocumentId {
                self.document_id
            }

            fn page_index(&self) -> usize {
                self.page_index
            }
        }
    };
}

impl_row!(StrokeRow, "stroke");
impl_row!(NoteBoxRow, "note box");
impl_row!(NoteTextRow, "note text");

/// One table with autoincrement ids that are never reused
struct Table<R> {
    next_id: i64,
    rows: BTreeMap<i64, R>,
}

impl<R> Default for Table<R> {
    fn default() -> Self {
        Self {
            next_id: 1,
            rows: BTreeMap::new(),
        }
    }
}

impl<R: Row> Table<R> {
    fn from_rows(rows: Vec<R>, next_id: i64) -> Self {
        let rows: BTreeMap<i64, R> = rows.into_iter().map(|r| (r.id(), r)).collect();
        let after_last = rows.keys().next_back().map_or(1, |id| id + 1);
        Self {
            next_id: next_id.max(after_last),
            rows,
        }
    }

    fn insert(&mut self, mut row: R) -> (i64, DocumentId) {
        let id = self.next_id;
        self.next_id += 1;
        row.set_id(id);
        let document_id = row.document_id();
        self.rows.insert(id, row);
        (id, document_id)
    }

    fn update(&mut self, row: R) -> RepositoryResult<DocumentId> {
        let slot = self.rows.get_mut(&row.id()).ok_or(RepositoryError::NotFound {
            kind: R::KIND,
            id: row.id(),
        })?;
        let document_id = row.document_id();
        *slot = row;
        Ok(document_id)
    }

    fn delete(&mut self, id: i64) -> Option<DocumentId> {
        self.rows.remove(&id).map(|row| row.document_id())
    }

    fn select(&self, document_id: DocumentId, page_index: Option<usize>) -> Vec<R> {
        self.rows
            .values()
            .filter(|r| r.document_id() == document_id)
            .filter(|r| page_index.map_or(true, |p| r.page_index() == p))
            .cloned()
            .collect()
    }
}

#[derive(Default)]
struct Tables {
    strokes: Table<StrokeRow>,
    note_boxes: Table<NoteBoxRow>,
    note_texts: Table<NoteTextRow>,
}

/// Serializable copy of a repository's contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositorySnapshot {
    pub strokes: Vec<StrokeRow>,
    pub note_boxes: Vec<NoteBoxRow>,
    pub note_texts: Vec<NoteTextRow>,
    pub next_stroke_id: i64,
    pub next_note_box_id: i64,
    pub next_note_text_id: i64,
}

/// In-memory [`AnnotationRepository`]
#[derive(Default)]
pub struct MemoryRepository {
    tables: Mutex<Tables>,
    subscribers: Mutex<Vec<Sender<ChangeEvent>>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a repository from a snapshot
    pub fn from_snapshot(snapshot: RepositorySnapshot) -> Self {
        let tables = Tables {
            strokes: Table::from_rows(snapshot.strokes, snapshot.next_stroke_id),
            note_boxes: Table::from_rows(snapshot.note_boxes, snapshot.next_note_box_id),
            note_texts: Table::from_rows(snapshot.note_texts, snapshot.next_note_text_id),
        };
        Self {
            tables: Mutex::new(tables),
            subscribers: Mutex::default(),
        }
    }

    pub fn snapshot(&self) -> RepositorySnapshot {
        let tables = self.lock();
        RepositorySnapshot {
            strokes: tables.strokes.rows.values().cloned().collect(),
            note_boxes: tables.note_boxes.rows.values().cloned().collect(),
            note_texts: tables.note_texts.rows.values().cloned().collect(),
            next_stroke_id: tables.strokes.next_id,
            next_note_box_id: tables.note_boxes.next_id,
            next_note_text_id: tables.note_texts.next_id,
        }
    }

    /// Remove every row of a document (the document itself was deleted)
    pub fn delete_document(&self, document_id: DocumentId) -> usize {
        let removed = {
            let mut tables = self.lock();
            let before = tables.strokes.rows.len()
                + tables.note_boxes.rows.len()
                + tables.note_texts.rows.len();
            tables.strokes.rows.retain(|_, r| r.document_id != document_id);
            tables.note_boxes.rows.retain(|_, r| r.document_id != document_id);
            tables.note_texts.rows.retain(|_, r| r.document_id != document_id);
            before
                - tables.strokes.rows.len()
                - tables.note_boxes.rows.len()
                - tables.note_texts.rows.len()
        };
        if removed > 0 {
            for kind in [ChangeKind::Strokes, ChangeKind::NoteBoxes, ChangeKind::NoteTexts] {
                self.notify(document_id, kind);
            }
        }
        removed
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, document_id: DocumentId, kind: ChangeKind) {
        let event = ChangeEvent { document_id, kind };
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tx| tx.send(event).is_ok());
    }
}

impl AnnotationRepository for MemoryRepository {
    fn insert_stroke(&self, row: StrokeRow) -> RepositoryResult<StrokeId> {
        let (id, document_id) = self.lock().strokes.insert(row);
        self.notify(document_id, ChangeKind::Strokes);
        Ok(id)
    }

    fn delete_stroke(&self, id: StrokeId) -> RepositoryResult<bool> {
        let deleted = self.lock().strokes.delete(id);
        if let Some(document_id) = deleted {
            self.notify(document_id, ChangeKind::Strokes);
        }
        Ok(deleted.is_some())
    }

    fn strokes_for_document(&self, document_id: DocumentId) -> RepositoryResult<Vec<StrokeRow>> {
        Ok(self.lock().strokes.select(document_id, None))
    }

    fn strokes_for_page(
        &self,
        document_id: DocumentId,
        page_index: usize,
    ) -> RepositoryResult<Vec<StrokeRow>> {
        Ok(self.lock().strokes.select(document_id, Some(page_index)))
    }

    fn insert_note_box(&self, row: NoteBoxRow) -> RepositoryResult<NoteId> {
        let (id, document_id) = self.lock().note_boxes.insert(row);
        self.notify(document_id, ChangeKind::NoteBoxes);
        Ok(id)
    }

    fn update_note_box(&self, row: NoteBoxRow) -> RepositoryResult<()> {
        let document_id = self.lock().note_boxes.update(row)?;
        self.notify(document_id, ChangeKind::NoteBoxes);
        Ok(())
    }

    fn delete_note_box(&self, id: NoteId) -> RepositoryResult<bool> {
        let deleted = self.lock().note_boxes.delete(id);
        if let Some(document_id) = deleted {
            self.notify(document_id, ChangeKind::NoteBoxes);
        }
        Ok(deleted.is_some())
    }

    fn note_boxes_for_page(
        &self,
        document_id: DocumentId,
        page_index: usize,
    ) -> RepositoryResult<Vec<NoteBoxRow>> {
        Ok(self.lock().note_boxes.select(document_id, Some(page_index)))
    }

    fn insert_note_text(&self, row: NoteTextRow) -> RepositoryResult<NoteId> {
        let (id, document_id) = self.lock().note_texts.insert(row);
        self.notify(document_id, ChangeKind::NoteTexts);
        Ok(id)
    }

    fn update_note_text(&self, row: NoteTextRow) -> RepositoryResult<()> {
        let document_id = self.lock().note_texts.update(row)?;
        self.notify(document_id, ChangeKind::NoteTexts);
        Ok(())
    }

    fn delete_note_text(&self, id: NoteId) -> RepositoryResult<bool> {
        let deleted = self.lock().note_texts.delete(id);
        if let Some(document_id) = deleted {
            self.notify(document_id, ChangeKind::NoteTexts);
        }
        Ok(deleted.is_some())
    }

    fn note_texts_for_page(
        &self,
        document_id: DocumentId,
        page_index: usize,
    ) -> RepositoryResult<Vec<NoteTextRow>> {
        Ok(self.lock().note_texts.select(document_id, Some(page_index)))
    }

    fn subscribe(&self) -> Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }
}
