//! JSON-file annotation storage
//!
//! Keeps every annotation row in memory and rewrites `annotations.json` after
//! each mutation. A mutation is first applied to a staged copy of the rows and
//! only reaches memory once that copy is on disk, so a failed write changes
//! nothing. Writes go to a temporary file that is renamed over the old one.

use directories::ProjectDirs;
use notepdf_core::{
    AnnotationRepository, ChangeEvent, DocumentId, MemoryRepository, NoteBoxRow, NoteId,
    NoteTextRow, RepositoryError, RepositoryResult, RepositorySnapshot, StrokeId, StrokeRow,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::{Mutex, PoisonError};

const SCHEMA_VERSION: u32 = 1;
const FILE_NAME: &str = "annotations.json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("unsupported annotation file version {0}")]
    UnsupportedVersion(u32),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<StorageError> for RepositoryError {
    fn from(err: StorageError) -> Self {
        RepositoryError::Backend(err.to_string())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AnnotationsEnvelope {
    version: u32,
    annotations: RepositorySnapshot,
}

/// [`AnnotationRepository`] persisted to a single JSON file
pub struct JsonFileRepository {
    path: PathBuf,
    memory: MemoryRepository,
    write_lock: Mutex<()>,
}

impl JsonFileRepository {
    /// Open the store in the platform's local data directory
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs =
            ProjectDirs::from("ie", "NotePdf", "NotePdf").ok_or(StorageError::NoDataDirectory)?;
        Self::open_in(dirs.data_local_dir())
    }

    /// Open `annotations.json` inside `root`
    pub fn open_in(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::open(root.as_ref().join(FILE_NAME))
    }

    /// Open a store file, starting empty if it does not exist yet
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let snapshot = if path.exists() {
            let bytes = fs::read(&path)?;
            let envelope: AnnotationsEnvelope = serde_json::from_slice(&bytes)?;
            if envelope.version != SCHEMA_VERSION {
                return Err(StorageError::UnsupportedVersion(envelope.version));
            }
            envelope.annotations
        } else {
            RepositorySnapshot::default()
        };

        tracing::debug!(
            path = %path.display(),
            strokes = snapshot.strokes.len(),
            "annotation store opened"
        );
        Ok(Self {
            path,
            memory: MemoryRepository::from_snapshot(snapshot),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove every annotation of a deleted document
    pub fn delete_document(&self, document_id: DocumentId) -> RepositoryResult<usize> {
        self.commit(|rows| Ok(rows.delete_document(document_id)), |removed| *removed > 0)
    }

    /// Write the current contents to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.write(self.memory.snapshot())
    }

    fn write(&self, annotations: RepositorySnapshot) -> Result<(), StorageError> {
        let envelope = AnnotationsEnvelope {
            version: SCHEMA_VERSION,
            annotations,
        };
        let bytes = serde_json::to_vec_pretty(&envelope)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, bytes)?;
        if let Err(e) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }

    /// Run `mutate` on a staged copy, write it, then apply it to memory
    ///
    /// Mutations are serialized by `write_lock`, so replaying `mutate` on
    /// memory assigns the same ids as on the staged copy. Nothing is written
    /// when `changed` rejects the staged result.
    fn commit<T>(
        &self,
        mutate: impl Fn(&MemoryRepository) -> RepositoryResult<T>,
        changed: impl Fn(&T) -> bool,
    ) -> RepositoryResult<T> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let staged = MemoryRepository::from_snapshot(self.memory.snapshot());
        let value = mutate(&staged)?;
        if !changed(&value) {
            return Ok(value);
        }

        self.write(staged.snapshot()).map_err(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to write annotations");
            RepositoryError::from(e)
        })?;
        mutate(&self.memory)
    }
}

impl AnnotationRepository for JsonFileRepository {
    fn insert_stroke(&self, row: StrokeRow) -> RepositoryResult<StrokeId> {
        self.commit(|rows| rows.insert_stroke(row.clone()), |_| true)
    }

    fn delete_stroke(&self, id: StrokeId) -> RepositoryResult<bool> {
        self.commit(|rows| rows.delete_stroke(id), |deleted| *deleted)
    }

    fn strokes_for_document(&self, document_id: DocumentId) -> RepositoryResult<Vec<StrokeRow>> {
        self.memory.strokes_for_document(document_id)
    }

    fn strokes_for_page(
        &self,
        document_id: DocumentId,
        page_index: usize,
    ) -> RepositoryResult<Vec<StrokeRow>> {
        self.memory.strokes_for_page(document_id, page_index)
    }

    fn insert_note_box(&self, row: NoteBoxRow) -> RepositoryResult<NoteId> {
        self.commit(|rows| rows.insert_note_box(row.clone()), |_| true)
    }

    fn update_note_box(&self, row: NoteBoxRow) -> RepositoryResult<()> {
        self.commit(|rows| rows.update_note_box(row.clone()), |_| true)
    }

    fn delete_note_box(&self, id: NoteId) -> RepositoryResult<bool> {
        self.commit(|rows| rows.delete_note_box(id), |deleted| *deleted)
    }

    fn note_boxes_for_page(
        &self,
        document_id: DocumentId,
        page_index: usize,
    ) -> RepositoryResult<Vec<NoteBoxRow>> {
        self.memory.note_boxes_for_page(document_id, page_index)
    }

    fn insert_note_text(&self, row: NoteTextRow) -> RepositoryResult<NoteId> {
        self.commit(|rows| rows.insert_note_text(row.clone()), |_| true)
    }

    fn update_note_text(&self, row: NoteTextRow) -> RepositoryResult<()> {
        self.commit(|rows| rows.update_note_text(row.clone()), |_| true)
    }

    fn delete_note_text(&self, id: NoteId) -> RepositoryResult<bool> {
        self.commit(|rows| rows.delete_note_text(id), |deleted| *deleted)
    }

    fn note_texts_for_page(
        &self,
        document_id: DocumentId,
        page_index: usize,
    ) -> RepositoryResult<Vec<NoteTextRow>> {
        self.memory.note_texts_for_page(document_id, page_index)
    }

    fn subscribe(&self) -> Receiver<ChangeEvent> {
        self.memory.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use notepdf_core::{AnnotationStore, Color, InkConfig, NormalizedRect, Point, ToolKind};
    use std::sync::Arc;

    fn stroke_row(document_id: DocumentId) -> StrokeRow {
        StrokeRow {
            id: 0,
            document_id,
            page_index: 0,
            color: Color::RED.to_argb(),
            stroke_width: 0.005,
            alpha: 1.0,
            tool: ToolKind::Pen,
            points_json: r#"[{"x":0.1,"y":0.2}]"#.to_string(),
        }
    }

    #[test]
    fn annotations_survive_reopen() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let doc = uuid::Uuid::new_v4();

        {
            let repo = Arc::new(JsonFileRepository::open_in(temp.path()).expect("open"));
            let store = AnnotationStore::new(repo, doc, InkConfig::default());
            store
                .add_stroke(1, vec![Point::new(0.5, 0.5)], Color::BLUE, 0.01, ToolKind::Pen)
                .expect("stroke should commit");
            store
                .add_note_text(
                    1,
                    vec![NormalizedRect::new(0.1, 0.1, 0.4, 0.12)],
                    "quoted",
                    "comment",
                )
                .expect("note should commit");
        }

        let repo = Arc::new(JsonFileRepository::open_in(temp.path()).expect("reopen"));
        let store = AnnotationStore::new(repo, doc, InkConfig::default());
        let strokes = store.strokes_for_page(1).expect("query");
        assert_eq!(strokes.len(), 1);
        assert_eq!(strokes[0].points, vec![Point::new(0.5, 0.5)]);
        assert_eq!(store.page_notes(1).expect("query").texts[0].comment, "comment");
    }

    #[test]
    fn missing_file_opens_empty() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let repo = JsonFileRepository::open_in(temp.path().join("nested")).expect("open");

        assert!(repo.strokes_for_document(uuid::Uuid::new_v4()).expect("query").is_empty());
        assert!(!repo.path().exists());
    }

    #[test]
    fn ids_are_not_reused_after_reopen() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let doc = uuid::Uuid::new_v4();

        let repo = JsonFileRepository::open_in(temp.path()).expect("open");
        let first = repo.insert_stroke(stroke_row(doc)).expect("insert");
        repo.delete_stroke(first).expect("delete");
        drop(repo);

        let repo = JsonFileRepository::open_in(temp.path()).expect("reopen");
        assert!(repo.insert_stroke(stroke_row(doc)).expect("insert") > first);
    }

    #[test]
    fn write_leaves_no_temp_file() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let repo = JsonFileRepository::open_in(temp.path()).expect("open");
        repo.insert_note_box(NoteBoxRow {
            id: 0,
            document_id: uuid::Uuid::new_v4(),
            page_index: 0,
            x: 0.1,
            y: 0.1,
            width: 0.2,
            height: 0.2,
            text: "box".to_string(),
            created_at: Utc::now(),
        })
        .expect("insert");

        assert!(repo.path().exists());
        assert!(!repo.path().with_extension("tmp").exists());
    }

    /// Replace the store file with a directory so the next rename fails
    fn block_writes(repo: &JsonFileRepository) {
        if repo.path().exists() {
            fs::remove_file(repo.path()).expect("store file should be removable");
        }
        fs::create_dir(repo.path()).expect("directory should be created");
    }

    #[test]
    fn failed_write_leaves_rows_unchanged() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let doc = uuid::Uuid::new_v4();
        let repo = Arc::new(JsonFileRepository::open_in(temp.path()).expect("open"));
        let kept = repo.insert_stroke(stroke_row(doc)).expect("insert");
        let events = repo.subscribe();

        block_writes(&repo);
        assert!(repo.insert_stroke(stroke_row(doc)).is_err());
        assert!(repo.delete_stroke(kept).is_err());
        assert!(repo.delete_document(doc).is_err());

        let rows = repo.strokes_for_document(doc).expect("query");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, kept);
        assert_eq!(events.try_iter().count(), 0);
        assert!(!repo.path().with_extension("tmp").exists());
    }

    #[test]
    fn failed_undo_can_be_retried() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let doc = uuid::Uuid::new_v4();
        let repo = Arc::new(JsonFileRepository::open_in(temp.path()).expect("open"));
        let store = AnnotationStore::new(repo.clone(), doc, InkConfig::default());

        let stroke = store
            .add_stroke(0, vec![Point::new(0.2, 0.2)], Color::RED, 0.005, ToolKind::Pen)
            .expect("stroke should commit");
        store.remove_stroke(&stroke).expect("stroke should delete");

        block_writes(&repo);
        assert!(store.undo().is_err());
        assert!(store.strokes_for_page(0).expect("query").is_empty());
        assert!(store
            .add_stroke(0, vec![Point::new(0.6, 0.6)], Color::RED, 0.005, ToolKind::Pen)
            .is_err());
        assert!(store.strokes_for_page(0).expect("query").is_empty());

        fs::remove_dir(repo.path()).expect("directory should be removed");
        assert!(store.undo().expect("undo should succeed"));
        let strokes = store.strokes_for_page(0).expect("query");
        assert_eq!(strokes.len(), 1);
        assert!(strokes[0].same_content(&stroke));
        drop(store);
        drop(repo);

        let reopened = JsonFileRepository::open_in(temp.path()).expect("reopen");
        assert_eq!(reopened.strokes_for_document(doc).expect("query").len(), 1);
    }

    #[test]
    fn corrupt_file_is_serde_error() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        fs::write(temp.path().join(FILE_NAME), "{ not json").expect("write");

        let result = JsonFileRepository::open_in(temp.path());
        assert!(matches!(result, Err(StorageError::Serde(_))));
    }

    #[test]
    fn newer_schema_is_rejected() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let payload = r#"{ "version": 99, "annotations": {} }"#;
        fs::write(temp.path().join(FILE_NAME), payload).expect("write");

        let result = JsonFileRepository::open_in(temp.path());
        assert!(matches!(result, Err(StorageError::UnsupportedVersion(99))));
    }

    #[test]
    fn delete_document_is_persisted() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let doc = uuid::Uuid::new_v4();
        let repo = JsonFileRepository::open_in(temp.path()).expect("open");
        repo.insert_stroke(stroke_row(doc)).expect("insert");

        assert_eq!(repo.delete_document(doc).expect("delete"), 1);
        drop(repo);

        let repo = JsonFileRepository::open_in(temp.path()).expect("reopen");
        assert!(repo.strokes_for_document(doc).expect("query").is_empty());
    }

    #[test]
    fn storage_error_maps_to_backend() {
        let err: RepositoryError = StorageError::NoDataDirectory.into();
        assert!(matches!(err, RepositoryError::Backend(_)));
    }
}
