//! Note persistence seam.
//!
//! `AppState` carries an `Arc<dyn NoteStore>`: `PgNoteStore` when a database
//! is configured, `MemoryNoteStore` otherwise.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::models::note::Note;

#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Every note filed against any of `owner_ids`, in no particular order.
    async fn list(&self, owner_ids: &[String]) -> Result<Vec<Note>, AppError>;

    async fn find(&self, owner_ids: &[String], note_id: &str) -> Result<Option<Note>, AppError>;

    /// Whether any owner has a note with this id. Ids are unique store-wide.
    async fn exists(&self, note_id: &str) -> Result<bool, AppError>;

    /// Returns false, without writing, when the id is already taken.
    async fn insert(&self, owner_id: &str, note: &Note) -> Result<bool, AppError>;

    /// Returns false when no note with that id exists for the owners.
    async fn update(&self, owner_ids: &[String], note: &Note) -> Result<bool, AppError>;

    /// Returns false when no note with that id exists for the owners.
    async fn delete(&self, owner_ids: &[String], note_id: &str) -> Result<bool, AppError>;
}

struct StoredNote {
    owner_id: String,
    note: Note,
}

/// Process-local store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryNoteStore {
    notes: RwLock<Vec<StoredNote>>,
}

fn owned_by(stored: &StoredNote, owner_ids: &[String]) -> bool {
    owner_ids.iter().any(|id| *id == stored.owner_id)
}

#[async_trait]
impl NoteStore for MemoryNoteStore {
    async fn list(&self, owner_ids: &[String]) -> Result<Vec<Note>, AppError> {
        let notes = self.notes.read().await;
        Ok(notes
            .iter()
            .filter(|s| owned_by(s, owner_ids))
            .map(|s| s.note.clone())
            .collect())
    }

    async fn find(&self, owner_ids: &[String], note_id: &str) -> Result<Option<Note>, AppError> {
        let notes = self.notes.read().await;
        Ok(notes
            .iter()
            .find(|s| s.note.id == note_id && owned_by(s, owner_ids))
            .map(|s| s.note.clone()))
    }

    async fn exists(&self, note_id: &str) -> Result<bool, AppError> {
        Ok(self.notes.read().await.iter().any(|s| s.note.id == note_id))
    }

    async fn insert(&self, owner_id: &str, note: &Note) -> Result<bool, AppError> {
        let mut notes = self.notes.write().await;
        if notes.iter().any(|s| s.note.id == note.id) {
            return Ok(false);
        }
        notes.push(StoredNote {
            owner_id: owner_id.to_string(),
            note: note.clone(),
        });
        Ok(true)
    }

    async fn update(&self, owner_ids: &[String], note: &Note) -> Result<bool, AppError> {
        let mut notes = self.notes.write().await;
        match notes
            .iter_mut()
            .find(|s| s.note.id == note.id && owned_by(s, owner_ids))
        {
            Some(stored) => {
                stored.note = note.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, owner_ids: &[String], note_id: &str) -> Result<bool, AppError> {
        let mut notes = self.notes.write().await;
        let before = notes.len();
        notes.retain(|s| !(s.note.id == note_id && owned_by(s, owner_ids)));
        Ok(notes.len() < before)
    }
}
