use async_trait::async_trait;
use shared::{
    domain::{Note, NoteDraft, NoteId},
    protocol::{ListNotesQuery, NotesPage},
};

use crate::error::NotesClientError;

/// Remote collaborator that owns the notes. Every call is one request.
#[async_trait]
pub trait NotesApi: Send + Sync {
    async fn fetch_notes(&self, query: ListNotesQuery) -> Result<NotesPage, NotesClientError>;
    async fn fetch_note(&self, id: &NoteId) -> Result<Note, NotesClientError>;
    async fn create_note(&self, draft: &NoteDraft) -> Result<Note, NotesClientError>;
    /// Returns the note as it was before deletion.
    async fn delete_note(&self, id: &NoteId) -> Result<Note, NotesClientError>;
}
