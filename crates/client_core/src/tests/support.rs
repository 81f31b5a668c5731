//! In-memory notes API used by the unit tests.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use shared::{
    domain::{Note, NoteDraft, NoteId, NoteTag},
    error::ApiException,
    protocol::{ListNotesQuery, NotesPage},
};
use tokio::sync::Semaphore;

use crate::{api::NotesApi, error::NotesClientError};

pub(crate) fn note(id: &str, title: &str, tag: NoteTag) -> Note {
    Note {
        id: NoteId::new(id),
        title: title.to_string(),
        content: format!("{title} details"),
        tag,
        created_at: None,
        updated_at: None,
    }
}

pub(crate) fn sample_notes() -> Vec<Note> {
    vec![
        note("abc123", "Groceries", NoteTag::Shopping),
        note("n2", "Buy milk", NoteTag::Shopping),
        note("n3", "Sprint planning", NoteTag::Meeting),
        note("n4", "Quarterly report", NoteTag::Work),
        note("n5", "Call mom", NoteTag::Personal),
    ]
}

#[derive(Default)]
pub(crate) struct FakeNotesApi {
    notes: Mutex<Vec<Note>>,
    list_calls: Mutex<Vec<ListNotesQuery>>,
    failing_searches: Mutex<HashSet<String>>,
    list_gate: Mutex<Option<Arc<Semaphore>>>,
    delete_gate: Mutex<Option<Arc<Semaphore>>>,
    fail_deletes: AtomicBool,
    delete_calls: AtomicUsize,
    create_calls: AtomicUsize,
}

impl FakeNotesApi {
    pub(crate) fn with_notes(notes: Vec<Note>) -> Arc<Self> {
        let api = Self::default();
        *api.notes.lock().expect("lock") = notes;
        Arc::new(api)
    }

    pub(crate) fn fail_search(&self, search: &str) {
        self.failing_searches
            .lock()
            .expect("lock")
            .insert(search.to_string());
    }

    pub(crate) fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Holds every list response until the returned semaphore gets permits.
    /// The response is built from the notes present when the request arrives.
    pub(crate) fn gate_lists(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.list_gate.lock().expect("lock") = Some(Arc::clone(&gate));
        gate
    }

    /// Holds every delete request until the returned semaphore gets permits.
    pub(crate) fn gate_deletes(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.delete_gate.lock().expect("lock") = Some(Arc::clone(&gate));
        gate
    }

    pub(crate) fn list_calls(&self) -> Vec<ListNotesQuery> {
        self.list_calls.lock().expect("lock").clone()
    }

    pub(crate) fn list_searches(&self) -> Vec<String> {
        self.list_calls()
            .into_iter()
            .map(|query| query.search.unwrap_or_default())
            .collect()
    }

    pub(crate) fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn remaining_ids(&self) -> Vec<String> {
        self.notes
            .lock()
            .expect("lock")
            .iter()
            .map(|note| note.id.0.clone())
            .collect()
    }
}

fn unavailable(status: u16, message: &str) -> NotesClientError {
    NotesClientError::Api(ApiException::new(status, message))
}

#[async_trait]
impl NotesApi for FakeNotesApi {
    async fn fetch_notes(&self, query: ListNotesQuery) -> Result<NotesPage, NotesClientError> {
        self.list_calls.lock().expect("lock").push(query.clone());
        let response = self.list_page(&query);

        let gate = self.list_gate.lock().expect("lock").clone();
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate").forget();
        }
        response
    }

    async fn fetch_note(&self, id: &NoteId) -> Result<Note, NotesClientError> {
        self.notes
            .lock()
            .expect("lock")
            .iter()
            .find(|note| &note.id == id)
            .cloned()
            .ok_or_else(|| unavailable(404, "Note not found"))
    }

    async fn create_note(&self, draft: &NoteDraft) -> Result<Note, NotesClientError> {
        let n = self.create_calls.fetch_add(1, Ordering::SeqCst);
        let created = Note {
            id: NoteId::new(format!("created-{n}")),
            title: draft.title.clone(),
            content: draft.content.clone(),
            tag: draft.tag,
            created_at: None,
            updated_at: None,
        };
        self.notes.lock().expect("lock").insert(0, created.clone());
        Ok(created)
    }

    async fn delete_note(&self, id: &NoteId) -> Result<Note, NotesClientError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.delete_gate.lock().expect("lock").clone();
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate").forget();
        }

        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(unavailable(500, "delete failed"));
        }
        let mut notes = self.notes.lock().expect("lock");
        let index = notes
            .iter()
            .position(|note| &note.id == id)
            .ok_or_else(|| unavailable(404, "Note not found"))?;
        Ok(notes.remove(index))
    }
}

impl FakeNotesApi {
    /// Answers a list query from the notes as they are when the request arrives.
    fn list_page(&self, query: &ListNotesQuery) -> Result<NotesPage, NotesClientError> {
        let search = query.search.clone().unwrap_or_default();
        if self.failing_searches.lock().expect("lock").contains(&search) {
            return Err(unavailable(503, "notes service unavailable"));
        }

        let needle = search.to_lowercase();
        let matching: Vec<Note> = self
            .notes
            .lock()
            .expect("lock")
            .iter()
            .filter(|note| query.tag.map_or(true, |tag| note.tag == tag))
            .filter(|note| {
                needle.is_empty()
                    || note.title.to_lowercase().contains(&needle)
                    || note.content.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();

        let per_page = query.per_page.max(1) as usize;
        let total_pages = matching.len().div_ceil(per_page) as u32;
        let start = (query.page.saturating_sub(1) as usize) * per_page;
        let notes = matching.into_iter().skip(start).take(per_page).collect();
        Ok(NotesPage { notes, total_pages })
    }
}
