use std::{collections::HashMap, sync::Arc};

use shared::domain::{Note, NoteDraft, NoteId};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{info, warn};

use crate::{
    api::NotesApi,
    error::NotesClientError,
    notify::{Notification, Notifier},
    query_key::NOTES_NAMESPACE,
    NotesCache,
};

pub const DELETE_FAILED_MESSAGE: &str = "Failed to delete note.";
pub const CREATE_FAILED_MESSAGE: &str = "Failed to create note.";

/// Issues note mutations and keeps the list cache honest afterwards: a
/// successful mutation invalidates every cached list page.
pub struct NoteMutations {
    api: Arc<dyn NotesApi>,
    cache: NotesCache,
    notifier: Arc<dyn Notifier>,
    inflight_deletes: Mutex<HashMap<NoteId, usize>>,
}

impl NoteMutations {
    pub fn new(api: Arc<dyn NotesApi>, cache: NotesCache, notifier: Arc<dyn Notifier>) -> Arc<Self> {
        Arc::new(Self {
            api,
            cache,
            notifier,
            inflight_deletes: Mutex::new(HashMap::new()),
        })
    }

    /// Deletes a note. Overlapping deletes, even for the same id, are sent
    /// independently and each reports its own outcome.
    pub async fn delete_note(&self, id: &NoteId) -> Result<Note, NotesClientError> {
        let overlapping = {
            let mut inflight = self.inflight_deletes.lock().await;
            let count = inflight.entry(id.clone()).or_insert(0);
            *count += 1;
            *count > 1
        };
        if overlapping {
            warn!("notes: delete already in flight id={id}");
        }

        let result = self.api.delete_note(id).await;

        {
            let mut inflight = self.inflight_deletes.lock().await;
            if let Some(count) = inflight.get_mut(id) {
                *count -= 1;
                if *count == 0 {
                    inflight.remove(id);
                }
            }
        }

        match result {
            Ok(note) => {
                let invalidated = self.cache.invalidate_namespace(NOTES_NAMESPACE).await;
                info!("notes: deleted id={id} invalidated={invalidated}");
                self.notifier.notify(Notification::success(format!(
                    "Note \"{}\" deleted.",
                    note.title
                )));
                Ok(note)
            }
            Err(err) => {
                warn!("notes: delete failed id={id} error={err}");
                self.notifier.notify(Notification::error(DELETE_FAILED_MESSAGE));
                Err(err)
            }
        }
    }

    /// Fire-and-forget variant of [`NoteMutations::delete_note`].
    pub fn spawn_delete(self: &Arc<Self>, id: NoteId) -> JoinHandle<Result<Note, NotesClientError>> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.delete_note(&id).await })
    }

    pub async fn create_note(&self, draft: NoteDraft) -> Result<Note, NotesClientError> {
        let draft = NoteDraft {
            title: draft.title.trim().to_string(),
            ..draft
        };
        if draft.title.is_empty() {
            self.notifier.notify(Notification::error(CREATE_FAILED_MESSAGE));
            return Err(NotesClientError::InvalidDraft("title is required".into()));
        }

        match self.api.create_note(&draft).await {
            Ok(note) => {
                let invalidated = self.cache.invalidate_namespace(NOTES_NAMESPACE).await;
                info!("notes: created id={} invalidated={invalidated}", note.id);
                self.notifier.notify(Notification::success(format!(
                    "Note \"{}\" created.",
                    note.title
                )));
                Ok(note)
            }
            Err(err) => {
                warn!("notes: create failed error={err}");
                self.notifier.notify(Notification::error(CREATE_FAILED_MESSAGE));
                Err(err)
            }
        }
    }

    pub async fn inflight_delete_count(&self, id: &NoteId) -> usize {
        self.inflight_deletes
            .lock()
            .await
            .get(id)
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
#[path = "tests/mutation_tests.rs"]
mod tests;
