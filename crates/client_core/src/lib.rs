use std::sync::Arc;

use shared::{domain::NoteTag, protocol::NotesPage};
use tokio::sync::broadcast;

pub mod api;
pub mod cache;
pub mod config;
pub mod debounce;
pub mod error;
pub mod mutation;
pub mod notify;
pub mod orchestrator;
pub mod query_key;
pub mod render;
pub mod transport;

pub use api::NotesApi;
pub use cache::{CacheEvent, CachedQuery, QueryCache};
pub use config::{load_settings, load_settings_file, ClientSettings};
pub use debounce::Debouncer;
pub use error::{NotesClientError, QueryError};
pub use mutation::NoteMutations;
pub use notify::{BroadcastNotifier, Notification, NotificationLevel, Notifier};
pub use orchestrator::{ListSnapshot, NotesOrchestrator, OrchestratorOptions, QueryStatus, SyncOutcome};
pub use query_key::{QueryKey, NOTES_NAMESPACE};
pub use render::{render_list, ListView, NoteRow, Pagination};
pub use transport::HttpNotesApi;

pub type NotesCache = QueryCache<QueryKey, NotesPage>;

/// Wires one API handle, one cache and one notification channel together.
/// Lists mounted from the same client share the cache, so a mutation made
/// through [`NotesClient::mutations`] refreshes all of them.
pub struct NotesClient {
    settings: ClientSettings,
    api: Arc<dyn NotesApi>,
    cache: NotesCache,
    notifications: Arc<BroadcastNotifier>,
    mutations: Arc<NoteMutations>,
}

impl NotesClient {
    pub fn new(settings: ClientSettings) -> Result<Self, NotesClientError> {
        let api = Arc::new(HttpNotesApi::new(&settings.api_base_url)?);
        Ok(Self::with_api(settings, api))
    }

    pub fn with_api(settings: ClientSettings, api: Arc<dyn NotesApi>) -> Self {
        let cache = NotesCache::new();
        let notifications = Arc::new(BroadcastNotifier::new(settings.notification_capacity));
        let mutations = NoteMutations::new(
            Arc::clone(&api),
            cache.clone(),
            Arc::clone(&notifications) as Arc<dyn Notifier>,
        );
        Self {
            settings,
            api,
            cache,
            notifications,
            mutations,
        }
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn api(&self) -> Arc<dyn NotesApi> {
        Arc::clone(&self.api)
    }

    pub fn cache(&self) -> &NotesCache {
        &self.cache
    }

    pub fn mutations(&self) -> Arc<NoteMutations> {
        Arc::clone(&self.mutations)
    }

    pub fn subscribe_notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    pub async fn mount_list(
        &self,
        tag: Option<NoteTag>,
        initial: Option<NotesPage>,
    ) -> Arc<NotesOrchestrator> {
        NotesOrchestrator::mount(
            Arc::clone(&self.api),
            self.cache.clone(),
            OrchestratorOptions::from(&self.settings),
            tag,
            initial,
        )
        .await
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
