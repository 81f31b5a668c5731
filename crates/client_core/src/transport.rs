//! `reqwest` implementation of [`NotesApi`] against the JSON notes API.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Note, NoteDraft, NoteId},
    error::ApiException,
    protocol::{ListNotesQuery, NotesPage},
};
use tracing::{info, warn};
use url::Url;

use crate::{api::NotesApi, config::normalize_api_base_url, error::NotesClientError};

pub struct HttpNotesApi {
    http: Client,
    base_url: Url,
}

impl HttpNotesApi {
    pub fn new(base_url: &str) -> Result<Self, NotesClientError> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> Result<Self, NotesClientError> {
        let normalized = normalize_api_base_url(base_url);
        let base_url =
            Url::parse(&normalized).map_err(|source| NotesClientError::InvalidBaseUrl {
                url: normalized.clone(),
                source,
            })?;
        if base_url.cannot_be_a_base() {
            return Err(NotesClientError::CannotBeABase(normalized));
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, NotesClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| NotesClientError::CannotBeABase(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

async fn decode<T: DeserializeOwned>(res: Response) -> Result<T, NotesClientError> {
    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        let err = ApiException::from_body(status.as_u16(), &body);
        warn!("notes api: status={} message={}", err.status, err.message);
        return Err(err.into());
    }
    Ok(res.json::<T>().await?)
}

#[async_trait]
impl NotesApi for HttpNotesApi {
    async fn fetch_notes(&self, query: ListNotesQuery) -> Result<NotesPage, NotesClientError> {
        let url = self.endpoint(&["notes"])?;
        info!(
            "notes api: list page={} search={:?} tag={:?}",
            query.page, query.search, query.tag
        );
        let res = self.http.get(url).query(&query).send().await?;
        decode(res).await
    }

    async fn fetch_note(&self, id: &NoteId) -> Result<Note, NotesClientError> {
        let url = self.endpoint(&["notes", id.as_str()])?;
        let res = self.http.get(url).send().await?;
        decode(res).await
    }

    async fn create_note(&self, draft: &NoteDraft) -> Result<Note, NotesClientError> {
        let url = self.endpoint(&["notes"])?;
        info!("notes api: create tag={}", draft.tag);
        let res = self.http.post(url).json(draft).send().await?;
        decode(res).await
    }

    async fn delete_note(&self, id: &NoteId) -> Result<Note, NotesClientError> {
        let url = self.endpoint(&["notes", id.as_str()])?;
        info!("notes api: delete id={id}");
        let res = self.http.delete(url).send().await?;
        decode(res).await
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
