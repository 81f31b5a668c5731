//! Pure derivation of the list view from an orchestrator snapshot.

use shared::domain::{NoteId, NoteTag};

use crate::orchestrator::{ListSnapshot, QueryStatus};

pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong while loading notes.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteRow {
    pub id: NoteId,
    pub title: String,
    pub content: String,
    pub tag: NoteTag,
    pub detail_href: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub total_pages: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListView {
    Loading,
    Error { message: String },
    /// The query succeeded with no matching notes.
    Empty,
    Notes {
        rows: Vec<NoteRow>,
        /// Overlay a loading indicator on top of the rows.
        refreshing: bool,
        pagination: Option<Pagination>,
    },
}

pub fn detail_href(id: &NoteId) -> String {
    format!("/notes/{id}")
}

pub fn render_list(snapshot: &ListSnapshot) -> ListView {
    match snapshot.status {
        QueryStatus::Error => ListView::Error {
            message: snapshot
                .error
                .as_ref()
                .map(|err| err.message.clone())
                .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string()),
        },
        QueryStatus::Loading => ListView::Loading,
        QueryStatus::Success => match &snapshot.data {
            None => ListView::Loading,
            Some(page) if page.is_empty() => ListView::Empty,
            Some(page) => ListView::Notes {
                rows: page
                    .notes
                    .iter()
                    .map(|note| NoteRow {
                        id: note.id.clone(),
                        title: note.title.clone(),
                        content: note.content.clone(),
                        tag: note.tag,
                        detail_href: detail_href(&note.id),
                    })
                    .collect(),
                refreshing: snapshot.is_background_fetching(),
                pagination: (page.total_pages > 1).then_some(Pagination {
                    page: snapshot.page(),
                    total_pages: page.total_pages,
                }),
            },
        },
    }
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
