use serde::{Deserialize, Serialize};

use crate::domain::{Note, NoteTag};

/// One page of the notes list as returned by `GET /notes`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotesPage {
    pub notes: Vec<Note>,
    pub total_pages: u32,
}

impl NotesPage {
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

/// Query string of `GET /notes`. Empty search and absent tag are left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListNotesQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    pub page: u32,
    pub per_page: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<NoteTag>,
}

impl ListNotesQuery {
    pub fn new(search: &str, page: u32, per_page: u32, tag: Option<NoteTag>) -> Self {
        let search = search.trim();
        Self {
            search: (!search.is_empty()).then(|| search.to_string()),
            page,
            per_page,
            tag,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NoteId;

    #[test]
    fn decodes_camel_case_page_without_timestamps() {
        let raw = r#"{"notes":[{"id":"abc123","title":"Groceries","content":"milk","tag":"Shopping"}],"totalPages":3}"#;
        let page: NotesPage = serde_json::from_str(raw).expect("decode");
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.notes[0].id, NoteId::new("abc123"));
        assert_eq!(page.notes[0].tag, NoteTag::Shopping);
        assert!(page.notes[0].created_at.is_none());
    }

    #[test]
    fn list_query_omits_blank_search_and_missing_tag() {
        let query = ListNotesQuery::new("   ", 2, 12, None);
        let encoded = serde_json::to_value(&query).expect("encode");
        assert_eq!(encoded, serde_json::json!({ "page": 2, "perPage": 12 }));

        let query = ListNotesQuery::new(" milk ", 1, 12, Some(NoteTag::Todo));
        assert_eq!(query.search.as_deref(), Some("milk"));
        assert_eq!(query.tag, Some(NoteTag::Todo));
    }
}
