use std::fmt;

use shared::{domain::NoteTag, protocol::ListNotesQuery};

/// Namespace shared by every notes list query. Invalidating it marks all
/// list pages stale regardless of search, page or tag.
pub const NOTES_NAMESPACE: &str = "notes";

/// Keys the cache can group for namespace-wide invalidation.
pub trait CacheKey {
    fn namespace(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    search: String,
    page: u32,
    tag: Option<NoteTag>,
}

impl QueryKey {
    pub fn notes(search: impl Into<String>, page: u32, tag: Option<NoteTag>) -> Self {
        Self {
            search: search.into(),
            page,
            tag,
        }
    }

    /// Key of the server-rendered first page: empty search, page 1.
    pub fn initial(tag: Option<NoteTag>) -> Self {
        Self::notes(String::new(), 1, tag)
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn tag(&self) -> Option<NoteTag> {
        self.tag
    }

    pub fn to_list_query(&self, per_page: u32) -> ListNotesQuery {
        ListNotesQuery::new(&self.search, self.page, per_page, self.tag)
    }
}

impl CacheKey for QueryKey {
    fn namespace(&self) -> &str {
        NOTES_NAMESPACE
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {:?}, {}, {}]",
            NOTES_NAMESPACE,
            self.search,
            self.page,
            self.tag.map(NoteTag::as_str).unwrap_or("-")
        )
    }
}
