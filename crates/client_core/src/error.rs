use shared::{
    domain::UnknownTag,
    error::{ApiException, ErrorCode},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotesClientError {
    #[error("notes api request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("notes api rejected request: {0}")]
    Api(#[from] ApiException),
    #[error("invalid api base url '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("api base url '{0}' cannot carry path segments")]
    CannotBeABase(String),
    #[error("page must be at least 1, got {0}")]
    InvalidPage(u32),
    #[error("invalid note draft: {0}")]
    InvalidDraft(String),
    #[error(transparent)]
    UnknownTag(#[from] UnknownTag),
}

impl NotesClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            NotesClientError::Api(err) => Some(err.status),
            NotesClientError::Transport(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }

    /// API error kind, when the failure came back from the server.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            NotesClientError::Api(err) => Some(err.code),
            NotesClientError::Transport(err) => err
                .status()
                .map(|status| ErrorCode::from_status(status.as_u16())),
            _ => None,
        }
    }
}

/// Cloneable failure stored in the query cache and handed to every waiter
/// of a shared fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct QueryError {
    pub status: Option<u16>,
    pub code: Option<ErrorCode>,
    pub message: String,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: None,
            message: message.into(),
        }
    }
}

impl From<NotesClientError> for QueryError {
    fn from(value: NotesClientError) -> Self {
        Self {
            status: value.status(),
            code: value.code(),
            message: value.to_string(),
        }
    }
}
