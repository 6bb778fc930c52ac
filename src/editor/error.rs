use crate::api::{ApiError, ApiErrorKind};
use crate::storage::StorageError;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub(crate) enum EditorError {
    /// Blocks a save before any network call.
    #[error("{0}")]
    Validation(String),
    #[error("Your session has expired. Please sign in again.")]
    AuthExpired,
    #[error("Note not found.")]
    NotFound,
    #[error("Suggestions unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("Draft could not be stored locally: {0}")]
    Storage(#[from] StorageError),
    #[error("{0}")]
    Network(String),
    #[error("The editor has been closed.")]
    Closed,
    /// Editing and saving wait until the note has been loaded.
    #[error("The note has not been loaded yet.")]
    NotLoaded,
    #[error("A save or delete is already in progress.")]
    Busy,
}

impl From<ApiError> for EditorError {
    fn from(e: ApiError) -> Self {
        match e.kind {
            ApiErrorKind::Unauthorized => Self::AuthExpired,
            ApiErrorKind::NotFound => Self::NotFound,
            ApiErrorKind::Network | ApiErrorKind::Http | ApiErrorKind::Parse => {
                Self::Network(e.message)
            }
        }
    }
}
