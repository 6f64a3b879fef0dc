//! Error types for starting a search.

use lodge_directory::DirectoryError;

/// Why a search could not be started.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    /// Another search is still in flight. Searches never queue; the caller
    /// must wait for it to finish or cancel it.
    #[error("a search is already in progress")]
    Busy,

    /// The directory refused the search request outright.
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}
