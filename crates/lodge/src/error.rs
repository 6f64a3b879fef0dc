//! Unified error type for Lodge.

use lodge_directory::DirectoryError;
use lodge_lobby::LobbyError;
use lodge_matchmaking::SearchError;
use lodge_protocol::ProtocolError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `lodge` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attributes let `?` convert sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum LodgeError {
    /// A protocol value could not be parsed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The directory refused a request outright.
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// A search could not be started.
    #[error(transparent)]
    Search(#[from] SearchError),

    /// The lobby actor is gone.
    #[error(transparent)]
    Lobby(#[from] LobbyError),
}
