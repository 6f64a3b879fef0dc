use lodge_protocol::{MemberId, SessionId};

/// Errors a session directory can report synchronously, when a request is
/// refused before it is even queued.
///
/// Failures that happen later are delivered as pushes instead
/// (`JoinFailed`, `SessionListFailed`, ...).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    /// The directory does not know this session.
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    /// The caller is not a member of the session.
    #[error("{0} is not a member of session {1}")]
    NotAMember(MemberId, SessionId),

    /// The operation is reserved for the session owner.
    #[error("{0} does not own session {1}")]
    NotOwner(MemberId, SessionId),

    /// The request was malformed or refused for another reason.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The directory cannot be reached.
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}
