//! Error types for the lobby layer.

/// Errors from talking to a lobby actor.
///
/// Lobby operations themselves never fail with an error: a refused
/// request is reported as `false` plus a `*Failed` event. The only thing
/// that can go wrong at this level is the actor being gone.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    /// The lobby's mailbox is closed (the actor has shut down).
    #[error("lobby is unavailable")]
    Unavailable,

    /// The actor dropped the reply channel without answering.
    #[error("lobby dropped the reply to {0}")]
    NoReply(&'static str),
}
