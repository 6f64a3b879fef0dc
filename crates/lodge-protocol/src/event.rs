//! Backend pushes: everything the session directory can tell us unasked.
//!
//! The directory answers requests asynchronously and also pushes changes
//! made by other members. Rather than one callback per payload shape, all
//! of them are variants of a single [`BackendEvent`] enum that the lobby
//! dispatches through one ingress function.

use serde::{Deserialize, Serialize};

use crate::{
    ChatEntryType, GameServer, MemberChange, MemberId, RequestId,
    SessionCandidate, SessionId,
};

/// A push from the session directory.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON:
///   `{ "type": "SessionEntered", "session_id": 7 }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BackendEvent {
    // -- Request completions --

    /// A create request succeeded. The local user is the owner.
    SessionCreated { session_id: SessionId },

    /// A create request failed.
    SessionCreateFailed { reason: String },

    /// The local user is now inside `session_id` (after a join or create).
    SessionEntered { session_id: SessionId },

    /// A join request failed (full, closed, no longer exists, ...).
    JoinFailed { session_id: SessionId, reason: String },

    /// A session-list request completed.
    SessionListReady {
        request: RequestId,
        candidates: Vec<SessionCandidate>,
    },

    /// A session-list request failed at the directory.
    SessionListFailed { request: RequestId, reason: String },

    // -- Changes made by anyone in the session --

    /// A member entered or left `session_id`.
    MemberChanged {
        session_id: SessionId,
        member_id: MemberId,
        change: MemberChange,
    },

    /// Metadata changed. `member_id` is `None` for session-level metadata
    /// and `Some` for one member's data.
    MetadataChanged {
        session_id: SessionId,
        member_id: Option<MemberId>,
    },

    /// A metadata write was rejected by the directory.
    MetadataUpdateFailed { session_id: SessionId },

    /// A chat datagram arrived in `session_id`.
    ChatReceived {
        session_id: SessionId,
        sender_id: MemberId,
        data: Vec<u8>,
        entry_type: ChatEntryType,
    },

    /// The owner attached game-server details to the session.
    GameServerSet {
        session_id: SessionId,
        server: GameServer,
    },

    /// Someone invited the local user into `session_id`.
    JoinRequested {
        session_id: SessionId,
        from: MemberId,
    },
}

impl BackendEvent {
    /// The session this push concerns, if it is tied to one.
    ///
    /// Search results and create failures aren't tied to any session.
    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            Self::SessionCreated { session_id }
            | Self::SessionEntered { session_id }
            | Self::JoinFailed { session_id, .. }
            | Self::MemberChanged { session_id, .. }
            | Self::MetadataChanged { session_id, .. }
            | Self::MetadataUpdateFailed { session_id }
            | Self::ChatReceived { session_id, .. }
            | Self::GameServerSet { session_id, .. }
            | Self::JoinRequested { session_id, .. } => Some(*session_id),
            Self::SessionCreateFailed { .. }
            | Self::SessionListReady { .. }
            | Self::SessionListFailed { .. } => None,
        }
    }

    /// A short, stable name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionCreated { .. } => "SessionCreated",
            Self::SessionCreateFailed { .. } => "SessionCreateFailed",
            Self::SessionEntered { .. } => "SessionEntered",
            Self::JoinFailed { .. } => "JoinFailed",
            Self::SessionListReady { .. } => "SessionListReady",
            Self::SessionListFailed { .. } => "SessionListFailed",
            Self::MemberChanged { .. } => "MemberChanged",
            Self::MetadataChanged { .. } => "MetadataChanged",
            Self::MetadataUpdateFailed { .. } => "MetadataUpdateFailed",
            Self::ChatReceived { .. } => "ChatReceived",
            Self::GameServerSet { .. } => "GameServerSet",
            Self::JoinRequested { .. } => "JoinRequested",
        }
    }
}
