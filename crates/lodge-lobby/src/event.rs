//! Events a lobby reports to whoever is driving it.

use std::time::SystemTime;

use lodge_protocol::{
    ChatEntryType, DistanceTier, GameServer, MemberChange, MemberId,
    SessionCandidate, SessionId,
};
use lodge_session::Member;
use tokio::sync::mpsc;

/// Channel sender for delivering events out of a lobby.
pub type EventSender = mpsc::UnboundedSender<SessionEvent>;

/// The receiving end of a lobby's event stream.
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

/// A chat message as received, with its sender resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub session_id: SessionId,
    pub sender_id: MemberId,
    /// The sender's member record, if they are still known locally.
    pub sender: Option<Member>,
    /// The payload decoded as UTF-8 (invalid sequences replaced).
    pub text: String,
    pub entry_type: ChatEntryType,
    pub received_at: SystemTime,
}

/// Everything observable that happens in a lobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    // -- Lifecycle --
    /// This process created a session and owns it.
    SessionCreated { session_id: SessionId },
    SessionCreateFailed { reason: String },
    /// This process is now inside `session_id` and has its roster.
    SessionEntered { session_id: SessionId },
    JoinFailed { session_id: SessionId, reason: String },
    /// This process left `session_id` (on request or because the
    /// directory dropped it).
    SessionExited { session_id: SessionId },
    /// The owner asked this process to leave, or the directory kicked or
    /// banned it. Local tracking is already cleared.
    KickedFromSession { session_id: SessionId },
    /// The owner kicked itself, which is a plain leave.
    SelfKicked { session_id: SessionId },

    // -- Roster --
    MemberJoined(Member),
    MemberLeft { member_id: MemberId, cause: MemberChange },
    /// A member's declared data was refreshed.
    MemberDataChanged(Member),
    OwnershipChanged {
        previous: Option<MemberId>,
        owner: Member,
    },

    // -- Metadata and chat --
    /// Session metadata changed locally; `keys` lists what changed.
    SessionMetadataChanged {
        session_id: SessionId,
        keys: Vec<String>,
    },
    MetadataUpdateFailed { session_id: SessionId },
    ChatMessageReceived(ChatMessage),

    // -- Search --
    /// A search request went out. Quick match sends one per tier.
    SearchStarted { distance: Option<DistanceTier> },
    SearchResultsReady { candidates: Vec<SessionCandidate> },
    SearchFailed { reason: String },
    QuickMatchFailed,

    // -- Misc --
    GameServerSet {
        session_id: SessionId,
        server: GameServer,
    },
    /// Someone invited this process. The lobby never joins on its own.
    JoinRequested { session_id: SessionId, from: MemberId },
}

impl SessionEvent {
    /// A short, stable name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionCreated { .. } => "SessionCreated",
            Self::SessionCreateFailed { .. } => "SessionCreateFailed",
            Self::SessionEntered { .. } => "SessionEntered",
            Self::JoinFailed { .. } => "JoinFailed",
            Self::SessionExited { .. } => "SessionExited",
            Self::KickedFromSession { .. } => "KickedFromSession",
            Self::SelfKicked { .. } => "SelfKicked",
            Self::MemberJoined(_) => "MemberJoined",
            Self::MemberLeft { .. } => "MemberLeft",
            Self::MemberDataChanged(_) => "MemberDataChanged",
            Self::OwnershipChanged { .. } => "OwnershipChanged",
            Self::SessionMetadataChanged { .. } => "SessionMetadataChanged",
            Self::MetadataUpdateFailed { .. } => "MetadataUpdateFailed",
            Self::ChatMessageReceived(_) => "ChatMessageReceived",
            Self::SearchStarted { .. } => "SearchStarted",
            Self::SearchResultsReady { .. } => "SearchResultsReady",
            Self::SearchFailed { .. } => "SearchFailed",
            Self::QuickMatchFailed => "QuickMatchFailed",
            Self::GameServerSet { .. } => "GameServerSet",
            Self::JoinRequested { .. } => "JoinRequested",
        }
    }
}
