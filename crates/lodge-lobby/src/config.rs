//! Lobby configuration and state machine.

use std::fmt;

use lodge_protocol::{DistanceTier, Visibility};
use serde::{Deserialize, Serialize};

/// Largest session capacity the directory accepts.
pub const MAX_MEMBERS_LIMIT: u32 = 250;

// ---------------------------------------------------------------------------
// LobbyConfig
// ---------------------------------------------------------------------------

/// Configuration for a lobby.
///
/// `#[serde(default)]` lets a config file name only the fields it cares
/// about; everything else falls back to [`LobbyConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LobbyConfig {
    /// Capacity of sessions this lobby creates. Clamped to
    /// [`MAX_MEMBERS_LIMIT`].
    pub max_members: u32,

    /// The widest distance tier quick match may escalate to.
    pub max_distance: DistanceTier,

    /// Member-data keys synchronized per member from the start. More are
    /// declared on the fly by `set_member_metadata`.
    pub member_data_keys: Vec<String>,

    /// Visibility of sessions created through `create_session` when the
    /// caller doesn't pick one.
    pub visibility: Visibility,

    /// Capacity of the actor's command mailbox. Must be at least 1.
    pub mailbox_size: usize,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            max_members: 4,
            max_distance: DistanceTier::Default,
            member_data_keys: Vec::new(),
            visibility: Visibility::Public,
            mailbox_size: 64,
        }
    }
}

impl LobbyConfig {
    /// Returns a copy with out-of-range values pulled back into range.
    pub fn validated(mut self) -> Self {
        if self.max_members > MAX_MEMBERS_LIMIT {
            tracing::warn!(
                requested = self.max_members,
                limit = MAX_MEMBERS_LIMIT,
                "max_members out of range, clamping"
            );
            self.max_members = MAX_MEMBERS_LIMIT;
        }
        if self.mailbox_size == 0 {
            tracing::warn!("mailbox_size of 0 is not allowed, using 1");
            self.mailbox_size = 1;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// LobbyState
// ---------------------------------------------------------------------------

/// The coarse lifecycle state of a lobby.
///
/// ```text
///            create_session            SessionCreated
///   NoSession ─────────────→ Creating ───────────────→ InSession
///       │                       │                         │
///       │ join_session          │ SessionCreateFailed     │ leave / kicked
///       ↓                       ↓                         ↓
///    Joining ──SessionEntered──→ InSession            NoSession
///       │
///       └──JoinFailed──→ NoSession
/// ```
///
/// There is no terminal error state: every failure lands back in
/// `NoSession`. Leaving is immediate on the local side, so there is no
/// separate "leaving" state either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LobbyState {
    #[default]
    NoSession,
    Creating,
    Joining,
    InSession,
}

impl LobbyState {
    /// Returns `true` while a create or join is waiting on the directory.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Creating | Self::Joining)
    }
}

impl fmt::Display for LobbyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSession => write!(f, "NoSession"),
            Self::Creating => write!(f, "Creating"),
            Self::Joining => write!(f, "Joining"),
            Self::InSession => write!(f, "InSession"),
        }
    }
}
