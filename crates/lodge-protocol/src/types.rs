//! Core protocol types shared by every Lodge crate.
//!
//! These are the values that cross the boundary between the session core
//! and the session directory: identities, search results, and the small
//! enums that classify pushes.

use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// An opaque identifier for a session hosted by the directory.
///
/// Newtype wrapper around `u64` so a `SessionId` can never be passed where
/// a `MemberId` is expected. [`SessionId::NIL`] means "not tracking any
/// session"; the directory never hands it out for a real session.
///
/// `#[serde(transparent)]` serializes this as the bare number.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
    Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl SessionId {
    /// The "no session" sentinel.
    pub const NIL: SessionId = SessionId(0);

    /// Returns `true` if this is the [`NIL`](Self::NIL) sentinel.
    pub fn is_nil(self) -> bool {
        self == Self::NIL
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// A stable, globally unique user identity supplied by the identity
/// provider.
///
/// Display prints `M-42`; the raw number (used inside metadata strings
/// such as the kick list) is available through `.0` or [`FromStr`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct MemberId(pub u64);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M-{}", self.0)
    }
}

/// Parses the raw numeric form (`"42"`), which is how identities are
/// written into string metadata. Surrounding whitespace is not accepted.
impl FromStr for MemberId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // `u64::from_str` accepts a leading '+', which would let "[+42]"
        // alias "[42]" in the kick list. Only plain digits are valid ids.
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ProtocolError::InvalidId(s.to_string()));
        }
        s.parse::<u64>()
            .map(MemberId)
            .map_err(|_| ProtocolError::InvalidId(s.to_string()))
    }
}

/// Correlates an asynchronous search request with its result push.
///
/// The directory returns one of these from every session-list request and
/// echoes it back in [`BackendEvent::SessionListReady`](crate::BackendEvent).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Visibility
// ---------------------------------------------------------------------------

/// Who can discover and join a session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "PascalCase")]
pub enum Visibility {
    /// Only joinable by invitation.
    Private,
    /// Joinable by friends of members; not listed in searches.
    FriendsOnly,
    /// Listed in searches and joinable by anyone.
    #[default]
    Public,
    /// Joinable by id but never listed.
    Invisible,
}

impl Visibility {
    /// Returns `true` if sessions with this visibility appear in searches.
    pub fn is_listed(self) -> bool {
        matches!(self, Self::Public)
    }
}

// ---------------------------------------------------------------------------
// MemberChange — why a member appeared or disappeared
// ---------------------------------------------------------------------------

/// The kind of membership change carried by a `MemberChanged` push.
///
/// `Entered` is the only arrival; the other four are all departures and
/// are treated identically by membership bookkeeping (the cause is only
/// reported onwards).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "PascalCase")]
pub enum MemberChange {
    Entered,
    Left,
    Disconnected,
    Kicked,
    Banned,
}

impl MemberChange {
    /// Returns `true` for every variant except [`Entered`](Self::Entered).
    pub fn is_departure(self) -> bool {
        !matches!(self, Self::Entered)
    }
}

impl fmt::Display for MemberChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Entered => "entered",
            Self::Left => "left",
            Self::Disconnected => "disconnected",
            Self::Kicked => "kicked",
            Self::Banned => "banned",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ChatEntryType
// ---------------------------------------------------------------------------

/// How the directory classified a received chat datagram.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "PascalCase")]
pub enum ChatEntryType {
    /// An ordinary text message.
    #[default]
    Message,
    /// An emote ("/me waves").
    Emote,
    /// A typing indicator with no meaningful payload.
    Typing,
    /// An invitation to a game.
    InviteGame,
    /// A message generated by the directory itself.
    System,
}

// ---------------------------------------------------------------------------
// GameServer — opaque connection info the directory stores for a session
// ---------------------------------------------------------------------------

/// Connection details attached to a session by its owner.
///
/// Lodge never connects to this address; it only stores and forwards it.
/// Either the address or the server id (or both) may be set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameServer {
    /// IPv4 address of the server, if it has a public address.
    pub ip: Option<Ipv4Addr>,
    /// Port of the server (0 when only `server_id` is meaningful).
    pub port: u16,
    /// Identity of the hosting member or dedicated server, if any.
    pub server_id: Option<MemberId>,
}

impl GameServer {
    /// A peer-hosted server: connect to `host` through the directory's
    /// relay rather than by address.
    pub fn hosted_by(host: MemberId) -> Self {
        Self {
            ip: None,
            port: 0,
            server_id: Some(host),
        }
    }

    /// A dedicated server reachable at `ip:port`.
    pub fn at(ip: Ipv4Addr, port: u16) -> Self {
        Self {
            ip: Some(ip),
            port,
            server_id: None,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionCandidate — one row of a search result
// ---------------------------------------------------------------------------

/// A session returned by a search.
///
/// Candidates are ephemeral: they describe what the directory saw at
/// search time and are discarded once presented or acted on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCandidate {
    /// The session's id (pass to `join_session`).
    pub id: SessionId,
    /// The owner at search time, if the directory reported one.
    pub owner_id: Option<MemberId>,
    /// Capacity of the session.
    pub max_slots: u32,
    /// Full snapshot of the session's public metadata.
    pub metadata: BTreeMap<String, String>,
}

impl SessionCandidate {
    /// Metadata key under which a session's display name is published.
    pub const NAME_KEY: &'static str = "name";

    /// Creates a candidate with no metadata.
    pub fn new(id: SessionId, owner_id: Option<MemberId>, max_slots: u32) -> Self {
        Self {
            id,
            owner_id,
            max_slots,
            metadata: BTreeMap::new(),
        }
    }

    /// The session's advertised name, if any.
    pub fn name(&self) -> Option<&str> {
        self.metadata.get(Self::NAME_KEY).map(String::as_str)
    }

    /// Looks up one metadata value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_nil_is_default() {
        assert_eq!(SessionId::default(), SessionId::NIL);
        assert!(SessionId::NIL.is_nil());
        assert!(!SessionId(5).is_nil());
    }

    #[test]
    fn test_ids_serialize_as_plain_number() {
        assert_eq!(serde_json::to_string(&SessionId(9)).unwrap(), "9");
        assert_eq!(serde_json::to_string(&MemberId(42)).unwrap(), "42");
        assert_eq!(serde_json::to_string(&RequestId(3)).unwrap(), "3");
    }

    #[test]
    fn test_ids_display() {
        assert_eq!(SessionId(9).to_string(), "S-9");
        assert_eq!(MemberId(42).to_string(), "M-42");
        assert_eq!(RequestId(3).to_string(), "Q-3");
    }

    #[test]
    fn test_member_id_from_str_accepts_digits() {
        assert_eq!("17".parse::<MemberId>(), Ok(MemberId(17)));
    }

    #[test]
    fn test_member_id_from_str_rejects_non_digits() {
        for bad in ["", "+4", "-1", " 4", "4x", "M-4"] {
            assert!(
                bad.parse::<MemberId>().is_err(),
                "{bad:?} should not parse"
            );
        }
    }

    #[test]
    fn test_member_id_from_str_rejects_overflow() {
        let too_big = "99999999999999999999999";
        assert_eq!(
            too_big.parse::<MemberId>(),
            Err(ProtocolError::InvalidId(too_big.to_string()))
        );
    }

    #[test]
    fn test_member_change_is_departure() {
        assert!(!MemberChange::Entered.is_departure());
        assert!(MemberChange::Left.is_departure());
        assert!(MemberChange::Disconnected.is_departure());
        assert!(MemberChange::Kicked.is_departure());
        assert!(MemberChange::Banned.is_departure());
    }

    #[test]
    fn test_visibility_only_public_is_listed() {
        assert!(Visibility::Public.is_listed());
        assert!(!Visibility::Private.is_listed());
        assert!(!Visibility::FriendsOnly.is_listed());
        assert!(!Visibility::Invisible.is_listed());
    }

    #[test]
    fn test_candidate_name_reads_metadata() {
        let mut c = SessionCandidate::new(SessionId(1), Some(MemberId(2)), 4);
        assert_eq!(c.name(), None);
        c.metadata.insert("name".into(), "Friday night".into());
        assert_eq!(c.name(), Some("Friday night"));
    }

    #[test]
    fn test_game_server_constructors() {
        let hosted = GameServer::hosted_by(MemberId(8));
        assert_eq!(hosted.server_id, Some(MemberId(8)));
        assert_eq!(hosted.ip, None);

        let dedicated = GameServer::at(Ipv4Addr::new(10, 0, 0, 1), 27015);
        assert_eq!(dedicated.port, 27015);
        assert_eq!(dedicated.server_id, None);
    }
}
