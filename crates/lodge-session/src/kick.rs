//! The soft-kick list.
//!
//! The directory has no kick primitive that works for every session type,
//! so removal is cooperative: the owner writes the target's identity into
//! the reserved session metadata key [`KICK_LIST_KEY`], and every process
//! that sees its own identity there leaves on its own.
//!
//! The encoding is a run of bracketed raw identities:
//!
//! ```text
//! "[17][42]"   →   { M-17, M-42 }
//! ```
//!
//! Any process may read a half-written or corrupted value, so decoding
//! never fails: fragments that don't parse are skipped, and an unmatched
//! bracket simply means "nobody here".

use std::fmt;

use lodge_protocol::MemberId;

/// Session metadata key holding the encoded kick list.
pub const KICK_LIST_KEY: &str = "_kick_list";

/// The set of members asked to leave, in the order they were added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KickList {
    members: Vec<MemberId>,
}

impl KickList {
    /// Parses an encoded kick list, ignoring anything malformed.
    pub fn decode(raw: &str) -> Self {
        let mut list = Self::default();
        let mut rest = raw;
        while let Some(open) = rest.find('[') {
            let after = &rest[open + 1..];
            let Some(close) = after.find(']') else {
                break;
            };
            let mut inner = &after[..close];
            // "[[42]": the first bracket was never closed, only "[42]" counts.
            if let Some(reopen) = inner.rfind('[') {
                inner = &inner[reopen + 1..];
            }
            match inner.parse::<MemberId>() {
                Ok(member) => {
                    list.insert(member);
                }
                Err(_) => tracing::trace!(fragment = inner, "skipping kick-list fragment"),
            }
            rest = &after[close + 1..];
        }
        list
    }

    /// Renders the list in its metadata form. Empty lists encode as `""`.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    pub fn contains(&self, member: MemberId) -> bool {
        self.members.contains(&member)
    }

    /// Adds `member` if absent. Returns `true` if the list changed.
    pub fn insert(&mut self, member: MemberId) -> bool {
        if self.contains(member) {
            return false;
        }
        self.members.push(member);
        true
    }

    /// Removes `member` if present. Returns `true` if the list changed.
    pub fn remove(&mut self, member: MemberId) -> bool {
        let before = self.members.len();
        self.members.retain(|m| *m != member);
        self.members.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = MemberId> + '_ {
        self.members.iter().copied()
    }
}

impl fmt::Display for KickList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for member in &self.members {
            write!(f, "[{}]", member.0)?;
        }
        Ok(())
    }
}
