//! The local view of the tracked session.
//!
//! A [`SessionView`] is the single place where a process keeps what it
//! believes about its current session: id, name, owner, members and
//! metadata. It is owned by exactly one writer (the lobby), and callers
//! outside that writer only ever get read access.
//!
//! The reconciliation operations that update a view from directory state
//! live in the `reconcile` module; this module holds the data and its
//! direct accessors.

use std::collections::{BTreeSet, HashMap};

use lodge_protocol::{MemberId, SessionId};

use crate::{KICK_LIST_KEY, KickList, Member, MetadataStore};

/// Session metadata key mirroring the session's display name.
pub const NAME_KEY: &str = "name";

/// Everything the local process knows about its current session.
///
/// Invariants:
/// - `id` is [`SessionId::NIL`] ⇒ no members, no owner, no metadata.
/// - once tracking a session with a known owner, the owner is in `members`.
#[derive(Debug, Clone, Default)]
pub struct SessionView {
    pub(crate) id: SessionId,
    pub(crate) name: String,
    pub(crate) owner: Option<MemberId>,
    pub(crate) members: HashMap<MemberId, Member>,
    pub(crate) metadata: MetadataStore,
    /// Member-data keys that are synchronized per member. Survives
    /// leaving a session.
    pub(crate) member_keys: BTreeSet<String>,
}

impl SessionView {
    /// An untracked view with the given declared member-data keys.
    pub fn new<I, K>(member_keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            member_keys: member_keys.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    // -- Tracking --

    /// Starts tracking `session`. If it differs from the current one,
    /// everything known about the old session is dropped first.
    pub fn track(&mut self, session: SessionId) {
        if self.id != session {
            self.reset();
            self.id = session;
        }
    }

    /// Forgets the current session entirely.
    pub fn clear(&mut self) {
        self.reset();
        self.id = SessionId::NIL;
    }

    fn reset(&mut self) {
        self.name.clear();
        self.owner = None;
        self.members.clear();
        self.metadata.clear();
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Returns `true` while a session is tracked.
    pub fn has_session(&self) -> bool {
        !self.id.is_nil()
    }

    /// Returns `true` if `session` is the tracked session (and not nil).
    pub fn is_tracking(&self, session: SessionId) -> bool {
        self.has_session() && self.id == session
    }

    // -- Name and metadata --

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    /// Writes one session metadata value locally. Writing [`NAME_KEY`]
    /// also updates the cached name. An empty value deletes the key, the
    /// same way the directory treats it.
    pub fn set_metadata(&mut self, key: &str, value: &str) -> bool {
        if key == NAME_KEY {
            self.name = value.to_string();
        }
        if value.is_empty() {
            return self.metadata.remove(key).is_some();
        }
        self.metadata.set(key, value)
    }

    /// The current kick list, decoded from metadata.
    pub fn kick_list(&self) -> KickList {
        self.metadata
            .get(KICK_LIST_KEY)
            .map(KickList::decode)
            .unwrap_or_default()
    }

    /// Stores `list` into metadata and returns the encoded value to
    /// publish.
    pub fn store_kick_list(&mut self, list: &KickList) -> String {
        let encoded = list.encode();
        self.set_metadata(KICK_LIST_KEY, &encoded);
        encoded
    }

    // -- Members --

    pub fn owner(&self) -> Option<MemberId> {
        self.owner
    }

    pub fn owner_member(&self) -> Option<&Member> {
        self.owner.and_then(|id| self.members.get(&id))
    }

    /// Returns `true` if `member` is the tracked owner.
    pub fn is_owned_by(&self, member: MemberId) -> bool {
        self.has_session() && self.owner == Some(member)
    }

    pub fn member(&self, id: MemberId) -> Option<&Member> {
        self.members.get(&id)
    }

    pub fn contains_member(&self, id: MemberId) -> bool {
        self.members.contains_key(&id)
    }

    /// Members in no particular order.
    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Makes `owner` the owner of a freshly created session, with itself
    /// as the only member.
    pub fn claim(&mut self, owner: Member) {
        self.owner = Some(owner.id);
        self.members.clear();
        self.members.insert(owner.id, owner);
    }

    /// Writes one declared member-data value for `member` locally,
    /// creating the record if needed.
    pub fn set_member_data(
        &mut self,
        member: MemberId,
        display_name: impl FnOnce() -> String,
        key: &str,
        value: &str,
    ) -> bool {
        self.members
            .entry(member)
            .or_insert_with(|| Member::new(member, display_name()))
            .data
            .set(key, value)
    }

    // -- Declared member keys --

    /// Declares `key` as synchronized per member. Returns `true` if it was
    /// new.
    pub fn declare_member_key(&mut self, key: &str) -> bool {
        self.member_keys.insert(key.to_string())
    }

    pub fn member_keys(&self) -> impl Iterator<Item = &str> {
        self.member_keys.iter().map(String::as_str)
    }
}
