//! Membership reconciliation.
//!
//! The directory is the source of truth for who is in a session, who owns
//! it, and what everyone's data is. Pushes only say *that* something
//! changed; the operations here re-read the authoritative state through
//! [`SessionDirectory`] and diff it against the [`SessionView`], returning
//! one [`RosterEvent`] per observable change.
//!
//! Reconciliation never emits anything itself. The caller (the lobby)
//! turns roster events into public events, which keeps these operations
//! testable without an actor or channel.
//!
//! Duplicate arrivals replace the member record in place: `Joined` is
//! reported only the first time a member is seen, `DataChanged` every time.

use lodge_directory::SessionDirectory;
use lodge_protocol::{MemberChange, MemberId, SessionId};

use crate::{IdentityProvider, Member, NAME_KEY, SessionView};

/// One observable change to the tracked roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterEvent {
    /// A member was seen for the first time.
    Joined(MemberId),
    /// A member departed.
    Left { member: MemberId, cause: MemberChange },
    /// A member's declared data was refreshed.
    DataChanged(MemberId),
    /// The owner changed from `previous` to `current`.
    OwnershipChanged {
        previous: Option<MemberId>,
        current: MemberId,
    },
}

/// The outcome of processing one departure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Departure {
    pub events: Vec<RosterEvent>,
    /// The departed member was stripped from the local kick list. The
    /// owner should publish the new list.
    pub kick_list_changed: bool,
    /// Ownership moved as part of this departure. The caller should not
    /// run its own owner-change handling again for the same push.
    pub owner_changed: bool,
}

impl SessionView {
    /// Rebuilds the roster and metadata from the directory's state for
    /// `session`.
    ///
    /// Switching to a different session clears the view first. Members
    /// the directory no longer lists are dropped with a `Left` event.
    pub fn resync<D, I>(
        &mut self,
        session: SessionId,
        directory: &D,
        identity: &I,
    ) -> Vec<RosterEvent>
    where
        D: SessionDirectory + ?Sized,
        I: IdentityProvider + ?Sized,
    {
        self.track(session);
        let mut events = Vec::new();

        let authoritative = directory.session_members(session);
        let stale: Vec<MemberId> = self
            .members
            .keys()
            .filter(|id| !authoritative.contains(id))
            .copied()
            .collect();
        for member in stale {
            self.members.remove(&member);
            tracing::trace!(%session, %member, "pruned member missing from directory");
            events.push(RosterEvent::Left {
                member,
                cause: MemberChange::Left,
            });
        }

        for member in authoritative {
            self.upsert(member, directory, identity, &mut events);
        }

        let previous = self.owner;
        if let Some(owner) = directory.session_owner(session) {
            if !self.members.contains_key(&owner) {
                self.upsert(owner, directory, identity, &mut events);
            }
            self.owner = Some(owner);
            if previous.is_some_and(|p| p != owner) {
                events.push(RosterEvent::OwnershipChanged {
                    previous,
                    current: owner,
                });
            }
        }

        self.refresh_metadata(directory);
        events
    }

    /// Handles a member entering the tracked session.
    ///
    /// Pushes for any other session are ignored.
    pub fn process_arrival<D, I>(
        &mut self,
        session: SessionId,
        member: MemberId,
        directory: &D,
        identity: &I,
    ) -> Vec<RosterEvent>
    where
        D: SessionDirectory + ?Sized,
        I: IdentityProvider + ?Sized,
    {
        if !self.is_tracking(session) {
            tracing::debug!(%session, %member, "arrival for untracked session ignored");
            return Vec::new();
        }
        let mut events = Vec::new();
        self.upsert(member, directory, identity, &mut events);
        events
    }

    /// Handles a member leaving the tracked session by any path.
    ///
    /// The member is always stripped from the kick list, even if they were
    /// never on it or were unknown locally, so stale markers never pile up.
    /// If they were the owner, the new owner is read from the directory.
    pub fn process_departure<D, I>(
        &mut self,
        session: SessionId,
        member: MemberId,
        cause: MemberChange,
        directory: &D,
        identity: &I,
    ) -> Departure
    where
        D: SessionDirectory + ?Sized,
        I: IdentityProvider + ?Sized,
    {
        if !self.is_tracking(session) {
            tracing::debug!(%session, %member, "departure for untracked session ignored");
            return Departure::default();
        }
        let mut outcome = Departure::default();

        if self.members.remove(&member).is_some() {
            outcome.events.push(RosterEvent::Left { member, cause });
        } else {
            tracing::debug!(%session, %member, "departure for unknown member");
        }

        let mut kicks = self.kick_list();
        if kicks.remove(member) {
            self.store_kick_list(&kicks);
            outcome.kick_list_changed = true;
        }

        if self.owner == Some(member) {
            let previous = self.owner;
            self.owner = None;
            if let Some(owner) = directory.session_owner(session) {
                if !self.members.contains_key(&owner) {
                    self.upsert(owner, directory, identity, &mut outcome.events);
                }
                self.owner = Some(owner);
                outcome.events.push(RosterEvent::OwnershipChanged {
                    previous,
                    current: owner,
                });
                outcome.owner_changed = true;
            }
        }
        outcome
    }

    /// Re-reads one member's declared data after a member-level metadata
    /// push. Unknown members are created.
    pub fn refresh_member<D, I>(
        &mut self,
        session: SessionId,
        member: MemberId,
        directory: &D,
        identity: &I,
    ) -> Vec<RosterEvent>
    where
        D: SessionDirectory + ?Sized,
        I: IdentityProvider + ?Sized,
    {
        self.process_arrival(session, member, directory, identity)
    }

    /// Re-reads all session metadata and returns the keys that changed.
    /// The cached name follows the `"name"` key when it is present.
    pub fn refresh_metadata<D>(&mut self, directory: &D) -> Vec<String>
    where
        D: SessionDirectory + ?Sized,
    {
        if !self.has_session() {
            return Vec::new();
        }
        let changed = self.metadata.replace_all(directory.all_metadata(self.id));
        if let Some(name) = self.metadata.get(NAME_KEY) {
            self.name = name.to_string();
        }
        if !changed.is_empty() {
            tracing::trace!(session = %self.id, ?changed, "session metadata refreshed");
        }
        changed
    }

    /// Compares the directory's owner with the cached one.
    ///
    /// The directory has no ownership-change push, so this check after
    /// every metadata push is how ownership changes are noticed.
    pub fn detect_owner_drift<D, I>(
        &mut self,
        directory: &D,
        identity: &I,
    ) -> Option<RosterEvent>
    where
        D: SessionDirectory + ?Sized,
        I: IdentityProvider + ?Sized,
    {
        if !self.has_session() {
            return None;
        }
        let current = directory.session_owner(self.id)?;
        if self.owner == Some(current) {
            return None;
        }
        let previous = self.owner;
        if !self.members.contains_key(&current) {
            let mut ignored = Vec::new();
            self.upsert(current, directory, identity, &mut ignored);
        }
        self.owner = Some(current);
        Some(RosterEvent::OwnershipChanged { previous, current })
    }

    /// Looks up or creates `member`, overwrites its declared data from the
    /// directory, and records `Joined` (first sighting) and `DataChanged`.
    fn upsert<D, I>(
        &mut self,
        member: MemberId,
        directory: &D,
        identity: &I,
        events: &mut Vec<RosterEvent>,
    ) where
        D: SessionDirectory + ?Sized,
        I: IdentityProvider + ?Sized,
    {
        let session = self.id;
        let fresh = !self.members.contains_key(&member);
        let record = self
            .members
            .entry(member)
            .or_insert_with(|| Member::new(member, identity.display_name(member)));
        for key in &self.member_keys {
            match directory.member_metadata(session, member, key) {
                Some(value) => {
                    record.data.set(key.as_str(), value);
                }
                None => {
                    record.data.remove(key);
                }
            }
        }
        if fresh {
            tracing::trace!(%session, %member, "member observed");
            events.push(RosterEvent::Joined(member));
        }
        events.push(RosterEvent::DataChanged(member));
    }
}

#[cfg(test)]
mod tests {
    use lodge_directory::{DirectoryClient, InMemoryDirectory, PushReceiver};
    use lodge_protocol::{BackendEvent, Visibility};

    use super::*;
    use crate::{KICK_LIST_KEY, KickList, StaticIdentity};

    struct Fixture {
        dir: InMemoryDirectory,
        alice: DirectoryClient,
        bob: DirectoryClient,
        session: SessionId,
        identity: StaticIdentity,
        _inboxes: Vec<PushReceiver>,
    }

    /// Alice (M-1) hosts a session that Bob (M-2) has joined. The view is
    /// Bob's.
    fn fixture() -> Fixture {
        let dir = InMemoryDirectory::new();
        let (alice, mut a_rx) = dir.connect(MemberId(1));
        let (bob, b_rx) = dir.connect(MemberId(2));
        alice.create_session(Visibility::Public, 4).unwrap();
        let session = match a_rx.try_recv() {
            Ok(BackendEvent::SessionCreated { session_id }) => session_id,
            other => panic!("unexpected push {other:?}"),
        };
        bob.join_session(session).unwrap();
        let identity = StaticIdentity::new(MemberId(2), "Bob")
            .with_name(MemberId(1), "Alice");
        Fixture {
            dir,
            alice,
            bob,
            session,
            identity,
            _inboxes: vec![a_rx, b_rx],
        }
    }

    fn synced(fx: &Fixture) -> SessionView {
        let mut view = SessionView::new(["ready"]);
        view.resync(fx.session, &fx.bob, &fx.identity);
        view
    }

    #[test]
    fn test_resync_reports_every_member_once() {
        let fx = fixture();
        let mut view = SessionView::new(["ready"]);

        let events = view.resync(fx.session, &fx.bob, &fx.identity);

        let joined = events
            .iter()
            .filter(|e| matches!(e, RosterEvent::Joined(_)))
            .count();
        assert_eq!(joined, 2);
        assert_eq!(view.owner(), Some(MemberId(1)));
        assert_eq!(view.member(MemberId(1)).unwrap().display_name, "Alice");
        assert!(!events
            .iter()
            .any(|e| matches!(e, RosterEvent::OwnershipChanged { .. })));
    }

    #[test]
    fn test_resync_twice_only_reports_data_changes() {
        let fx = fixture();
        let mut view = synced(&fx);

        let events = view.resync(fx.session, &fx.bob, &fx.identity);

        assert!(events.iter().all(|e| matches!(e, RosterEvent::DataChanged(_))));
        assert_eq!(view.member_count(), 2);
    }

    #[test]
    fn test_resync_prunes_members_the_directory_dropped() {
        let fx = fixture();
        let mut view = synced(&fx);
        let (carol, _c_rx) = fx.dir.connect(MemberId(3));
        carol.join_session(fx.session).unwrap();
        view.resync(fx.session, &fx.bob, &fx.identity);
        carol.leave_session(fx.session).unwrap();

        let events = view.resync(fx.session, &fx.bob, &fx.identity);

        assert!(events.contains(&RosterEvent::Left {
            member: MemberId(3),
            cause: MemberChange::Left,
        }));
        assert!(!view.contains_member(MemberId(3)));
    }

    #[test]
    fn test_resync_reads_declared_member_data_only() {
        let fx = fixture();
        fx.alice.set_member_metadata(fx.session, "ready", "yes").unwrap();
        fx.alice.set_member_metadata(fx.session, "secret", "x").unwrap();

        let view = synced(&fx);

        let alice = view.member(MemberId(1)).unwrap();
        assert_eq!(alice.get("ready"), Some("yes"));
        assert_eq!(alice.get("secret"), None);
    }

    #[test]
    fn test_resync_restores_name_without_touching_other_keys() {
        let fx = fixture();
        fx.alice.set_metadata(fx.session, NAME_KEY, "Foo").unwrap();
        fx.alice.set_metadata(fx.session, "mode", "coop").unwrap();
        let mut view = synced(&fx);
        let before = view.metadata().clone();

        view.resync(fx.session, &fx.bob, &fx.identity);

        assert_eq!(view.name(), "Foo");
        assert_eq!(view.metadata(), &before);
    }

    #[test]
    fn test_duplicate_arrival_keeps_one_record() {
        let fx = fixture();
        let mut view = synced(&fx);
        let (carol, _c_rx) = fx.dir.connect(MemberId(3));
        carol.join_session(fx.session).unwrap();

        let first = view.process_arrival(fx.session, MemberId(3), &fx.bob, &fx.identity);
        let second = view.process_arrival(fx.session, MemberId(3), &fx.bob, &fx.identity);

        assert_eq!(
            first,
            vec![
                RosterEvent::Joined(MemberId(3)),
                RosterEvent::DataChanged(MemberId(3)),
            ]
        );
        assert_eq!(second, vec![RosterEvent::DataChanged(MemberId(3))]);
        assert_eq!(view.member_count(), 3);
    }

    #[test]
    fn test_arrival_for_other_session_is_ignored() {
        let fx = fixture();
        let mut view = synced(&fx);

        let events =
            view.process_arrival(SessionId(u64::MAX), MemberId(3), &fx.bob, &fx.identity);

        assert!(events.is_empty());
        assert_eq!(view.member_count(), 2);
    }

    #[test]
    fn test_departure_strips_kick_list_even_if_never_kicked() {
        let fx = fixture();
        let mut view = synced(&fx);
        let mut kicks = KickList::default();
        kicks.insert(MemberId(7));
        view.store_kick_list(&kicks);

        let outcome = view.process_departure(
            fx.session,
            MemberId(7),
            MemberChange::Disconnected,
            &fx.bob,
            &fx.identity,
        );

        assert!(outcome.kick_list_changed);
        assert!(outcome.events.is_empty());
        assert!(!view.kick_list().contains(MemberId(7)));
        assert!(!view.metadata().contains_key(KICK_LIST_KEY));
    }

    #[test]
    fn test_departure_of_owner_reads_new_owner() {
        let fx = fixture();
        let mut view = synced(&fx);
        fx.alice.leave_session(fx.session).unwrap();

        let outcome = view.process_departure(
            fx.session,
            MemberId(1),
            MemberChange::Left,
            &fx.bob,
            &fx.identity,
        );

        assert!(outcome.owner_changed);
        assert_eq!(
            outcome.events,
            vec![
                RosterEvent::Left {
                    member: MemberId(1),
                    cause: MemberChange::Left,
                },
                RosterEvent::OwnershipChanged {
                    previous: Some(MemberId(1)),
                    current: MemberId(2),
                },
            ]
        );
        assert_eq!(view.owner(), Some(MemberId(2)));
        assert!(view.detect_owner_drift(&fx.bob, &fx.identity).is_none());
    }

    #[test]
    fn test_departure_for_other_session_is_ignored() {
        let fx = fixture();
        let mut view = synced(&fx);

        let outcome = view.process_departure(
            SessionId(u64::MAX),
            MemberId(1),
            MemberChange::Left,
            &fx.bob,
            &fx.identity,
        );

        assert_eq!(outcome, Departure::default());
        assert!(view.contains_member(MemberId(1)));
    }

    #[test]
    fn test_detect_owner_drift_after_transfer() {
        let fx = fixture();
        let mut view = synced(&fx);
        fx.alice.transfer_ownership(fx.session, MemberId(2)).unwrap();

        let drift = view.detect_owner_drift(&fx.bob, &fx.identity);

        assert_eq!(
            drift,
            Some(RosterEvent::OwnershipChanged {
                previous: Some(MemberId(1)),
                current: MemberId(2),
            })
        );
        assert!(view.is_owned_by(MemberId(2)));
        assert!(view.detect_owner_drift(&fx.bob, &fx.identity).is_none());
    }

    #[test]
    fn test_refresh_metadata_returns_changed_keys() {
        let fx = fixture();
        let mut view = synced(&fx);
        fx.alice.set_metadata(fx.session, "mode", "versus").unwrap();

        assert_eq!(view.refresh_metadata(&fx.bob), vec!["mode"]);
        assert!(view.refresh_metadata(&fx.bob).is_empty());
    }

    #[test]
    fn test_refresh_member_picks_up_new_declared_value() {
        let fx = fixture();
        let mut view = synced(&fx);
        fx.alice.set_member_metadata(fx.session, "ready", "yes").unwrap();

        let events = view.refresh_member(fx.session, MemberId(1), &fx.bob, &fx.identity);

        assert_eq!(events, vec![RosterEvent::DataChanged(MemberId(1))]);
        assert_eq!(view.member(MemberId(1)).unwrap().get("ready"), Some("yes"));
    }

    mod proptests {
        use std::collections::BTreeSet;

        use super::*;
        use proptest::prelude::*;

        /// `None` marks the member for removal instead of changing the
        /// roster.
        fn change() -> impl Strategy<Value = Option<MemberChange>> {
            prop_oneof![
                Just(Some(MemberChange::Entered)),
                Just(Some(MemberChange::Left)),
                Just(Some(MemberChange::Disconnected)),
                Just(Some(MemberChange::Kicked)),
                Just(Some(MemberChange::Banned)),
                Just(None),
            ]
        }

        proptest! {
            #[test]
            fn roster_follows_latest_change(
                pushes in proptest::collection::vec((3u64..9, change()), 0..40),
            ) {
                let fx = fixture();
                let mut view = synced(&fx);
                let mut expected: BTreeSet<MemberId> =
                    [MemberId(1), MemberId(2)].into_iter().collect();

                for (id, change) in pushes {
                    let member = MemberId(id);
                    match change {
                        Some(MemberChange::Entered) => {
                            view.process_arrival(fx.session, member, &fx.bob, &fx.identity);
                            expected.insert(member);
                        }
                        Some(cause) => {
                            view.process_departure(
                                fx.session,
                                member,
                                cause,
                                &fx.bob,
                                &fx.identity,
                            );
                            expected.remove(&member);
                            prop_assert!(!view.kick_list().contains(member));
                        }
                        None => {
                            let mut kicks = view.kick_list();
                            kicks.insert(member);
                            view.store_kick_list(&kicks);
                        }
                    }

                    let actual: BTreeSet<MemberId> = view.members().map(|m| m.id).collect();
                    prop_assert_eq!(&actual, &expected);
                    prop_assert_eq!(view.owner(), Some(MemberId(1)));
                }
            }
        }
    }
}
