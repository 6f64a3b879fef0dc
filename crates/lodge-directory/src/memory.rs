//! An in-process session directory.
//!
//! [`InMemoryDirectory`] plays the part of the remote service: it hosts
//! sessions, answers searches, and pushes [`BackendEvent`]s to every
//! connected user's inbox. Each user talks to it through their own
//! [`DirectoryClient`], which implements [`SessionDirectory`].
//!
//! Pushes are delivered on unbounded channels so that a request never
//! blocks, which mirrors how a real directory queues completions.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lodge_protocol::{
    BackendEvent, ChatEntryType, DistanceTier, GameServer, MemberChange,
    MemberId, RequestId, SearchFilter, SessionCandidate, SessionId,
    Visibility,
};
use rand::Rng;
use tokio::sync::mpsc;

use crate::{DirectoryError, SessionDirectory};

/// The receiving end of one user's push inbox.
pub type PushReceiver = mpsc::UnboundedReceiver<BackendEvent>;

type PushSender = mpsc::UnboundedSender<BackendEvent>;

/// A session as the directory sees it.
#[derive(Debug)]
struct HostedSession {
    owner: MemberId,
    members: Vec<MemberId>,
    max_members: u32,
    visibility: Visibility,
    joinable: bool,
    /// How far this session is from every searcher. Real directories
    /// compute this per searcher; one tier per session is enough to
    /// exercise distance escalation.
    distance: DistanceTier,
    metadata: BTreeMap<String, String>,
    member_data: HashMap<MemberId, BTreeMap<String, String>>,
    game_server: Option<GameServer>,
}

impl HostedSession {
    fn free_slots(&self) -> u32 {
        self.max_members
            .saturating_sub(self.members.len() as u32)
    }

    fn is_member(&self, member: MemberId) -> bool {
        self.members.contains(&member)
    }

    fn matches(&self, filter: &SearchFilter) -> bool {
        if !self.visibility.is_listed() || !self.joinable {
            return false;
        }
        if self.members.is_empty() {
            return false;
        }
        let reach = filter.distance.unwrap_or_default();
        if self.distance > reach {
            return false;
        }
        if let Some(slots) = filter.slots_available {
            if self.free_slots() < slots {
                return false;
            }
        }
        let numbers_ok = filter.numeric.iter().all(|f| {
            self.metadata
                .get(&f.key)
                .and_then(|v| v.parse::<i64>().ok())
                .is_some_and(|actual| f.comparison.matches(&actual, &f.value))
        });
        let strings_ok = filter.strings.iter().all(|f| {
            self.metadata
                .get(&f.key)
                .is_some_and(|actual| {
                    f.comparison.matches(actual.as_str(), f.value.as_str())
                })
        });
        numbers_ok && strings_ok
    }

    /// Sum of distances to every near filter's target. Sessions missing
    /// the attribute sort last.
    fn nearness(&self, filter: &SearchFilter) -> u64 {
        filter
            .near
            .iter()
            .map(|f| {
                self.metadata
                    .get(&f.key)
                    .and_then(|v| v.parse::<i64>().ok())
                    .map_or(u64::MAX / 8, |actual| actual.abs_diff(f.value))
            })
            .fold(0u64, u64::saturating_add)
    }
}

/// Shared directory state behind the mutex.
#[derive(Debug, Default)]
struct Registry {
    sessions: HashMap<SessionId, HostedSession>,
    inboxes: HashMap<MemberId, PushSender>,
    next_request: u64,
}

impl Registry {
    fn push(&self, user: MemberId, event: BackendEvent) {
        match self.inboxes.get(&user) {
            Some(inbox) => {
                if inbox.send(event).is_err() {
                    tracing::debug!(%user, "push inbox closed, dropping event");
                }
            }
            None => tracing::trace!(%user, "no inbox for user"),
        }
    }

    fn push_all(&self, session: SessionId, event: &BackendEvent) {
        if let Some(hosted) = self.sessions.get(&session) {
            for member in &hosted.members {
                self.push(*member, event.clone());
            }
        }
    }

    fn allocate_session_id(&self) -> SessionId {
        let mut rng = rand::rng();
        loop {
            let candidate = SessionId(rng.random_range(1..=u64::from(u32::MAX)));
            if !self.sessions.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    fn hosted(&self, session: SessionId) -> Result<&HostedSession, DirectoryError> {
        self.sessions
            .get(&session)
            .ok_or(DirectoryError::SessionNotFound(session))
    }

    fn hosted_mut(
        &mut self,
        session: SessionId,
    ) -> Result<&mut HostedSession, DirectoryError> {
        self.sessions
            .get_mut(&session)
            .ok_or(DirectoryError::SessionNotFound(session))
    }

    fn owned_mut(
        &mut self,
        session: SessionId,
        caller: MemberId,
    ) -> Result<&mut HostedSession, DirectoryError> {
        let hosted = self.hosted_mut(session)?;
        if hosted.owner != caller {
            return Err(DirectoryError::NotOwner(caller, session));
        }
        Ok(hosted)
    }

    /// Removes `member` from `session`, notifying the remaining members.
    ///
    /// Migrates ownership to the longest-standing remaining member and
    /// deletes the session once it is empty.
    fn remove_member(
        &mut self,
        session: SessionId,
        member: MemberId,
        change: MemberChange,
    ) -> Result<(), DirectoryError> {
        let hosted = self.hosted_mut(session)?;
        if !hosted.is_member(member) {
            return Err(DirectoryError::NotAMember(member, session));
        }
        hosted.members.retain(|m| *m != member);
        hosted.member_data.remove(&member);

        if hosted.members.is_empty() {
            self.sessions.remove(&session);
            tracing::debug!(%session, "last member left, session removed");
            return Ok(());
        }

        let owner_left = hosted.owner == member;
        if owner_left {
            hosted.owner = hosted.members[0];
            tracing::debug!(%session, new_owner = %hosted.owner, "ownership migrated");
        }

        self.push_all(
            session,
            &BackendEvent::MemberChanged {
                session_id: session,
                member_id: member,
                change,
            },
        );
        if owner_left {
            // Ownership has no dedicated push; members notice it through
            // the session-level metadata refresh.
            self.push_all(
                session,
                &BackendEvent::MetadataChanged {
                    session_id: session,
                    member_id: None,
                },
            );
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// InMemoryDirectory
// ---------------------------------------------------------------------------

/// A directory service living inside the current process.
///
/// Cheap to clone; all clones share the same sessions.
///
/// ```rust
/// use lodge_directory::{InMemoryDirectory, SessionDirectory};
/// use lodge_protocol::{BackendEvent, MemberId, Visibility};
///
/// let directory = InMemoryDirectory::new();
/// let (alice, mut inbox) = directory.connect(MemberId(1));
///
/// alice.create_session(Visibility::Public, 4).unwrap();
/// assert!(matches!(
///     inbox.try_recv(),
///     Ok(BackendEvent::SessionCreated { .. })
/// ));
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    inner: Arc<Mutex<Registry>>,
}

impl InMemoryDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `user` and returns their client plus push inbox.
    ///
    /// Connecting the same user again replaces the previous inbox.
    pub fn connect(&self, user: MemberId) -> (DirectoryClient, PushReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().inboxes.insert(user, tx);
        tracing::debug!(%user, "user connected to directory");
        let client = DirectoryClient {
            user,
            directory: self.clone(),
        };
        (client, rx)
    }

    /// Simulates `user` dropping off the network: they are removed from
    /// every session with a `Disconnected` push, and their inbox closes.
    pub fn disconnect(&self, user: MemberId) {
        let mut registry = self.lock();
        let sessions: Vec<SessionId> = registry
            .sessions
            .iter()
            .filter(|(_, hosted)| hosted.is_member(user))
            .map(|(id, _)| *id)
            .collect();
        for session in sessions {
            let _ = registry.remove_member(session, user, MemberChange::Disconnected);
        }
        registry.inboxes.remove(&user);
    }

    /// Removes `member` from `session` with an arbitrary departure cause,
    /// the way a moderator action on the directory side would. Unlike a
    /// voluntary leave, the removed member is told too.
    pub fn remove_member(
        &self,
        session: SessionId,
        member: MemberId,
        change: MemberChange,
    ) -> Result<(), DirectoryError> {
        if !change.is_departure() {
            return Err(DirectoryError::Rejected(
                "removal needs a departure cause".into(),
            ));
        }
        let mut registry = self.lock();
        registry.remove_member(session, member, change)?;
        registry.push(
            member,
            BackendEvent::MemberChanged {
                session_id: session,
                member_id: member,
                change,
            },
        );
        Ok(())
    }

    /// Places a session at the given distance from every searcher.
    pub fn set_distance(
        &self,
        session: SessionId,
        distance: DistanceTier,
    ) -> Result<(), DirectoryError> {
        self.lock().hosted_mut(session)?.distance = distance;
        Ok(())
    }

    /// Delivers an arbitrary push to `user`, bypassing the simulation.
    pub fn inject(&self, user: MemberId, event: BackendEvent) {
        self.lock().push(user, event);
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Ids of all live sessions, in no particular order.
    pub fn session_ids(&self) -> Vec<SessionId> {
        self.lock().sessions.keys().copied().collect()
    }

    /// Current capacity of a session.
    pub fn member_limit(&self, session: SessionId) -> Option<u32> {
        self.lock().sessions.get(&session).map(|h| h.max_members)
    }

    /// Whether a session currently accepts joins.
    pub fn is_joinable(&self, session: SessionId) -> Option<bool> {
        self.lock().sessions.get(&session).map(|h| h.joinable)
    }

    /// The game server attached to a session, if any.
    pub fn game_server(&self, session: SessionId) -> Option<GameServer> {
        self.lock()
            .sessions
            .get(&session)
            .and_then(|h| h.game_server.clone())
    }
}

// ---------------------------------------------------------------------------
// DirectoryClient
// ---------------------------------------------------------------------------

/// One user's view of an [`InMemoryDirectory`].
#[derive(Debug, Clone)]
pub struct DirectoryClient {
    user: MemberId,
    directory: InMemoryDirectory,
}

impl DirectoryClient {
    /// The user this client acts as.
    pub fn user(&self) -> MemberId {
        self.user
    }

    /// The directory this client talks to.
    pub fn directory(&self) -> &InMemoryDirectory {
        &self.directory
    }
}

impl SessionDirectory for DirectoryClient {
    fn create_session(
        &self,
        visibility: Visibility,
        max_members: u32,
    ) -> Result<(), DirectoryError> {
        let mut registry = self.directory.lock();
        let session = registry.allocate_session_id();
        registry.sessions.insert(
            session,
            HostedSession {
                owner: self.user,
                members: vec![self.user],
                max_members,
                visibility,
                joinable: true,
                distance: DistanceTier::Close,
                metadata: BTreeMap::new(),
                member_data: HashMap::new(),
                game_server: None,
            },
        );
        tracing::debug!(%session, owner = %self.user, "session hosted");
        registry.push(self.user, BackendEvent::SessionCreated { session_id: session });
        registry.push(self.user, BackendEvent::SessionEntered { session_id: session });
        Ok(())
    }

    fn request_session_list(
        &self,
        filter: &SearchFilter,
    ) -> Result<RequestId, DirectoryError> {
        let mut registry = self.directory.lock();
        registry.next_request += 1;
        let request = RequestId(registry.next_request);

        let mut hits: Vec<(u64, SessionId)> = registry
            .sessions
            .iter()
            .filter(|(_, hosted)| hosted.matches(filter))
            .map(|(id, hosted)| (hosted.nearness(filter), *id))
            .collect();
        hits.sort();
        if let Some(cap) = filter.result_cap {
            hits.truncate(cap as usize);
        }

        let candidates = hits
            .into_iter()
            .filter_map(|(_, id)| {
                registry.sessions.get(&id).map(|hosted| SessionCandidate {
                    id,
                    owner_id: Some(hosted.owner),
                    max_slots: hosted.max_members,
                    metadata: hosted.metadata.clone(),
                })
            })
            .collect();

        registry.push(
            self.user,
            BackendEvent::SessionListReady {
                request,
                candidates,
            },
        );
        Ok(request)
    }

    fn join_session(&self, session: SessionId) -> Result<(), DirectoryError> {
        let mut registry = self.directory.lock();
        let refusal = match registry.sessions.get(&session) {
            None => Some("session does not exist"),
            Some(hosted) if hosted.is_member(self.user) => None,
            Some(hosted) if !hosted.joinable => Some("session is not joinable"),
            Some(hosted) if hosted.free_slots() == 0 => Some("session is full"),
            Some(_) => None,
        };
        if let Some(reason) = refusal {
            registry.push(
                self.user,
                BackendEvent::JoinFailed {
                    session_id: session,
                    reason: reason.to_string(),
                },
            );
            return Ok(());
        }

        let hosted = registry.hosted_mut(session)?;
        let newly_joined = !hosted.is_member(self.user);
        if newly_joined {
            hosted.members.push(self.user);
        }
        registry.push(self.user, BackendEvent::SessionEntered { session_id: session });
        if newly_joined {
            let event = BackendEvent::MemberChanged {
                session_id: session,
                member_id: self.user,
                change: MemberChange::Entered,
            };
            if let Some(hosted) = registry.sessions.get(&session) {
                for member in hosted.members.iter().filter(|m| **m != self.user) {
                    registry.push(*member, event.clone());
                }
            }
        }
        Ok(())
    }

    fn leave_session(&self, session: SessionId) -> Result<(), DirectoryError> {
        self.directory
            .lock()
            .remove_member(session, self.user, MemberChange::Left)
    }

    fn set_metadata(
        &self,
        session: SessionId,
        key: &str,
        value: &str,
    ) -> Result<(), DirectoryError> {
        let mut registry = self.directory.lock();
        let hosted = registry.owned_mut(session, self.user)?;
        if value.is_empty() {
            hosted.metadata.remove(key);
        } else {
            hosted.metadata.insert(key.to_string(), value.to_string());
        }
        registry.push_all(
            session,
            &BackendEvent::MetadataChanged {
                session_id: session,
                member_id: None,
            },
        );
        Ok(())
    }

    fn set_member_metadata(
        &self,
        session: SessionId,
        key: &str,
        value: &str,
    ) -> Result<(), DirectoryError> {
        let mut registry = self.directory.lock();
        let hosted = registry.hosted_mut(session)?;
        if !hosted.is_member(self.user) {
            return Err(DirectoryError::NotAMember(self.user, session));
        }
        hosted
            .member_data
            .entry(self.user)
            .or_default()
            .insert(key.to_string(), value.to_string());
        registry.push_all(
            session,
            &BackendEvent::MetadataChanged {
                session_id: session,
                member_id: Some(self.user),
            },
        );
        Ok(())
    }

    fn send_chat(
        &self,
        session: SessionId,
        data: &[u8],
    ) -> Result<(), DirectoryError> {
        if data.is_empty() {
            return Err(DirectoryError::Rejected("empty chat message".into()));
        }
        let registry = self.directory.lock();
        let hosted = registry.hosted(session)?;
        if !hosted.is_member(self.user) {
            return Err(DirectoryError::NotAMember(self.user, session));
        }
        registry.push_all(
            session,
            &BackendEvent::ChatReceived {
                session_id: session,
                sender_id: self.user,
                data: data.to_vec(),
                entry_type: ChatEntryType::Message,
            },
        );
        Ok(())
    }

    fn transfer_ownership(
        &self,
        session: SessionId,
        new_owner: MemberId,
    ) -> Result<(), DirectoryError> {
        let mut registry = self.directory.lock();
        let hosted = registry.owned_mut(session, self.user)?;
        if !hosted.is_member(new_owner) {
            return Err(DirectoryError::NotAMember(new_owner, session));
        }
        hosted.owner = new_owner;
        registry.push_all(
            session,
            &BackendEvent::MetadataChanged {
                session_id: session,
                member_id: None,
            },
        );
        Ok(())
    }

    fn set_joinable(
        &self,
        session: SessionId,
        joinable: bool,
    ) -> Result<(), DirectoryError> {
        let mut registry = self.directory.lock();
        registry.owned_mut(session, self.user)?.joinable = joinable;
        Ok(())
    }

    fn set_member_limit(
        &self,
        session: SessionId,
        max_members: u32,
    ) -> Result<(), DirectoryError> {
        let mut registry = self.directory.lock();
        registry.owned_mut(session, self.user)?.max_members = max_members;
        Ok(())
    }

    fn set_game_server(
        &self,
        session: SessionId,
        server: &GameServer,
    ) -> Result<(), DirectoryError> {
        let mut registry = self.directory.lock();
        registry.owned_mut(session, self.user)?.game_server = Some(server.clone());
        registry.push_all(
            session,
            &BackendEvent::GameServerSet {
                session_id: session,
                server: server.clone(),
            },
        );
        Ok(())
    }

    fn invite(
        &self,
        session: SessionId,
        invitee: MemberId,
    ) -> Result<(), DirectoryError> {
        let registry = self.directory.lock();
        let hosted = registry.hosted(session)?;
        if !hosted.is_member(self.user) {
            return Err(DirectoryError::NotAMember(self.user, session));
        }
        registry.push(
            invitee,
            BackendEvent::JoinRequested {
                session_id: session,
                from: self.user,
            },
        );
        Ok(())
    }

    fn session_owner(&self, session: SessionId) -> Option<MemberId> {
        self.directory.lock().sessions.get(&session).map(|h| h.owner)
    }

    fn session_members(&self, session: SessionId) -> Vec<MemberId> {
        self.directory
            .lock()
            .sessions
            .get(&session)
            .map(|h| h.members.clone())
            .unwrap_or_default()
    }

    fn metadata(&self, session: SessionId, key: &str) -> Option<String> {
        self.directory
            .lock()
            .sessions
            .get(&session)
            .and_then(|h| h.metadata.get(key).cloned())
    }

    fn all_metadata(&self, session: SessionId) -> Vec<(String, String)> {
        self.directory
            .lock()
            .sessions
            .get(&session)
            .map(|h| {
                h.metadata
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn member_metadata(
        &self,
        session: SessionId,
        member: MemberId,
        key: &str,
    ) -> Option<String> {
        self.directory
            .lock()
            .sessions
            .get(&session)
            .and_then(|h| h.member_data.get(&member))
            .and_then(|data| data.get(key).cloned())
    }
}
