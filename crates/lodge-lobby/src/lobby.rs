//! The lobby: session lifecycle, soft-kick, and push handling.
//!
//! [`Lobby`] is plain synchronous code. It is driven from two directions:
//!
//! - **Operations** (`create_session`, `join_session`, `kick_member`, ...)
//!   issue directory requests and return `true` if a request went out.
//!   Refusals are logged and, where the caller needs to know, reported
//!   as a `*Failed` event.
//! - **Pushes** all enter through [`Lobby::handle_backend_event`], the one
//!   ingress for everything the directory says.
//!
//! Nothing here locks or awaits. The actor in `actor.rs` provides the
//! single-writer guarantee by owning the lobby inside one task.

use std::time::SystemTime;

use lodge_directory::SessionDirectory;
use lodge_matchmaking::{Matchmaker, SearchError, SearchOutcome, SearchPhase};
use lodge_protocol::{
    BackendEvent, ChatEntryType, DistanceTier, GameServer, MemberChange,
    MemberId, SearchFilter, SessionId, Visibility,
};
use lodge_session::{
    IdentityProvider, KICK_LIST_KEY, KickList, Member, MetadataStore,
    NAME_KEY, RosterEvent, SessionView,
};

use crate::{
    ChatMessage, EventSender, LobbyConfig, LobbyState, MAX_MEMBERS_LIMIT,
    SessionEvent,
};

/// A create request waiting for the directory's answer.
#[derive(Debug, Clone)]
struct PendingCreate {
    filter: SearchFilter,
    name: String,
}

/// A read-only copy of a lobby's state at one moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbySnapshot {
    pub session_id: SessionId,
    pub name: String,
    pub state: LobbyState,
    pub owner: Option<MemberId>,
    /// Sorted by id.
    pub members: Vec<Member>,
    pub metadata: MetadataStore,
    pub has_session: bool,
    pub is_owner: bool,
    pub in_session: bool,
    pub search: SearchPhase,
    pub game_server: Option<GameServer>,
    pub max_members: u32,
}

/// The session lifecycle core for one local user.
pub struct Lobby<D, I> {
    directory: D,
    identity: I,
    config: LobbyConfig,
    view: SessionView,
    state: LobbyState,
    matchmaker: Matchmaker,
    events: EventSender,
    pending_join: Option<SessionId>,
    pending_create: Option<PendingCreate>,
    game_server: Option<GameServer>,
}

impl<D: SessionDirectory, I: IdentityProvider> Lobby<D, I> {
    /// Creates an idle lobby. Events are delivered on `events`.
    pub fn new(directory: D, identity: I, config: LobbyConfig, events: EventSender) -> Self {
        let config = config.validated();
        Self {
            view: SessionView::new(config.member_data_keys.iter().cloned()),
            matchmaker: Matchmaker::new(config.max_distance),
            directory,
            identity,
            config,
            state: LobbyState::NoSession,
            events,
            pending_join: None,
            pending_create: None,
            game_server: None,
        }
    }

    // =====================================================================
    // Queries
    // =====================================================================

    pub fn local_id(&self) -> MemberId {
        self.identity.local_identity()
    }

    pub fn state(&self) -> LobbyState {
        self.state
    }

    pub fn session_id(&self) -> SessionId {
        self.view.id()
    }

    /// A session id is being tracked.
    pub fn has_session(&self) -> bool {
        self.view.has_session()
    }

    /// The local user owns the tracked session.
    pub fn is_owner(&self) -> bool {
        self.view.is_owned_by(self.local_id())
    }

    /// The local user is inside the tracked session.
    pub fn in_session(&self) -> bool {
        self.state == LobbyState::InSession && self.has_session()
    }

    pub fn is_searching(&self) -> bool {
        self.matchmaker.is_searching()
    }

    pub fn is_quick_matching(&self) -> bool {
        self.matchmaker.is_quick_matching()
    }

    pub fn view(&self) -> &SessionView {
        &self.view
    }

    pub fn game_server(&self) -> Option<&GameServer> {
        self.game_server.as_ref()
    }

    pub fn config(&self) -> &LobbyConfig {
        &self.config
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn snapshot(&self) -> LobbySnapshot {
        let mut members: Vec<Member> = self.view.members().cloned().collect();
        members.sort_by_key(|m| m.id);
        LobbySnapshot {
            session_id: self.view.id(),
            name: self.view.name().to_string(),
            state: self.state,
            owner: self.view.owner(),
            members,
            metadata: self.view.metadata().clone(),
            has_session: self.has_session(),
            is_owner: self.is_owner(),
            in_session: self.in_session(),
            search: self.matchmaker.phase(),
            game_server: self.game_server.clone(),
            max_members: self.config.max_members,
        }
    }

    // =====================================================================
    // Lifecycle operations
    // =====================================================================

    /// Asks the directory for a new session owned by the local user.
    ///
    /// Any current session is left first. Once created, the session
    /// advertises `name` under `"name"` (the local display name if `name`
    /// is empty) plus every string and numeric predicate of `filter`.
    pub fn create_session(
        &mut self,
        filter: &SearchFilter,
        name: &str,
        visibility: Visibility,
    ) -> bool {
        if self.state == LobbyState::Creating {
            tracing::warn!("create ignored: another create is in flight");
            return false;
        }
        self.leave_or_abandon();

        let name = if name.is_empty() {
            self.identity.display_name(self.local_id())
        } else {
            name.to_string()
        };

        if let Err(e) = self
            .directory
            .create_session(visibility, self.config.max_members)
        {
            tracing::warn!(error = %e, "create request refused");
            self.emit(SessionEvent::SessionCreateFailed {
                reason: e.to_string(),
            });
            return false;
        }

        tracing::info!(
            name = %name,
            ?visibility,
            max_members = self.config.max_members,
            "session create requested"
        );
        self.pending_create = Some(PendingCreate {
            filter: filter.clone(),
            name,
        });
        self.state = LobbyState::Creating;
        true
    }

    /// Joins `session`, leaving any other session first.
    ///
    /// Does nothing if `session` is already the tracked session.
    pub fn join_session(&mut self, session: SessionId) -> bool {
        if session.is_nil() {
            tracing::warn!("join ignored: nil session id");
            return false;
        }
        if self.view.is_tracking(session) || self.pending_join == Some(session) {
            tracing::debug!(%session, "join ignored: already there");
            return false;
        }
        self.leave_or_abandon();
        self.view.clear();

        if let Err(e) = self.directory.join_session(session) {
            tracing::warn!(%session, error = %e, "join request refused");
            self.emit(SessionEvent::JoinFailed {
                session_id: session,
                reason: e.to_string(),
            });
            return false;
        }

        tracing::info!(%session, "join requested");
        self.pending_join = Some(session);
        self.state = LobbyState::Joining;
        true
    }

    /// Leaves the tracked session.
    ///
    /// Local state is cleared whether or not the directory acknowledges
    /// the leave. Emits exactly one `SessionExited` when a session was
    /// tracked; otherwise only abandons a pending create or join.
    pub fn leave_session(&mut self) -> bool {
        if !self.has_session() {
            if self.state.is_pending() {
                self.abandon_pending();
            } else {
                tracing::warn!("leave ignored: no session");
            }
            return false;
        }

        let session = self.view.id();
        if let Err(e) = self.directory.leave_session(session) {
            tracing::warn!(%session, error = %e, "leave request failed; clearing local state anyway");
        }
        self.reset_local();
        tracing::info!(%session, "session exited");
        self.emit(SessionEvent::SessionExited {
            session_id: session,
        });
        true
    }

    fn leave_or_abandon(&mut self) {
        if self.has_session() {
            self.leave_session();
        } else if self.state.is_pending() {
            self.abandon_pending();
        }
    }

    /// Forgets a create or join that hasn't completed. If the directory
    /// completes it anyway, the unexpected push is answered with a leave.
    ///
    /// A quick match waiting on that join or create ends as failed.
    fn abandon_pending(&mut self) {
        let mut quick_match_ended = false;
        if let Some(session) = self.pending_join.take() {
            tracing::debug!(%session, "abandoning pending join");
            quick_match_ended |= self.matchmaker.resolve_join(session, false);
        }
        if self.pending_create.take().is_some() {
            tracing::debug!("abandoning pending create");
            quick_match_ended |= self.matchmaker.resolve_create(false);
        }
        self.state = LobbyState::NoSession;
        if quick_match_ended {
            self.emit(SessionEvent::QuickMatchFailed);
        }
    }

    fn reset_local(&mut self) {
        self.view.clear();
        self.state = LobbyState::NoSession;
        self.pending_join = None;
        self.game_server = None;
    }

    // =====================================================================
    // Metadata operations
    // =====================================================================

    /// Writes one session metadata value (owner only).
    ///
    /// Writing `"name"` also updates the cached session name.
    pub fn set_session_metadata(&mut self, key: &str, value: &str) -> bool {
        let Some(session) = self.require_owner("set_session_metadata") else {
            return false;
        };
        if !self.publish_metadata(session, key, value) {
            return false;
        }
        if self.view.set_metadata(key, value) {
            self.emit(SessionEvent::SessionMetadataChanged {
                session_id: session,
                keys: vec![key.to_string()],
            });
        }
        true
    }

    /// Writes one of the local user's member-data values.
    ///
    /// `key` becomes a declared member-data key if it wasn't one already.
    pub fn set_member_metadata(&mut self, key: &str, value: &str) -> bool {
        let Some(session) = self.require_session("set_member_metadata") else {
            return false;
        };
        if self.view.declare_member_key(key) {
            tracing::debug!(key, "declared member-data key");
        }
        if let Err(e) = self.directory.set_member_metadata(session, key, value) {
            tracing::warn!(%session, key, error = %e, "member metadata write refused");
            self.emit(SessionEvent::MetadataUpdateFailed {
                session_id: session,
            });
            return false;
        }

        let local = self.local_id();
        let identity = &self.identity;
        self.view
            .set_member_data(local, || identity.display_name(local), key, value);
        true
    }

    /// Changes the capacity used for sessions. Applied to the tracked
    /// session too when the local user owns it.
    pub fn set_member_limit(&mut self, max_members: u32) -> bool {
        let clamped = max_members.min(MAX_MEMBERS_LIMIT);
        if clamped != max_members {
            tracing::warn!(requested = max_members, limit = MAX_MEMBERS_LIMIT, "member limit clamped");
        }
        self.config.max_members = clamped;

        if !self.has_session() {
            return true;
        }
        let Some(session) = self.require_owner("set_member_limit") else {
            return false;
        };
        match self.directory.set_member_limit(session, clamped) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(%session, error = %e, "member limit write refused");
                false
            }
        }
    }

    /// Opens or closes the tracked session to joins (owner only).
    pub fn set_joinable(&mut self, joinable: bool) -> bool {
        let Some(session) = self.require_owner("set_joinable") else {
            return false;
        };
        match self.directory.set_joinable(session, joinable) {
            Ok(()) => {
                tracing::info!(%session, joinable, "joinable changed");
                true
            }
            Err(e) => {
                tracing::warn!(%session, error = %e, "joinable change refused");
                false
            }
        }
    }

    /// Attaches game-server details to the tracked session (owner only).
    /// The cached copy updates when the directory echoes it back.
    pub fn set_game_server(&mut self, server: GameServer) -> bool {
        let Some(session) = self.require_owner("set_game_server") else {
            return false;
        };
        match self.directory.set_game_server(session, &server) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(%session, error = %e, "game server write refused");
                false
            }
        }
    }

    // =====================================================================
    // Membership operations
    // =====================================================================

    /// Hands ownership to another member (owner only).
    ///
    /// The change is noticed, like any other, when the directory's next
    /// metadata push shows a different owner.
    pub fn change_owner(&mut self, new_owner: MemberId) -> bool {
        let Some(session) = self.require_owner("change_owner") else {
            return false;
        };
        if new_owner == self.local_id() {
            tracing::warn!(%session, "change_owner ignored: already the owner");
            return false;
        }
        match self.directory.transfer_ownership(session, new_owner) {
            Ok(()) => {
                tracing::info!(%session, %new_owner, "ownership transfer requested");
                true
            }
            Err(e) => {
                tracing::warn!(%session, %new_owner, error = %e, "ownership transfer refused");
                false
            }
        }
    }

    /// Asks `target` to leave the session (owner only).
    ///
    /// Kicking yourself is a plain leave followed by `SelfKicked`.
    /// Otherwise `target` is added to the kick list in session metadata,
    /// and their own process leaves when it sees the list.
    pub fn kick_member(&mut self, target: MemberId) -> bool {
        let Some(session) = self.require_owner("kick_member") else {
            return false;
        };

        if target == self.local_id() {
            self.leave_session();
            self.emit(SessionEvent::SelfKicked {
                session_id: session,
            });
            return true;
        }

        if !self.view.contains_member(target) {
            tracing::debug!(%session, %target, "kicking a member not known locally");
        }
        let mut kicks = self.view.kick_list();
        if !kicks.insert(target) {
            tracing::debug!(%session, %target, "member already on the kick list");
            return true;
        }
        let encoded = self.view.store_kick_list(&kicks);
        if !self.publish_metadata(session, KICK_LIST_KEY, &encoded) {
            return false;
        }
        tracing::info!(%session, %target, "member asked to leave");
        true
    }

    /// Sends a chat message to everyone in the tracked session.
    pub fn send_chat(&mut self, text: &str) -> bool {
        let Some(session) = self.require_session("send_chat") else {
            return false;
        };
        match self.directory.send_chat(session, text.as_bytes()) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(%session, error = %e, "chat message refused");
                false
            }
        }
    }

    /// Invites another user into the tracked session.
    pub fn invite(&mut self, invitee: MemberId) -> bool {
        let Some(session) = self.require_session("invite") else {
            return false;
        };
        match self.directory.invite(session, invitee) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(%session, %invitee, error = %e, "invite refused");
                false
            }
        }
    }

    // =====================================================================
    // Search operations
    // =====================================================================

    /// Starts a standard search. Rejected while any search is in flight.
    pub fn search(&mut self, filter: &SearchFilter) -> bool {
        let started = self.matchmaker.start_search(filter, &self.directory);
        self.search_started(started.map(|_| filter.distance))
    }

    /// Starts a quick match. Rejected while any search is in flight.
    ///
    /// `create_name` names the session auto-created when nothing is found
    /// (the local display name if empty).
    pub fn quick_match(
        &mut self,
        filter: &SearchFilter,
        create_name: &str,
        auto_create: bool,
    ) -> bool {
        let started = self.matchmaker.start_quick_match(
            filter,
            create_name,
            auto_create,
            &self.directory,
        );
        self.search_started(started.map(|_| Some(DistanceTier::Close)))
    }

    fn search_started(
        &mut self,
        started: Result<Option<DistanceTier>, SearchError>,
    ) -> bool {
        match started {
            Ok(distance) => {
                self.emit(SessionEvent::SearchStarted { distance });
                true
            }
            Err(SearchError::Busy) => false,
            Err(SearchError::Directory(e)) => {
                tracing::warn!(error = %e, "search request refused");
                self.emit(SessionEvent::SearchFailed {
                    reason: e.to_string(),
                });
                false
            }
        }
    }

    /// Abandons a standard search. A late result is dropped.
    pub fn cancel_search(&mut self) -> bool {
        self.matchmaker.cancel_search()
    }

    /// Abandons a quick match. A late result is dropped; a join or create
    /// it already started still completes.
    pub fn cancel_quick_match(&mut self) -> bool {
        self.matchmaker.cancel_quick_match()
    }

    fn on_search_outcome(&mut self, outcome: SearchOutcome) {
        match outcome {
            SearchOutcome::Stale => {}
            SearchOutcome::Results(candidates) => {
                self.emit(SessionEvent::SearchResultsReady { candidates });
            }
            SearchOutcome::SearchFailed(reason) => {
                self.emit(SessionEvent::SearchFailed { reason });
            }
            SearchOutcome::Escalated(tier) => {
                self.emit(SessionEvent::SearchStarted {
                    distance: Some(tier),
                });
            }
            SearchOutcome::Join(session) => {
                if self.view.is_tracking(session) {
                    // Quick match found the session we're already in.
                    self.matchmaker.resolve_join(session, true);
                } else if !self.join_session(session)
                    && self.matchmaker.resolve_join(session, false)
                {
                    self.emit(SessionEvent::QuickMatchFailed);
                }
            }
            SearchOutcome::Create { filter, name } => {
                if !self.create_session(&filter, &name, self.config.visibility)
                    && self.matchmaker.resolve_create(false)
                {
                    self.emit(SessionEvent::QuickMatchFailed);
                }
            }
            SearchOutcome::QuickMatchFailed => {
                self.emit(SessionEvent::QuickMatchFailed);
            }
        }
    }

    // =====================================================================
    // Push ingress
    // =====================================================================

    /// Applies one push from the directory.
    pub fn handle_backend_event(&mut self, event: BackendEvent) {
        tracing::trace!(kind = event.kind(), "backend push");
        match event {
            BackendEvent::SessionCreated { session_id } => {
                self.on_session_created(session_id);
            }
            BackendEvent::SessionCreateFailed { reason } => {
                self.on_session_create_failed(reason);
            }
            BackendEvent::SessionEntered { session_id } => {
                self.on_session_entered(session_id);
            }
            BackendEvent::JoinFailed { session_id, reason } => {
                self.on_join_failed(session_id, reason);
            }
            BackendEvent::SessionListReady {
                request,
                candidates,
            } => {
                let outcome =
                    self.matchmaker
                        .on_results(request, candidates, &self.directory);
                self.on_search_outcome(outcome);
            }
            BackendEvent::SessionListFailed { request, reason } => {
                let outcome = self.matchmaker.on_list_failed(request, &reason);
                self.on_search_outcome(outcome);
            }
            BackendEvent::MemberChanged {
                session_id,
                member_id,
                change,
            } => self.on_member_changed(session_id, member_id, change),
            BackendEvent::MetadataChanged {
                session_id,
                member_id,
            } => self.on_metadata_changed(session_id, member_id),
            BackendEvent::MetadataUpdateFailed { session_id } => {
                if self.view.is_tracking(session_id) {
                    tracing::warn!(%session_id, "directory rejected a metadata write");
                    self.emit(SessionEvent::MetadataUpdateFailed { session_id });
                }
            }
            BackendEvent::ChatReceived {
                session_id,
                sender_id,
                data,
                entry_type,
            } => self.on_chat(session_id, sender_id, data, entry_type),
            BackendEvent::GameServerSet { session_id, server } => {
                if !self.view.is_tracking(session_id) {
                    tracing::debug!(%session_id, "game server for untracked session ignored");
                    return;
                }
                tracing::info!(%session_id, ?server, "game server set");
                self.game_server = Some(server.clone());
                self.emit(SessionEvent::GameServerSet { session_id, server });
            }
            BackendEvent::JoinRequested { session_id, from } => {
                tracing::info!(%session_id, %from, "invited to a session");
                self.emit(SessionEvent::JoinRequested { session_id, from });
            }
        }
    }

    fn on_session_created(&mut self, session: SessionId) {
        let Some(pending) = self.pending_create.take() else {
            tracing::debug!(%session, "unexpected SessionCreated; leaving it");
            self.leave_remote(session);
            return;
        };

        let local = self.local_member();
        self.view.track(session);
        self.view.claim(local);
        self.state = LobbyState::InSession;

        self.view.set_metadata(NAME_KEY, &pending.name);
        self.publish_metadata(session, NAME_KEY, &pending.name);
        for (key, value) in pending.filter.advertised_attributes() {
            self.view.set_metadata(&key, &value);
            self.publish_metadata(session, &key, &value);
        }
        if let Err(e) = self
            .directory
            .set_member_limit(session, self.config.max_members)
        {
            tracing::warn!(%session, error = %e, "could not apply member limit");
        }

        tracing::info!(%session, name = %pending.name, "session created");
        self.emit(SessionEvent::SessionCreated {
            session_id: session,
        });
        self.matchmaker.resolve_create(true);
    }

    fn on_session_create_failed(&mut self, reason: String) {
        if self.pending_create.take().is_none() {
            tracing::debug!(%reason, "unexpected SessionCreateFailed ignored");
            return;
        }
        self.state = LobbyState::NoSession;
        tracing::warn!(%reason, "session create failed");
        self.emit(SessionEvent::SessionCreateFailed { reason });
        if self.matchmaker.resolve_create(false) {
            self.emit(SessionEvent::QuickMatchFailed);
        }
    }

    fn on_session_entered(&mut self, session: SessionId) {
        let expected =
            self.view.is_tracking(session) || self.pending_join == Some(session);
        if !expected {
            tracing::debug!(%session, "unexpected SessionEntered; leaving it");
            self.leave_remote(session);
            return;
        }

        self.pending_join = None;
        let roster = self.view.resync(session, &self.directory, &self.identity);
        self.state = LobbyState::InSession;
        self.emit_roster(roster);

        tracing::info!(
            %session,
            members = self.view.member_count(),
            owner = ?self.view.owner(),
            "session entered"
        );
        self.emit(SessionEvent::SessionEntered {
            session_id: session,
        });
        self.matchmaker.resolve_join(session, true);

        if self.view.kick_list().contains(self.local_id()) {
            tracing::info!(%session, "entered a session that lists us for removal");
            self.leave_kicked(session);
        }
    }

    fn on_join_failed(&mut self, session: SessionId, reason: String) {
        if self.pending_join != Some(session) {
            tracing::debug!(%session, %reason, "JoinFailed for a join we are not waiting on");
            return;
        }
        self.pending_join = None;
        self.state = LobbyState::NoSession;
        tracing::warn!(%session, %reason, "join failed");
        self.emit(SessionEvent::JoinFailed {
            session_id: session,
            reason,
        });
        if self.matchmaker.resolve_join(session, false) {
            self.emit(SessionEvent::QuickMatchFailed);
        }
    }

    fn on_member_changed(
        &mut self,
        session: SessionId,
        member: MemberId,
        change: MemberChange,
    ) {
        if !self.view.is_tracking(session) {
            tracing::debug!(%session, %member, %change, "member change for untracked session ignored");
            return;
        }

        if member == self.local_id() {
            if !change.is_departure() {
                return;
            }
            self.reset_local();
            if matches!(change, MemberChange::Kicked | MemberChange::Banned) {
                tracing::info!(%session, %change, "removed from session by the directory");
                self.emit(SessionEvent::KickedFromSession {
                    session_id: session,
                });
            } else {
                tracing::info!(%session, %change, "session exited");
                self.emit(SessionEvent::SessionExited {
                    session_id: session,
                });
            }
            return;
        }

        if !change.is_departure() {
            let roster =
                self.view
                    .process_arrival(session, member, &self.directory, &self.identity);
            self.emit_roster(roster);
            return;
        }

        let departure = self.view.process_departure(
            session,
            member,
            change,
            &self.directory,
            &self.identity,
        );
        self.emit_roster(departure.events);
        if departure.kick_list_changed && self.is_owner() {
            let encoded = self.view.kick_list().encode();
            self.publish_metadata(session, KICK_LIST_KEY, &encoded);
        }
    }

    fn on_metadata_changed(&mut self, session: SessionId, member: Option<MemberId>) {
        if !self.view.is_tracking(session) {
            tracing::debug!(%session, "metadata change for untracked session ignored");
            return;
        }

        match member {
            None => {
                // The kick check comes first: a process about to leave
                // must not act on anything else in this push.
                let kicks = self
                    .directory
                    .metadata(session, KICK_LIST_KEY)
                    .map(|raw| KickList::decode(&raw))
                    .unwrap_or_default();
                if kicks.contains(self.local_id()) {
                    self.leave_kicked(session);
                    return;
                }

                let keys = self.view.refresh_metadata(&self.directory);
                if !keys.is_empty() {
                    self.emit(SessionEvent::SessionMetadataChanged {
                        session_id: session,
                        keys,
                    });
                }
            }
            Some(member) => {
                let roster =
                    self.view
                        .refresh_member(session, member, &self.directory, &self.identity);
                self.emit_roster(roster);
            }
        }

        if let Some(drift) = self.view.detect_owner_drift(&self.directory, &self.identity) {
            self.emit_roster(vec![drift]);
        }
    }

    fn on_chat(
        &mut self,
        session: SessionId,
        sender_id: MemberId,
        data: Vec<u8>,
        entry_type: ChatEntryType,
    ) {
        if !self.view.is_tracking(session) {
            tracing::debug!(%session, %sender_id, "chat for untracked session ignored");
            return;
        }
        let message = ChatMessage {
            session_id: session,
            sender_id,
            sender: self.view.member(sender_id).cloned(),
            text: String::from_utf8_lossy(&data).into_owned(),
            entry_type,
            received_at: SystemTime::now(),
        };
        self.emit(SessionEvent::ChatMessageReceived(message));
    }

    // =====================================================================
    // Helpers
    // =====================================================================

    /// Leaves because the kick list names us. Idempotent: once local
    /// tracking is cleared, repeats of the same push are ignored.
    fn leave_kicked(&mut self, session: SessionId) {
        if let Err(e) = self.directory.leave_session(session) {
            tracing::debug!(%session, error = %e, "leave after kick failed");
        }
        self.reset_local();
        tracing::info!(%session, "asked to leave by the owner");
        self.emit(SessionEvent::KickedFromSession {
            session_id: session,
        });
    }

    /// Best-effort leave of a session we never meant to be in.
    fn leave_remote(&self, session: SessionId) {
        if let Err(e) = self.directory.leave_session(session) {
            tracing::debug!(%session, error = %e, "leave of unexpected session failed");
        }
    }

    /// Sends one session metadata write, reporting a refusal.
    fn publish_metadata(&mut self, session: SessionId, key: &str, value: &str) -> bool {
        match self.directory.set_metadata(session, key, value) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(%session, key, error = %e, "metadata write refused");
                self.emit(SessionEvent::MetadataUpdateFailed {
                    session_id: session,
                });
                false
            }
        }
    }

    fn require_session(&self, operation: &'static str) -> Option<SessionId> {
        if self.has_session() {
            Some(self.view.id())
        } else {
            tracing::warn!(operation, "ignored: no session");
            None
        }
    }

    fn require_owner(&self, operation: &'static str) -> Option<SessionId> {
        let session = self.require_session(operation)?;
        if self.is_owner() {
            Some(session)
        } else {
            tracing::warn!(operation, %session, owner = ?self.view.owner(), "ignored: not the owner");
            None
        }
    }

    fn local_member(&self) -> Member {
        let id = self.local_id();
        Member::new(id, self.identity.display_name(id))
    }

    fn member_or_placeholder(&self, id: MemberId) -> Member {
        self.view
            .member(id)
            .cloned()
            .unwrap_or_else(|| Member::new(id, self.identity.display_name(id)))
    }

    fn emit_roster(&self, roster: Vec<RosterEvent>) {
        let session = self.view.id();
        for change in roster {
            let event = match change {
                RosterEvent::Joined(id) => {
                    tracing::info!(%session, member = %id, "member joined");
                    SessionEvent::MemberJoined(self.member_or_placeholder(id))
                }
                RosterEvent::Left { member, cause } => {
                    tracing::info!(%session, %member, %cause, "member left");
                    SessionEvent::MemberLeft {
                        member_id: member,
                        cause,
                    }
                }
                RosterEvent::DataChanged(id) => {
                    SessionEvent::MemberDataChanged(self.member_or_placeholder(id))
                }
                RosterEvent::OwnershipChanged { previous, current } => {
                    tracing::info!(%session, ?previous, owner = %current, "ownership changed");
                    SessionEvent::OwnershipChanged {
                        previous,
                        owner: self.member_or_placeholder(current),
                    }
                }
            };
            self.emit(event);
        }
    }

    fn emit(&self, event: SessionEvent) {
        tracing::trace!(kind = event.kind(), "session event");
        let _ = self.events.send(event);
    }
}

impl<D, I> std::fmt::Debug for Lobby<D, I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lobby")
            .field("session_id", &self.view.id())
            .field("state", &self.state)
            .field("search", &self.matchmaker.phase())
            .finish_non_exhaustive()
    }
}

