//! Session directory abstraction for Lodge.
//!
//! Provides the [`SessionDirectory`] trait: the narrow interface through
//! which the session core talks to an external rendezvous service. Lodge
//! never implements a directory's wire protocol; it only issues requests
//! through this trait and receives completions as
//! [`BackendEvent`](lodge_protocol::BackendEvent) pushes.
//!
//! # Feature Flags
//!
//! - `memory` (default) — [`InMemoryDirectory`], a process-local directory
//!   that simulates the remote service for tests and demos.

mod error;
#[cfg(feature = "memory")]
mod memory;

pub use error::DirectoryError;
#[cfg(feature = "memory")]
pub use memory::{DirectoryClient, InMemoryDirectory, PushReceiver};

use lodge_protocol::{
    GameServer, MemberId, RequestId, SearchFilter, SessionId, Visibility,
};

/// Requests to, and authoritative reads from, a session directory.
///
/// Every request method returns as soon as the request is queued; its
/// outcome arrives later as a push on whatever channel the implementation
/// delivers them on. An `Err` from a request method means the directory
/// refused it outright and no push will follow.
///
/// The read methods (`session_owner`, `session_members`, `metadata`, ...)
/// answer from the directory's latest known state for a session the caller
/// is in. The membership reconciler treats them as the source of truth.
///
/// # Trait bounds
///
/// - `Send + Sync` → the lobby actor may run on any Tokio worker thread.
/// - `'static` → the directory lives as long as the actor that owns it.
pub trait SessionDirectory: Send + Sync + 'static {
    // -- Requests --

    /// Asks the directory to create a session owned by the caller.
    /// Completes with `SessionCreated` (then `SessionEntered`) or
    /// `SessionCreateFailed`.
    fn create_session(
        &self,
        visibility: Visibility,
        max_members: u32,
    ) -> Result<(), DirectoryError>;

    /// Starts a search. Completes with `SessionListReady` or
    /// `SessionListFailed` carrying the returned [`RequestId`].
    fn request_session_list(
        &self,
        filter: &SearchFilter,
    ) -> Result<RequestId, DirectoryError>;

    /// Asks to join a session. Completes with `SessionEntered` or
    /// `JoinFailed`.
    fn join_session(&self, session: SessionId) -> Result<(), DirectoryError>;

    /// Leaves a session. There is no completion push.
    fn leave_session(&self, session: SessionId) -> Result<(), DirectoryError>;

    /// Writes one session-level metadata value (owner only).
    fn set_metadata(
        &self,
        session: SessionId,
        key: &str,
        value: &str,
    ) -> Result<(), DirectoryError>;

    /// Writes one metadata value for the calling member.
    fn set_member_metadata(
        &self,
        session: SessionId,
        key: &str,
        value: &str,
    ) -> Result<(), DirectoryError>;

    /// Sends a chat datagram to every member. At-most-once, unordered.
    fn send_chat(
        &self,
        session: SessionId,
        data: &[u8],
    ) -> Result<(), DirectoryError>;

    /// Hands ownership to another member (owner only).
    fn transfer_ownership(
        &self,
        session: SessionId,
        new_owner: MemberId,
    ) -> Result<(), DirectoryError>;

    /// Opens or closes the session to new joins (owner only).
    fn set_joinable(
        &self,
        session: SessionId,
        joinable: bool,
    ) -> Result<(), DirectoryError>;

    /// Changes the session's capacity (owner only).
    fn set_member_limit(
        &self,
        session: SessionId,
        max_members: u32,
    ) -> Result<(), DirectoryError>;

    /// Attaches game-server details to the session (owner only).
    fn set_game_server(
        &self,
        session: SessionId,
        server: &GameServer,
    ) -> Result<(), DirectoryError>;

    /// Invites another user into the session.
    fn invite(
        &self,
        session: SessionId,
        invitee: MemberId,
    ) -> Result<(), DirectoryError>;

    // -- Authoritative reads --

    /// The current owner, or `None` if the session is unknown.
    fn session_owner(&self, session: SessionId) -> Option<MemberId>;

    /// The current members, in the directory's order.
    fn session_members(&self, session: SessionId) -> Vec<MemberId>;

    /// One session-level metadata value.
    fn metadata(&self, session: SessionId, key: &str) -> Option<String>;

    /// Every session-level metadata pair.
    fn all_metadata(&self, session: SessionId) -> Vec<(String, String)>;

    /// One member's metadata value.
    fn member_metadata(
        &self,
        session: SessionId,
        member: MemberId,
        key: &str,
    ) -> Option<String>;
}
