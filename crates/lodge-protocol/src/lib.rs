//! Shared vocabulary for Lodge.
//!
//! This crate defines the "language" spoken between the session core and
//! the external session directory:
//!
//! - **Types** ([`SessionId`], [`MemberId`], [`SessionCandidate`], etc.) —
//!   the identities and records the directory hands back.
//! - **Filters** ([`SearchFilter`], [`DistanceTier`], [`Comparison`]) —
//!   how a search is described before it is sent to the directory.
//! - **Events** ([`BackendEvent`]) — every unsolicited push the directory
//!   can deliver, as one tagged union.
//! - **Errors** ([`ProtocolError`]) — what can go wrong when parsing
//!   protocol values from text.
//!
//! # Architecture
//!
//! The protocol layer sits below everything else. It doesn't know about
//! members, lobbies, or searches in flight. It only knows the shape of
//! the data.
//!
//! ```text
//! Directory (requests + pushes) → Protocol (BackendEvent) → Lobby (state)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod error;
mod event;
mod filter;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use error::ProtocolError;
pub use event::BackendEvent;
pub use filter::{
    Comparison, DistanceTier, NearFilter, NumericFilter, SearchFilter,
    StringFilter,
};
pub use types::{
    ChatEntryType, GameServer, MemberChange, MemberId, RequestId,
    SessionCandidate, SessionId, Visibility,
};
