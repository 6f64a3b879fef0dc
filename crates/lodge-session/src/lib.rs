//! Local session state for Lodge.
//!
//! This crate holds everything a process knows about the one session it is
//! tracking, and the rules for keeping that knowledge in step with the
//! directory:
//!
//! 1. **Metadata** — the session's public key/value attributes
//!    ([`MetadataStore`]).
//! 2. **Members** — who is in the session and their declared per-member
//!    data ([`Member`]).
//! 3. **Reconciliation** — diffing the directory's authoritative roster
//!    against the local cache and reporting what changed
//!    ([`SessionView`], [`RosterEvent`]).
//! 4. **Soft-kick list** — the pending-removal set carried in a reserved
//!    metadata key ([`KickList`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! Lobby Layer (above)    ← turns roster changes into public events
//!     ↕
//! Session Layer (this crate)  ← local view of one session
//!     ↕
//! Directory + Protocol (below)  ← authoritative reads, ids, pushes
//! ```

mod identity;
mod kick;
mod member;
mod metadata;
mod reconcile;
mod view;

pub use identity::{IdentityProvider, StaticIdentity};
pub use kick::{KICK_LIST_KEY, KickList};
pub use member::Member;
pub use metadata::MetadataStore;
pub use reconcile::{Departure, RosterEvent};
pub use view::{NAME_KEY, SessionView};
