//! Session lifecycle management for Lodge.
//!
//! A [`Lobby`] owns everything one process knows about its session and
//! its searches. It translates public operations into directory requests
//! and directory pushes into [`SessionEvent`]s. The lobby runs as an
//! isolated Tokio task (actor model): operations and pushes are both
//! commands on one mailbox, so every state change has a single writer.
//!
//! # Key types
//!
//! - [`Lobby`] — the synchronous core, usable directly in tests
//! - [`LobbyHandle`] — send operations and pushes to a running lobby actor
//! - [`SessionEvent`] — everything a lobby reports to its owner
//! - [`LobbyState`] — coarse lifecycle state machine
//! - [`LobbyConfig`] — capacity, quick-match ceiling, declared member keys

mod actor;
mod config;
mod error;
mod event;
mod lobby;

pub use actor::{LobbyHandle, spawn_lobby};
pub use config::{LobbyConfig, LobbyState, MAX_MEMBERS_LIMIT};
pub use error::LobbyError;
pub use event::{ChatMessage, EventReceiver, EventSender, SessionEvent};
pub use lobby::{Lobby, LobbySnapshot};
