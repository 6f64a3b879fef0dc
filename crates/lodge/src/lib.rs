//! # Lodge
//!
//! A session lobby engine: small groups meet in sessions hosted by an
//! external directory service, and each process keeps its own view of the
//! session in step with the directory.
//!
//! Lodge handles session lifecycle (create, join, leave), membership
//! reconciliation, a cooperative soft-kick carried in session metadata,
//! and quick match with distance-tier escalation. Applications plug in a
//! [`SessionDirectory`](lodge_directory::SessionDirectory) and an
//! [`IdentityProvider`](lodge_session::IdentityProvider); everything else
//! is driven through a [`LobbyHandle`](lodge_lobby::LobbyHandle) and
//! observed as [`SessionEvent`](lodge_lobby::SessionEvent)s.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lodge::prelude::*;
//!
//! # async fn demo() -> Result<(), LodgeError> {
//! let directory = InMemoryDirectory::new();
//! let mut client = LodgeClient::builder()
//!     .max_members(4)
//!     .connect_in_memory(&directory, StaticIdentity::new(MemberId(1), "Ana"));
//!
//! client
//!     .handle()
//!     .quick_match(SearchFilter::new(), "Ana's room", true)
//!     .await?;
//! while let Some(event) = client.next_event().await {
//!     println!("{}", event.kind());
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;

pub use client::{LodgeClient, LodgeClientBuilder};
pub use error::LodgeError;

/// Installs a `tracing` subscriber for binaries.
///
/// `RUST_LOG` wins when it is set; otherwise `default_filter` is used.
/// Calling this twice is harmless: the second call does nothing.
pub fn init_tracing(default_filter: &str) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Re-exports of the types most applications need.
pub mod prelude {
    pub use crate::{LodgeClient, LodgeClientBuilder, LodgeError, init_tracing};
    #[cfg(feature = "memory")]
    pub use lodge_directory::InMemoryDirectory;
    pub use lodge_directory::{DirectoryError, SessionDirectory};
    pub use lodge_lobby::{
        ChatMessage, LobbyConfig, LobbyHandle, LobbySnapshot, LobbyState,
        SessionEvent,
    };
    pub use lodge_matchmaking::SearchPhase;
    pub use lodge_protocol::{
        BackendEvent, ChatEntryType, Comparison, DistanceTier, GameServer,
        MemberChange, MemberId, SearchFilter, SessionCandidate, SessionId,
        Visibility,
    };
    pub use lodge_session::{IdentityProvider, Member, StaticIdentity};
}
