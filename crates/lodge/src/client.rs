//! `LodgeClient` builder: wires a directory, an identity, and a lobby
//! actor together.

use lodge_directory::SessionDirectory;
use lodge_lobby::{
    EventReceiver, LobbyConfig, LobbyHandle, SessionEvent, spawn_lobby,
};
use lodge_protocol::{BackendEvent, DistanceTier, MemberId, Visibility};
use lodge_session::IdentityProvider;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Builder for a [`LodgeClient`].
///
/// # Example
///
/// ```rust,ignore
/// use lodge::prelude::*;
///
/// let client = LodgeClient::builder()
///     .max_members(8)
///     .max_distance(DistanceTier::Far)
///     .member_data_key("ready")
///     .build(directory, identity);
/// client.forward(pushes);
/// ```
#[derive(Debug, Clone, Default)]
pub struct LodgeClientBuilder {
    config: LobbyConfig,
}

impl LodgeClientBuilder {
    /// Creates a builder with [`LobbyConfig::default`] settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration, e.g. one loaded from a file.
    pub fn config(mut self, config: LobbyConfig) -> Self {
        self.config = config;
        self
    }

    /// Capacity of sessions this client creates.
    pub fn max_members(mut self, max_members: u32) -> Self {
        self.config.max_members = max_members;
        self
    }

    /// The widest tier quick match may escalate to.
    pub fn max_distance(mut self, tier: DistanceTier) -> Self {
        self.config.max_distance = tier;
        self
    }

    /// Declares a member-data key synchronized for every member.
    pub fn member_data_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        if !self.config.member_data_keys.contains(&key) {
            self.config.member_data_keys.push(key);
        }
        self
    }

    /// Visibility used for sessions quick match creates.
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.config.visibility = visibility;
        self
    }

    /// Capacity of the lobby actor's mailbox.
    pub fn mailbox_size(mut self, size: usize) -> Self {
        self.config.mailbox_size = size;
        self
    }

    /// Spawns the lobby actor. Must be called inside a Tokio runtime.
    ///
    /// Pushes from the directory still need to be routed in, with
    /// [`LodgeClient::forward`] or [`LobbyHandle::deliver`].
    pub fn build<D, I>(self, directory: D, identity: I) -> LodgeClient
    where
        D: SessionDirectory,
        I: IdentityProvider,
    {
        let local_id = identity.local_identity();
        let (tx, events) = mpsc::unbounded_channel();
        let handle = spawn_lobby(directory, identity, self.config, tx);
        tracing::debug!(member = %local_id, "lodge client started");
        LodgeClient {
            local_id,
            handle,
            events,
        }
    }

    /// Connects `identity`'s user to an in-memory directory, builds the
    /// client, and starts forwarding its pushes.
    #[cfg(feature = "memory")]
    pub fn connect_in_memory<I>(
        self,
        directory: &lodge_directory::InMemoryDirectory,
        identity: I,
    ) -> LodgeClient
    where
        I: IdentityProvider,
    {
        let (client, pushes) = directory.connect(identity.local_identity());
        let lodge = self.build(client, identity);
        lodge.forward(pushes);
        lodge
    }
}

/// A running lobby plus its event stream.
#[derive(Debug)]
pub struct LodgeClient {
    local_id: MemberId,
    handle: LobbyHandle,
    events: EventReceiver,
}

impl LodgeClient {
    pub fn builder() -> LodgeClientBuilder {
        LodgeClientBuilder::new()
    }

    pub fn local_id(&self) -> MemberId {
        self.local_id
    }

    /// The handle used to issue operations. Clone it freely.
    pub fn handle(&self) -> &LobbyHandle {
        &self.handle
    }

    /// Waits for the next event. Returns `None` once the lobby has
    /// stopped and every event has been read.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Returns the next event if one is already waiting.
    pub fn try_next_event(&mut self) -> Option<SessionEvent> {
        self.events.try_recv().ok()
    }

    /// Spawns a task that copies `pushes` into the lobby's mailbox, in
    /// order. The task ends when either side closes.
    pub fn forward(
        &self,
        mut pushes: mpsc::UnboundedReceiver<BackendEvent>,
    ) -> JoinHandle<()> {
        let handle = self.handle.clone();
        let member = self.local_id;
        tokio::spawn(async move {
            while let Some(push) = pushes.recv().await {
                if handle.deliver(push).await.is_err() {
                    tracing::debug!(%member, "lobby stopped; push forwarding ended");
                    return;
                }
            }
            tracing::debug!(%member, "push stream closed");
        })
    }

    /// Splits the client into its handle and event stream.
    pub fn into_parts(self) -> (LobbyHandle, EventReceiver) {
        (self.handle, self.events)
    }
}
