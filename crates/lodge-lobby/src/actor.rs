//! The lobby actor. Owns a [`Lobby`] inside one Tokio task and feeds it
//! commands from an mpsc mailbox.
//!
//! Operations from the owner and pushes from the directory arrive on the
//! same mailbox, so the lobby's state has exactly one writer and is never
//! locked.

use lodge_directory::SessionDirectory;
use lodge_protocol::{BackendEvent, GameServer, MemberId, SearchFilter, SessionId, Visibility};
use lodge_session::IdentityProvider;
use tokio::sync::{mpsc, oneshot};

use crate::{EventSender, Lobby, LobbyConfig, LobbyError, LobbySnapshot};

/// Reply channel for operations that report whether a request went out.
type Reply = oneshot::Sender<bool>;

/// Commands sent to the lobby actor.
pub(crate) enum LobbyCommand {
    Create {
        filter: SearchFilter,
        name: String,
        visibility: Visibility,
        reply: Reply,
    },
    Join {
        session: SessionId,
        reply: Reply,
    },
    Leave {
        reply: Reply,
    },
    SetMetadata {
        key: String,
        value: String,
        reply: Reply,
    },
    SetMemberMetadata {
        key: String,
        value: String,
        reply: Reply,
    },
    SetMemberLimit {
        max_members: u32,
        reply: Reply,
    },
    SetJoinable {
        joinable: bool,
        reply: Reply,
    },
    SetGameServer {
        server: GameServer,
        reply: Reply,
    },
    ChangeOwner {
        new_owner: MemberId,
        reply: Reply,
    },
    Kick {
        target: MemberId,
        reply: Reply,
    },
    Chat {
        text: String,
        reply: Reply,
    },
    Invite {
        invitee: MemberId,
        reply: Reply,
    },
    Search {
        filter: SearchFilter,
        reply: Reply,
    },
    QuickMatch {
        filter: SearchFilter,
        create_name: String,
        auto_create: bool,
        reply: Reply,
    },
    CancelSearch {
        reply: Reply,
    },
    CancelQuickMatch {
        reply: Reply,
    },
    /// A push from the directory (fire-and-forget).
    Backend(BackendEvent),
    Snapshot {
        reply: oneshot::Sender<LobbySnapshot>,
    },
    /// Leave any session and stop the actor.
    Shutdown,
}

/// Handle to a running lobby actor.
///
/// Cheap to clone: it's an `mpsc::Sender` wrapper. Every operation
/// resolves to the same `bool` the synchronous [`Lobby`] method returns.
#[derive(Debug, Clone)]
pub struct LobbyHandle {
    sender: mpsc::Sender<LobbyCommand>,
}

impl LobbyHandle {
    async fn request<T>(
        &self,
        operation: &'static str,
        build: impl FnOnce(oneshot::Sender<T>) -> LobbyCommand,
    ) -> Result<T, LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(build(reply_tx))
            .await
            .map_err(|_| LobbyError::Unavailable)?;
        reply_rx.await.map_err(|_| LobbyError::NoReply(operation))
    }

    pub async fn create_session(
        &self,
        filter: SearchFilter,
        name: impl Into<String>,
        visibility: Visibility,
    ) -> Result<bool, LobbyError> {
        let name = name.into();
        self.request("create_session", |reply| LobbyCommand::Create {
            filter,
            name,
            visibility,
            reply,
        })
        .await
    }

    pub async fn join_session(&self, session: SessionId) -> Result<bool, LobbyError> {
        self.request("join_session", |reply| LobbyCommand::Join { session, reply })
            .await
    }

    pub async fn leave_session(&self) -> Result<bool, LobbyError> {
        self.request("leave_session", |reply| LobbyCommand::Leave { reply })
            .await
    }

    pub async fn set_session_metadata(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<bool, LobbyError> {
        let (key, value) = (key.into(), value.into());
        self.request("set_session_metadata", |reply| LobbyCommand::SetMetadata {
            key,
            value,
            reply,
        })
        .await
    }

    pub async fn set_member_metadata(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<bool, LobbyError> {
        let (key, value) = (key.into(), value.into());
        self.request("set_member_metadata", |reply| {
            LobbyCommand::SetMemberMetadata { key, value, reply }
        })
        .await
    }

    pub async fn set_member_limit(&self, max_members: u32) -> Result<bool, LobbyError> {
        self.request("set_member_limit", |reply| LobbyCommand::SetMemberLimit {
            max_members,
            reply,
        })
        .await
    }

    pub async fn set_joinable(&self, joinable: bool) -> Result<bool, LobbyError> {
        self.request("set_joinable", |reply| LobbyCommand::SetJoinable {
            joinable,
            reply,
        })
        .await
    }

    pub async fn set_game_server(&self, server: GameServer) -> Result<bool, LobbyError> {
        self.request("set_game_server", |reply| LobbyCommand::SetGameServer {
            server,
            reply,
        })
        .await
    }

    pub async fn change_owner(&self, new_owner: MemberId) -> Result<bool, LobbyError> {
        self.request("change_owner", |reply| LobbyCommand::ChangeOwner {
            new_owner,
            reply,
        })
        .await
    }

    pub async fn kick_member(&self, target: MemberId) -> Result<bool, LobbyError> {
        self.request("kick_member", |reply| LobbyCommand::Kick { target, reply })
            .await
    }

    pub async fn send_chat(&self, text: impl Into<String>) -> Result<bool, LobbyError> {
        let text = text.into();
        self.request("send_chat", |reply| LobbyCommand::Chat { text, reply })
            .await
    }

    pub async fn invite(&self, invitee: MemberId) -> Result<bool, LobbyError> {
        self.request("invite", |reply| LobbyCommand::Invite { invitee, reply })
            .await
    }

    pub async fn search(&self, filter: SearchFilter) -> Result<bool, LobbyError> {
        self.request("search", |reply| LobbyCommand::Search { filter, reply })
            .await
    }

    pub async fn quick_match(
        &self,
        filter: SearchFilter,
        create_name: impl Into<String>,
        auto_create: bool,
    ) -> Result<bool, LobbyError> {
        let create_name = create_name.into();
        self.request("quick_match", |reply| LobbyCommand::QuickMatch {
            filter,
            create_name,
            auto_create,
            reply,
        })
        .await
    }

    pub async fn cancel_search(&self) -> Result<bool, LobbyError> {
        self.request("cancel_search", |reply| LobbyCommand::CancelSearch { reply })
            .await
    }

    pub async fn cancel_quick_match(&self) -> Result<bool, LobbyError> {
        self.request("cancel_quick_match", |reply| {
            LobbyCommand::CancelQuickMatch { reply }
        })
        .await
    }

    pub async fn snapshot(&self) -> Result<LobbySnapshot, LobbyError> {
        self.request("snapshot", |reply| LobbyCommand::Snapshot { reply })
            .await
    }

    /// Hands a directory push to the lobby (fire-and-forget).
    pub async fn deliver(&self, event: BackendEvent) -> Result<(), LobbyError> {
        self.sender
            .send(LobbyCommand::Backend(event))
            .await
            .map_err(|_| LobbyError::Unavailable)
    }

    /// Tells the lobby to leave its session and stop.
    pub async fn shutdown(&self) -> Result<(), LobbyError> {
        self.sender
            .send(LobbyCommand::Shutdown)
            .await
            .map_err(|_| LobbyError::Unavailable)
    }

    /// Returns `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// The actor task's state.
struct LobbyActor<D, I> {
    lobby: Lobby<D, I>,
    receiver: mpsc::Receiver<LobbyCommand>,
}

impl<D: SessionDirectory, I: IdentityProvider> LobbyActor<D, I> {
    /// Runs until shutdown or until every handle is dropped.
    async fn run(mut self) {
        let local = self.lobby.local_id();
        tracing::info!(member = %local, "lobby actor started");

        while let Some(cmd) = self.receiver.recv().await {
            if !self.handle(cmd) {
                tracing::info!(member = %local, "lobby shutting down");
                break;
            }
        }

        if self.lobby.has_session() {
            self.lobby.leave_session();
        }
        tracing::info!(member = %local, "lobby actor stopped");
    }

    /// Applies one command. Returns `false` on shutdown.
    fn handle(&mut self, cmd: LobbyCommand) -> bool {
        let lobby = &mut self.lobby;
        match cmd {
            LobbyCommand::Create {
                filter,
                name,
                visibility,
                reply,
            } => {
                let _ = reply.send(lobby.create_session(&filter, &name, visibility));
            }
            LobbyCommand::Join { session, reply } => {
                let _ = reply.send(lobby.join_session(session));
            }
            LobbyCommand::Leave { reply } => {
                let _ = reply.send(lobby.leave_session());
            }
            LobbyCommand::SetMetadata { key, value, reply } => {
                let _ = reply.send(lobby.set_session_metadata(&key, &value));
            }
            LobbyCommand::SetMemberMetadata { key, value, reply } => {
                let _ = reply.send(lobby.set_member_metadata(&key, &value));
            }
            LobbyCommand::SetMemberLimit { max_members, reply } => {
                let _ = reply.send(lobby.set_member_limit(max_members));
            }
            LobbyCommand::SetJoinable { joinable, reply } => {
                let _ = reply.send(lobby.set_joinable(joinable));
            }
            LobbyCommand::SetGameServer { server, reply } => {
                let _ = reply.send(lobby.set_game_server(server));
            }
            LobbyCommand::ChangeOwner { new_owner, reply } => {
                let _ = reply.send(lobby.change_owner(new_owner));
            }
            LobbyCommand::Kick { target, reply } => {
                let _ = reply.send(lobby.kick_member(target));
            }
            LobbyCommand::Chat { text, reply } => {
                let _ = reply.send(lobby.send_chat(&text));
            }
            LobbyCommand::Invite { invitee, reply } => {
                let _ = reply.send(lobby.invite(invitee));
            }
            LobbyCommand::Search { filter, reply } => {
                let _ = reply.send(lobby.search(&filter));
            }
            LobbyCommand::QuickMatch {
                filter,
                create_name,
                auto_create,
                reply,
            } => {
                let _ = reply.send(lobby.quick_match(&filter, &create_name, auto_create));
            }
            LobbyCommand::CancelSearch { reply } => {
                let _ = reply.send(lobby.cancel_search());
            }
            LobbyCommand::CancelQuickMatch { reply } => {
                let _ = reply.send(lobby.cancel_quick_match());
            }
            LobbyCommand::Backend(event) => lobby.handle_backend_event(event),
            LobbyCommand::Snapshot { reply } => {
                let _ = reply.send(lobby.snapshot());
            }
            LobbyCommand::Shutdown => return false,
        }
        true
    }
}

/// Spawns a lobby actor and returns a handle to it.
///
/// The mailbox is bounded by `config.mailbox_size`: when it fills up,
/// senders wait.
pub fn spawn_lobby<D, I>(
    directory: D,
    identity: I,
    config: LobbyConfig,
    events: EventSender,
) -> LobbyHandle
where
    D: SessionDirectory,
    I: IdentityProvider,
{
    let config = config.validated();
    let (tx, rx) = mpsc::channel(config.mailbox_size);

    let actor = LobbyActor {
        lobby: Lobby::new(directory, identity, config, events),
        receiver: rx,
    };
    tokio::spawn(actor.run());

    LobbyHandle { sender: tx }
}
