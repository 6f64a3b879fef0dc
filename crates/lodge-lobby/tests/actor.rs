//! Lobby actor tests: real tasks, pushes forwarded through the mailbox.

use std::time::Duration;

use lodge_directory::InMemoryDirectory;
use lodge_lobby::{
    EventReceiver, LobbyConfig, LobbyError, LobbyHandle, LobbyState, SessionEvent,
    spawn_lobby,
};
use lodge_protocol::{MemberChange, MemberId, SearchFilter, SessionId, Visibility};
use lodge_session::StaticIdentity;
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);

/// Spawns a lobby for `user` and a task forwarding its pushes into it.
fn spawn_peer(dir: &InMemoryDirectory, user: MemberId, name: &str) -> (LobbyHandle, EventReceiver) {
    let (client, mut pushes) = dir.connect(user);
    let (tx, events) = mpsc::unbounded_channel();
    let handle = spawn_lobby(
        client,
        StaticIdentity::new(user, name),
        LobbyConfig::default(),
        tx,
    );

    let forward = handle.clone();
    tokio::spawn(async move {
        while let Some(push) = pushes.recv().await {
            if forward.deliver(push).await.is_err() {
                break;
            }
        }
    });
    (handle, events)
}

/// Waits for the first event matching `pred`, skipping the rest.
async fn wait_for(
    events: &mut EventReceiver,
    pred: impl Fn(&SessionEvent) -> bool,
) -> SessionEvent {
    timeout(WAIT, async {
        loop {
            match events.recv().await {
                Some(event) if pred(&event) => return event,
                Some(_) => continue,
                None => panic!("event stream closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

async fn created(events: &mut EventReceiver) -> SessionId {
    match wait_for(events, |e| matches!(e, SessionEvent::SessionEntered { .. })).await {
        SessionEvent::SessionEntered { session_id } => session_id,
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_create_through_handle() {
    let dir = InMemoryDirectory::new();
    let (ana, mut ana_events) = spawn_peer(&dir, MemberId(1), "Ana");

    let sent = ana
        .create_session(SearchFilter::new(), "Den", Visibility::Public)
        .await
        .unwrap();
    assert!(sent);
    let session = created(&mut ana_events).await;

    let snapshot = ana.snapshot().await.unwrap();
    assert_eq!(snapshot.session_id, session);
    assert_eq!(snapshot.state, LobbyState::InSession);
    assert_eq!(snapshot.name, "Den");
    assert!(snapshot.is_owner);
}

#[tokio::test]
async fn test_join_and_kick_through_handles() {
    let dir = InMemoryDirectory::new();
    let (ana, mut ana_events) = spawn_peer(&dir, MemberId(1), "Ana");
    let (ben, mut ben_events) = spawn_peer(&dir, MemberId(2), "Ben");

    ana.create_session(SearchFilter::new(), "Den", Visibility::Public)
        .await
        .unwrap();
    let session = created(&mut ana_events).await;

    assert!(ben.join_session(session).await.unwrap());
    created(&mut ben_events).await;
    wait_for(&mut ana_events, |e| {
        matches!(e, SessionEvent::MemberJoined(m) if m.id == MemberId(2))
    })
    .await;

    assert!(ana.kick_member(MemberId(2)).await.unwrap());

    let kicked = wait_for(&mut ben_events, |e| {
        matches!(e, SessionEvent::KickedFromSession { .. })
    })
    .await;
    assert_eq!(kicked, SessionEvent::KickedFromSession { session_id: session });
    wait_for(&mut ana_events, |e| {
        matches!(e, SessionEvent::MemberLeft { member_id: MemberId(2), cause: MemberChange::Left })
    })
    .await;
    assert!(!ben.snapshot().await.unwrap().has_session);
}

#[tokio::test]
async fn test_operations_without_session_report_false() {
    let dir = InMemoryDirectory::new();
    let (ana, _events) = spawn_peer(&dir, MemberId(1), "Ana");

    assert!(!ana.leave_session().await.unwrap());
    assert!(!ana.send_chat("hello?").await.unwrap());
    assert!(!ana.kick_member(MemberId(2)).await.unwrap());
    assert!(!ana.set_session_metadata("mode", "coop").await.unwrap());
}

#[tokio::test]
async fn test_shutdown_leaves_session_and_closes_handle() {
    let dir = InMemoryDirectory::new();
    let (ana, mut ana_events) = spawn_peer(&dir, MemberId(1), "Ana");
    let (ben, mut ben_events) = spawn_peer(&dir, MemberId(2), "Ben");
    ana.create_session(SearchFilter::new(), "Den", Visibility::Public)
        .await
        .unwrap();
    let session = created(&mut ana_events).await;
    ben.join_session(session).await.unwrap();
    created(&mut ben_events).await;

    ana.shutdown().await.unwrap();

    wait_for(&mut ben_events, |e| {
        matches!(e, SessionEvent::OwnershipChanged { owner, .. } if owner.id == MemberId(2))
    })
    .await;
    timeout(WAIT, async {
        while !ana.is_closed() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("actor should stop");
    assert_eq!(ana.snapshot().await, Err(LobbyError::Unavailable));
}

#[tokio::test]
async fn test_quick_match_through_handle_creates_when_empty() {
    let dir = InMemoryDirectory::new();
    let (cy, mut events) = spawn_peer(&dir, MemberId(3), "Cy");

    assert!(cy.quick_match(SearchFilter::new(), "", true).await.unwrap());

    wait_for(&mut events, |e| matches!(e, SessionEvent::SessionCreated { .. })).await;
    let snapshot = cy.snapshot().await.unwrap();
    assert!(snapshot.is_owner);
    assert_eq!(snapshot.name, "Cy");
    assert_eq!(dir.session_count(), 1);
}
