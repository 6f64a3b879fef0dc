//! Integration tests for the in-memory directory with several users.

use lodge_directory::{
    DirectoryError, InMemoryDirectory, PushReceiver, SessionDirectory,
};
use lodge_protocol::{
    BackendEvent, Comparison, DistanceTier, GameServer, MemberChange,
    MemberId, SearchFilter, SessionCandidate, SessionId, Visibility,
};

// =========================================================================
// Helpers
// =========================================================================

fn drain(rx: &mut PushReceiver) -> Vec<BackendEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn host(
    dir: &InMemoryDirectory,
    owner: MemberId,
    max: u32,
) -> (lodge_directory::DirectoryClient, PushReceiver, SessionId) {
    let (client, mut rx) = dir.connect(owner);
    client.create_session(Visibility::Public, max).unwrap();
    let session = drain(&mut rx)
        .into_iter()
        .find_map(|e| match e {
            BackendEvent::SessionCreated { session_id } => Some(session_id),
            _ => None,
        })
        .expect("create should push SessionCreated");
    (client, rx, session)
}

fn listed(events: Vec<BackendEvent>) -> Vec<SessionCandidate> {
    match events.as_slice() {
        [BackendEvent::SessionListReady { candidates, .. }] => candidates.clone(),
        other => panic!("expected one SessionListReady, got {other:?}"),
    }
}

// =========================================================================
// Membership
// =========================================================================

#[tokio::test]
async fn test_join_notifies_existing_members_but_not_joiner() {
    let dir = InMemoryDirectory::new();
    let (_alice, mut a_rx, session) = host(&dir, MemberId(1), 4);
    let (bob, mut b_rx) = dir.connect(MemberId(2));

    bob.join_session(session).unwrap();

    assert_eq!(
        drain(&mut b_rx),
        vec![BackendEvent::SessionEntered { session_id: session }]
    );
    assert_eq!(
        drain(&mut a_rx),
        vec![BackendEvent::MemberChanged {
            session_id: session,
            member_id: MemberId(2),
            change: MemberChange::Entered,
        }]
    );
}

#[tokio::test]
async fn test_join_twice_does_not_duplicate_member() {
    let dir = InMemoryDirectory::new();
    let (alice, mut a_rx, session) = host(&dir, MemberId(1), 4);
    let (bob, _b_rx) = dir.connect(MemberId(2));

    bob.join_session(session).unwrap();
    bob.join_session(session).unwrap();

    assert_eq!(alice.session_members(session), vec![MemberId(1), MemberId(2)]);
    assert_eq!(drain(&mut a_rx).len(), 1);
}

#[tokio::test]
async fn test_join_closed_session_fails() {
    let dir = InMemoryDirectory::new();
    let (alice, _a_rx, session) = host(&dir, MemberId(1), 4);
    alice.set_joinable(session, false).unwrap();
    let (bob, mut b_rx) = dir.connect(MemberId(2));

    bob.join_session(session).unwrap();

    assert!(matches!(
        drain(&mut b_rx).as_slice(),
        [BackendEvent::JoinFailed { session_id, .. }] if *session_id == session
    ));
    assert_eq!(dir.is_joinable(session), Some(false));
}

#[tokio::test]
async fn test_moderator_kick_pushes_kicked_to_everyone_and_the_target() {
    let dir = InMemoryDirectory::new();
    let (_alice, mut a_rx, session) = host(&dir, MemberId(1), 4);
    let (bob, mut b_rx) = dir.connect(MemberId(2));
    bob.join_session(session).unwrap();
    drain(&mut a_rx);
    drain(&mut b_rx);

    dir.remove_member(session, MemberId(2), MemberChange::Kicked)
        .unwrap();

    let kicked = BackendEvent::MemberChanged {
        session_id: session,
        member_id: MemberId(2),
        change: MemberChange::Kicked,
    };
    assert_eq!(drain(&mut a_rx), vec![kicked.clone()]);
    assert_eq!(drain(&mut b_rx), vec![kicked]);
}

#[tokio::test]
async fn test_remove_member_rejects_entered_cause() {
    let dir = InMemoryDirectory::new();
    let (_alice, _a_rx, session) = host(&dir, MemberId(1), 4);

    let result = dir.remove_member(session, MemberId(1), MemberChange::Entered);

    assert!(matches!(result, Err(DirectoryError::Rejected(_))));
}

#[tokio::test]
async fn test_leave_by_non_member_is_an_error() {
    let dir = InMemoryDirectory::new();
    let (_alice, _a_rx, session) = host(&dir, MemberId(1), 4);
    let (bob, _b_rx) = dir.connect(MemberId(2));

    assert_eq!(
        bob.leave_session(session),
        Err(DirectoryError::NotAMember(MemberId(2), session))
    );
}

// =========================================================================
// Ownership and metadata
// =========================================================================

#[tokio::test]
async fn test_transfer_ownership_pushes_session_metadata_change() {
    let dir = InMemoryDirectory::new();
    let (alice, mut a_rx, session) = host(&dir, MemberId(1), 4);
    let (bob, mut b_rx) = dir.connect(MemberId(2));
    bob.join_session(session).unwrap();
    drain(&mut a_rx);
    drain(&mut b_rx);

    alice.transfer_ownership(session, MemberId(2)).unwrap();

    let expected = BackendEvent::MetadataChanged {
        session_id: session,
        member_id: None,
    };
    assert_eq!(drain(&mut a_rx), vec![expected.clone()]);
    assert_eq!(drain(&mut b_rx), vec![expected]);
    assert_eq!(alice.session_owner(session), Some(MemberId(2)));
}

#[tokio::test]
async fn test_transfer_ownership_to_outsider_is_rejected() {
    let dir = InMemoryDirectory::new();
    let (alice, _a_rx, session) = host(&dir, MemberId(1), 4);

    assert_eq!(
        alice.transfer_ownership(session, MemberId(9)),
        Err(DirectoryError::NotAMember(MemberId(9), session))
    );
}

#[tokio::test]
async fn test_member_metadata_is_per_member() {
    let dir = InMemoryDirectory::new();
    let (alice, _a_rx, session) = host(&dir, MemberId(1), 4);
    let (bob, mut b_rx) = dir.connect(MemberId(2));
    bob.join_session(session).unwrap();
    drain(&mut b_rx);

    bob.set_member_metadata(session, "ready", "yes").unwrap();

    assert_eq!(
        alice.member_metadata(session, MemberId(2), "ready").as_deref(),
        Some("yes")
    );
    assert_eq!(alice.member_metadata(session, MemberId(1), "ready"), None);
    assert_eq!(
        drain(&mut b_rx),
        vec![BackendEvent::MetadataChanged {
            session_id: session,
            member_id: Some(MemberId(2)),
        }]
    );
}

#[tokio::test]
async fn test_game_server_is_stored_and_pushed() {
    let dir = InMemoryDirectory::new();
    let (alice, mut a_rx, session) = host(&dir, MemberId(1), 4);
    let server = GameServer::hosted_by(MemberId(1));

    alice.set_game_server(session, &server).unwrap();

    assert_eq!(dir.game_server(session), Some(server.clone()));
    assert_eq!(
        drain(&mut a_rx),
        vec![BackendEvent::GameServerSet {
            session_id: session,
            server,
        }]
    );
}

#[tokio::test]
async fn test_member_limit_applies_to_later_joins() {
    let dir = InMemoryDirectory::new();
    let (alice, _a_rx, session) = host(&dir, MemberId(1), 8);
    alice.set_member_limit(session, 1).unwrap();
    let (bob, mut b_rx) = dir.connect(MemberId(2));

    bob.join_session(session).unwrap();

    assert_eq!(dir.member_limit(session), Some(1));
    assert!(matches!(
        drain(&mut b_rx).as_slice(),
        [BackendEvent::JoinFailed { .. }]
    ));
}

// =========================================================================
// Chat and invites
// =========================================================================

#[tokio::test]
async fn test_chat_reaches_every_member_including_sender() {
    let dir = InMemoryDirectory::new();
    let (alice, mut a_rx, session) = host(&dir, MemberId(1), 4);
    let (bob, mut b_rx) = dir.connect(MemberId(2));
    bob.join_session(session).unwrap();
    drain(&mut a_rx);
    drain(&mut b_rx);

    alice.send_chat(session, b"gg").unwrap();

    for rx in [&mut a_rx, &mut b_rx] {
        assert!(matches!(
            drain(rx).as_slice(),
            [BackendEvent::ChatReceived { sender_id, data, .. }]
                if *sender_id == MemberId(1) && data.as_slice() == b"gg"
        ));
    }
}

#[tokio::test]
async fn test_empty_chat_is_rejected() {
    let dir = InMemoryDirectory::new();
    let (alice, _a_rx, session) = host(&dir, MemberId(1), 4);

    assert!(matches!(
        alice.send_chat(session, b""),
        Err(DirectoryError::Rejected(_))
    ));
}

#[tokio::test]
async fn test_invite_pushes_join_requested_to_invitee() {
    let dir = InMemoryDirectory::new();
    let (alice, _a_rx, session) = host(&dir, MemberId(1), 4);
    let (_bob, mut b_rx) = dir.connect(MemberId(2));

    alice.invite(session, MemberId(2)).unwrap();

    assert_eq!(
        drain(&mut b_rx),
        vec![BackendEvent::JoinRequested {
            session_id: session,
            from: MemberId(1),
        }]
    );
}

// =========================================================================
// Search
// =========================================================================

#[tokio::test]
async fn test_search_filters_on_numeric_attribute() {
    let dir = InMemoryDirectory::new();
    let (alice, _a_rx, low) = host(&dir, MemberId(1), 4);
    alice.set_metadata(low, "level", "3").unwrap();
    let (carol, _c_rx, high) = host(&dir, MemberId(3), 4);
    carol.set_metadata(high, "level", "12").unwrap();
    let (bob, mut b_rx) = dir.connect(MemberId(2));

    let filter =
        SearchFilter::new().numeric("level", 10, Comparison::EqualOrGreaterThan);
    bob.request_session_list(&filter).unwrap();

    let ids: Vec<SessionId> = listed(drain(&mut b_rx)).iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![high]);
}

#[tokio::test]
async fn test_search_ranks_by_near_filter_and_caps_results() {
    let dir = InMemoryDirectory::new();
    let mut sessions = Vec::new();
    for (user, skill) in [(1, "1000"), (2, "1480"), (3, "2400")] {
        let (client, _rx, session) = host(&dir, MemberId(user), 4);
        client.set_metadata(session, "skill", skill).unwrap();
        sessions.push(session);
    }
    let (seeker, mut rx) = dir.connect(MemberId(9));

    let filter = SearchFilter::new().near("skill", 1500).with_result_cap(2);
    let request = seeker.request_session_list(&filter).unwrap();

    let events = drain(&mut rx);
    assert!(matches!(
        events.as_slice(),
        [BackendEvent::SessionListReady { request: r, .. }] if *r == request
    ));
    let ids: Vec<SessionId> = listed(events).iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![sessions[1], sessions[0]]);
}

#[tokio::test]
async fn test_search_slots_available_excludes_nearly_full_sessions() {
    let dir = InMemoryDirectory::new();
    let (_alice, _a_rx, session) = host(&dir, MemberId(1), 2);
    let (bob, mut b_rx) = dir.connect(MemberId(2));

    bob.request_session_list(&SearchFilter::new().with_slots_available(2))
        .unwrap();
    assert!(listed(drain(&mut b_rx)).is_empty());

    bob.request_session_list(&SearchFilter::new().with_slots_available(1))
        .unwrap();
    let found = listed(drain(&mut b_rx));
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, session);
    assert_eq!(found[0].owner_id, Some(MemberId(1)));
}

#[tokio::test]
async fn test_search_without_distance_sees_default_tier() {
    let dir = InMemoryDirectory::new();
    let (_alice, _a_rx, near) = host(&dir, MemberId(1), 4);
    dir.set_distance(near, DistanceTier::Default).unwrap();
    let (_carol, _c_rx, far) = host(&dir, MemberId(3), 4);
    dir.set_distance(far, DistanceTier::Worldwide).unwrap();
    let (bob, mut b_rx) = dir.connect(MemberId(2));

    bob.request_session_list(&SearchFilter::new()).unwrap();
    let ids: Vec<SessionId> = listed(drain(&mut b_rx)).iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![near]);

    bob.request_session_list(
        &SearchFilter::new().with_distance(DistanceTier::Worldwide),
    )
    .unwrap();
    assert_eq!(listed(drain(&mut b_rx)).len(), 2);
}
