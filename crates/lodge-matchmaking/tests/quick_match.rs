//! Quick match against the in-memory directory.
//!
//! The matchmaker never reads pushes itself, so these tests play the part
//! of the lobby: they pull `SessionListReady` off the inbox and feed it
//! back in.

use lodge_directory::{InMemoryDirectory, PushReceiver, SessionDirectory};
use lodge_matchmaking::{Matchmaker, SearchOutcome, SearchPhase};
use lodge_protocol::{
    BackendEvent, Comparison, DistanceTier, MemberId, RequestId, SearchFilter,
    SessionCandidate, SessionId, Visibility,
};

fn next_list(rx: &mut PushReceiver) -> (RequestId, Vec<SessionCandidate>) {
    loop {
        match rx.try_recv() {
            Ok(BackendEvent::SessionListReady { request, candidates }) => {
                return (request, candidates);
            }
            Ok(_) => continue,
            Err(e) => panic!("no session list pushed: {e:?}"),
        }
    }
}

fn hosted_at(dir: &InMemoryDirectory, owner: u64, tier: DistanceTier, mode: &str) -> SessionId {
    let (client, mut rx) = dir.connect(MemberId(owner));
    client.create_session(Visibility::Public, 4).unwrap();
    let session = match rx.try_recv() {
        Ok(BackendEvent::SessionCreated { session_id }) => session_id,
        other => panic!("unexpected push {other:?}"),
    };
    client.set_metadata(session, "mode", mode).unwrap();
    dir.set_distance(session, tier).unwrap();
    session
}

#[test]
fn test_quick_match_finds_far_session_after_two_escalations() {
    let dir = InMemoryDirectory::new();
    let far = hosted_at(&dir, 1, DistanceTier::Far, "coop");
    let (seeker, mut rx) = dir.connect(MemberId(9));
    let mut mm = Matchmaker::new(DistanceTier::Worldwide);
    let filter = SearchFilter::new().string("mode", "coop", Comparison::Equal);

    mm.start_quick_match(&filter, "mine", true, &seeker).unwrap();

    let mut outcomes = Vec::new();
    while mm.pending_request().is_some() {
        let (request, candidates) = next_list(&mut rx);
        outcomes.push(mm.on_results(request, candidates, &seeker));
    }

    assert_eq!(
        outcomes,
        vec![
            SearchOutcome::Escalated(DistanceTier::Default),
            SearchOutcome::Escalated(DistanceTier::Far),
            SearchOutcome::Join(far),
        ]
    );
    assert_eq!(mm.phase(), SearchPhase::Joining(far));
}

#[test]
fn test_quick_match_ignores_sessions_beyond_ceiling() {
    let dir = InMemoryDirectory::new();
    hosted_at(&dir, 1, DistanceTier::Worldwide, "coop");
    let (seeker, mut rx) = dir.connect(MemberId(9));
    let mut mm = Matchmaker::new(DistanceTier::Far);
    let filter = SearchFilter::new().string("mode", "coop", Comparison::Equal);

    mm.start_quick_match(&filter, "mine", true, &seeker).unwrap();

    let mut last = None;
    while mm.pending_request().is_some() {
        let (request, candidates) = next_list(&mut rx);
        last = Some(mm.on_results(request, candidates, &seeker));
    }

    assert_eq!(
        last,
        Some(SearchOutcome::Create {
            filter,
            name: "mine".into(),
        })
    );
}

#[test]
fn test_standard_search_reports_all_matching_sessions() {
    let dir = InMemoryDirectory::new();
    let a = hosted_at(&dir, 1, DistanceTier::Close, "coop");
    let b = hosted_at(&dir, 2, DistanceTier::Default, "coop");
    hosted_at(&dir, 3, DistanceTier::Close, "versus");
    let (seeker, mut rx) = dir.connect(MemberId(9));
    let mut mm = Matchmaker::default();

    mm.start_search(
        &SearchFilter::new().string("mode", "coop", Comparison::Equal),
        &seeker,
    )
    .unwrap();
    let (request, candidates) = next_list(&mut rx);

    match mm.on_results(request, candidates, &seeker) {
        SearchOutcome::Results(found) => {
            let mut ids: Vec<SessionId> = found.iter().map(|c| c.id).collect();
            ids.sort();
            let mut expected = vec![a, b];
            expected.sort();
            assert_eq!(ids, expected);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}
