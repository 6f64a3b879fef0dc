//! Three simulated players on an in-memory directory: they quick match
//! into one session, chat, and the owner soft-kicks one of them.
//!
//! Pass a JSON `LobbyConfig` as the first argument to override defaults:
//!
//! ```text
//! cargo run -p quick-match -- '{"max_members": 3, "max_distance": "Far"}'
//! ```

use std::time::Duration;

use lodge::prelude::*;
use tokio::time::timeout;

const STEP: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_config() -> Result<LobbyConfig, Box<dyn std::error::Error>> {
    match std::env::args().nth(1) {
        Some(raw) => Ok(serde_json::from_str(&raw)?),
        None => Ok(LobbyConfig::default()),
    }
}

/// Logs events until one matches `pred`, then returns it.
async fn until(
    name: &str,
    client: &mut LodgeClient,
    pred: impl Fn(&SessionEvent) -> bool,
) -> Result<SessionEvent, Box<dyn std::error::Error>> {
    let wait = async {
        while let Some(event) = client.next_event().await {
            log_event(name, &event);
            if pred(&event) {
                return Some(event);
            }
        }
        None
    };
    match timeout(STEP, wait).await {
        Ok(Some(event)) => Ok(event),
        Ok(None) => Err(format!("{name}: lobby stopped").into()),
        Err(_) => Err(format!("{name}: timed out").into()),
    }
}

fn log_event(name: &str, event: &SessionEvent) {
    match event {
        SessionEvent::MemberJoined(m) => {
            tracing::info!(player = name, member = %m.display_name, "member joined");
        }
        SessionEvent::ChatMessageReceived(msg) => {
            let from = msg
                .sender
                .as_ref()
                .map(|m| m.display_name.clone())
                .unwrap_or_else(|| msg.sender_id.to_string());
            tracing::info!(player = name, %from, text = %msg.text, "chat");
        }
        other => tracing::info!(player = name, event = other.kind(), "event"),
    }
}

fn player(dir: &InMemoryDirectory, config: &LobbyConfig, id: u64, name: &str) -> LodgeClient {
    let identity = [(1, "Ana"), (2, "Ben"), (3, "Cy")]
        .into_iter()
        .fold(StaticIdentity::new(MemberId(id), name), |acc, (other, n)| {
            acc.with_name(MemberId(other), n)
        });
    LodgeClient::builder()
        .config(config.clone())
        .member_data_key("ready")
        .connect_in_memory(dir, identity)
}

fn is_entered(event: &SessionEvent) -> bool {
    matches!(event, SessionEvent::SessionEntered { .. })
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    lodge::init_tracing("quick_match=info,lodge_lobby=info");
    let config = load_config()?;
    tracing::info!(?config, "starting quick-match demo");

    let dir = InMemoryDirectory::new();
    let mut ana = player(&dir, &config, 1, "Ana");
    let mut ben = player(&dir, &config, 2, "Ben");
    let mut cy = player(&dir, &config, 3, "Cy");
    let filter = SearchFilter::new().string("mode", "coop", Comparison::Equal);

    // Nobody is hosting yet, so Ana's quick match escalates and creates.
    ana.handle().quick_match(filter.clone(), "Ana's den", true).await?;
    until("Ana", &mut ana, is_entered).await?;

    for (name, client) in [("Ben", &mut ben), ("Cy", &mut cy)] {
        client.handle().quick_match(filter.clone(), "", true).await?;
        until(name, &mut *client, is_entered).await?;
        client.handle().set_member_metadata("ready", "yes").await?;
    }

    ana.handle().send_chat("welcome, both of you").await?;
    until("Ben", &mut ben, |e| {
        matches!(e, SessionEvent::ChatMessageReceived(_))
    })
    .await?;

    let snapshot = ana.handle().snapshot().await?;
    tracing::info!(
        session = %snapshot.session_id,
        name = %snapshot.name,
        members = snapshot.members.len(),
        "session assembled"
    );

    ana.handle().kick_member(MemberId(3)).await?;
    until("Cy", &mut cy, |e| {
        matches!(e, SessionEvent::KickedFromSession { .. })
    })
    .await?;
    until("Ana", &mut ana, |e| {
        matches!(e, SessionEvent::MemberLeft { member_id: MemberId(3), .. })
    })
    .await?;

    ana.handle().leave_session().await?;
    until("Ben", &mut ben, |e| {
        matches!(e, SessionEvent::OwnershipChanged { .. })
    })
    .await?;

    let snapshot = ben.handle().snapshot().await?;
    tracing::info!(
        owner = ?snapshot.owner,
        members = snapshot.members.len(),
        "Ben now owns the session"
    );

    for client in [&ana, &ben, &cy] {
        client.handle().shutdown().await?;
    }
    Ok(())
}
