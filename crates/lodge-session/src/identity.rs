//! Who the local user is, and what everyone is called.
//!
//! Lodge doesn't manage accounts. Whatever platform the process runs on
//! already knows the local user's stable id and can resolve display names
//! for anyone else; the [`IdentityProvider`] trait is the hook for that.

use std::collections::HashMap;

use lodge_protocol::MemberId;

/// Supplies the local identity and resolves display names.
///
/// # Trait bounds
///
/// - `Send + Sync` → the lobby actor may call it from any Tokio worker.
/// - `'static` → it lives as long as the lobby that owns it.
///
/// # Example
///
/// ```rust
/// use lodge_protocol::MemberId;
/// use lodge_session::IdentityProvider;
///
/// /// Names everyone after their number.
/// struct NumberedUsers(MemberId);
///
/// impl IdentityProvider for NumberedUsers {
///     fn local_identity(&self) -> MemberId {
///         self.0
///     }
///
///     fn display_name(&self, member: MemberId) -> String {
///         format!("player {}", member.0)
///     }
/// }
///
/// let me = NumberedUsers(MemberId(7));
/// assert_eq!(me.display_name(me.local_identity()), "player 7");
/// ```
pub trait IdentityProvider: Send + Sync + 'static {
    /// The local user's stable identity.
    fn local_identity(&self) -> MemberId;

    /// A human-readable name for any identity, local or remote.
    fn display_name(&self, member: MemberId) -> String;
}

/// An [`IdentityProvider`] backed by a fixed name table.
///
/// Identities missing from the table resolve to their `Display` form
/// (`M-42`). Handy for tests and demos.
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    local: MemberId,
    names: HashMap<MemberId, String>,
}

impl StaticIdentity {
    pub fn new(local: MemberId, local_name: impl Into<String>) -> Self {
        let mut names = HashMap::new();
        names.insert(local, local_name.into());
        Self { local, names }
    }

    /// Adds (or renames) one known identity.
    pub fn with_name(mut self, member: MemberId, name: impl Into<String>) -> Self {
        self.names.insert(member, name.into());
        self
    }
}

impl IdentityProvider for StaticIdentity {
    fn local_identity(&self) -> MemberId {
        self.local
    }

    fn display_name(&self, member: MemberId) -> String {
        self.names
            .get(&member)
            .cloned()
            .unwrap_or_else(|| member.to_string())
    }
}
