//! A participant in the tracked session.

use lodge_protocol::MemberId;

use crate::MetadataStore;

/// One member of the tracked session, as last seen.
///
/// `data` only ever holds the session's declared member-data keys; any
/// other per-member key the directory might carry is not synchronized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: MemberId,
    pub display_name: String,
    pub data: MetadataStore,
}

impl Member {
    /// A member with no data yet.
    pub fn new(id: MemberId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            data: MetadataStore::new(),
        }
    }

    /// Shorthand for `self.data.get(key)`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key)
    }
}
