//! Error types for the protocol layer.
//!
//! Each crate in Lodge defines its own error enum. This keeps errors
//! specific and meaningful: when you see a `ProtocolError`, you know
//! the problem is in interpreting a protocol value, not in talking to
//! the directory or in lobby bookkeeping.

/// Errors that can occur in the protocol layer.
///
/// `#[derive(thiserror::Error)]` auto-generates the `std::error::Error`
/// trait implementation. The `#[error("...")]` attributes define the
/// human-readable message for each variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// A textual identifier could not be parsed.
    ///
    /// Identifiers travel through string metadata (the kick list, the
    /// `OwnerID` attribute some directories publish), so they have to
    /// be parsed back. Anything that isn't a plain unsigned integer is
    /// rejected with this variant.
    #[error("invalid identifier: {0:?}")]
    InvalidId(String),

    /// A distance tier name was not recognised.
    #[error("unknown distance tier: {0:?}")]
    UnknownDistanceTier(String),
}
