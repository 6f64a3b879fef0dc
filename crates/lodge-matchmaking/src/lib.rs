//! Session search for Lodge.
//!
//! Two kinds of search share one [`Matchmaker`]:
//!
//! - **Standard search**: one request, one result list, reported as-is.
//! - **Quick match**: starts at the closest distance tier and widens one
//!   tier at a time on empty results, up to a ceiling. The first hit is
//!   joined; running out of tiers either creates a session or fails.
//!
//! ```text
//! Idle ──start_search──→ Searching ──results──→ Idle
//!   │
//!   └──start_quick_match──→ QuickMatching(Close)
//!                              │ empty, tier < ceiling
//!                              ├──────────→ QuickMatching(next tier)
//!                              │ hit
//!                              ├──────────→ Joining ──resolved──→ Idle
//!                              │ exhausted, auto-create
//!                              ├──────────→ CreatingOnFail ──resolved──→ Idle
//!                              │ exhausted
//!                              └──────────→ Idle (QuickMatchFailed)
//! ```
//!
//! The matchmaker only issues search requests itself. Joins and creates
//! are returned to the caller as [`SearchOutcome`]s, because they change
//! session state the matchmaker doesn't own.

mod error;
mod matchmaker;

pub use error::SearchError;
pub use matchmaker::{Matchmaker, SearchBackend, SearchOutcome, SearchPhase};
