//! The search state machine.
//!
//! Every search request gets a [`RequestId`] back from the directory, and
//! the matchmaker remembers the one it is waiting on. A result carrying
//! any other id is stale: it belongs to a search that was cancelled or
//! has already been superseded, and is dropped without touching state.
//! That is what keeps a late result from resurrecting a cancelled quick
//! match.

use lodge_directory::{DirectoryError, SessionDirectory};
use lodge_protocol::{
    DistanceTier, RequestId, SearchFilter, SessionCandidate, SessionId,
};

use crate::SearchError;

// ---------------------------------------------------------------------------
// SearchBackend
// ---------------------------------------------------------------------------

/// The one directory request the matchmaker issues on its own.
///
/// Every [`SessionDirectory`] is a search backend.
pub trait SearchBackend {
    fn request_list(&self, filter: &SearchFilter) -> Result<RequestId, DirectoryError>;
}

impl<D: SessionDirectory + ?Sized> SearchBackend for D {
    fn request_list(&self, filter: &SearchFilter) -> Result<RequestId, DirectoryError> {
        self.request_session_list(filter)
    }
}

// ---------------------------------------------------------------------------
// Phases and outcomes
// ---------------------------------------------------------------------------

/// Where the matchmaker is, as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Idle,
    /// A standard search is in flight.
    Searching,
    /// A quick-match search is in flight at this tier.
    QuickMatching(DistanceTier),
    /// Quick match found a session and the caller is joining it.
    Joining(SessionId),
    /// Quick match ran out of tiers and the caller is creating a session.
    CreatingOnFail,
}

/// What the caller should do after a search result or failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Not the request being waited on. Nothing changed.
    Stale,
    /// A standard search finished. Report the list, empty or not.
    Results(Vec<SessionCandidate>),
    /// A standard search failed at the directory.
    SearchFailed(String),
    /// Quick match found nothing and searched again at a wider tier.
    Escalated(DistanceTier),
    /// Quick match picked this session. The caller should join it and
    /// later call [`Matchmaker::resolve_join`].
    Join(SessionId),
    /// Quick match gave up and wants a session created. The caller should
    /// create it and later call [`Matchmaker::resolve_create`].
    Create { filter: SearchFilter, name: String },
    /// Quick match gave up.
    QuickMatchFailed,
}

#[derive(Debug, Clone)]
struct QuickPlan {
    /// The caller's filter, untouched. Used for auto-create.
    original: SearchFilter,
    /// Our own copy, with the distance tier we're currently searching.
    working: SearchFilter,
    create_name: String,
    auto_create: bool,
}

impl QuickPlan {
    fn tier(&self) -> DistanceTier {
        self.working.distance.unwrap_or(DistanceTier::Close)
    }
}

#[derive(Debug, Clone)]
enum Phase {
    Idle,
    Searching { request: RequestId },
    QuickMatching { request: RequestId, plan: QuickPlan },
    Joining(SessionId),
    CreatingOnFail,
}

// ---------------------------------------------------------------------------
// Matchmaker
// ---------------------------------------------------------------------------

/// Drives at most one search at a time.
///
/// A standard search and a quick match never run together, and neither
/// kind can be started twice: the second start is rejected with
/// [`SearchError::Busy`] and issues no request.
#[derive(Debug, Clone)]
pub struct Matchmaker {
    max_distance: DistanceTier,
    phase: Phase,
}

impl Matchmaker {
    /// Creates an idle matchmaker. Quick match never widens past
    /// `max_distance`.
    pub fn new(max_distance: DistanceTier) -> Self {
        Self {
            max_distance,
            phase: Phase::Idle,
        }
    }

    pub fn max_distance(&self) -> DistanceTier {
        self.max_distance
    }

    pub fn set_max_distance(&mut self, max_distance: DistanceTier) {
        self.max_distance = max_distance;
    }

    pub fn phase(&self) -> SearchPhase {
        match &self.phase {
            Phase::Idle => SearchPhase::Idle,
            Phase::Searching { .. } => SearchPhase::Searching,
            Phase::QuickMatching { plan, .. } => SearchPhase::QuickMatching(plan.tier()),
            Phase::Joining(session) => SearchPhase::Joining(*session),
            Phase::CreatingOnFail => SearchPhase::CreatingOnFail,
        }
    }

    /// A standard search is in flight.
    pub fn is_searching(&self) -> bool {
        matches!(self.phase, Phase::Searching { .. })
    }

    /// A quick match is underway, including its join or create step.
    pub fn is_quick_matching(&self) -> bool {
        matches!(
            self.phase,
            Phase::QuickMatching { .. } | Phase::Joining(_) | Phase::CreatingOnFail
        )
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.phase, Phase::Idle)
    }

    /// The request whose result is currently awaited, if any.
    pub fn pending_request(&self) -> Option<RequestId> {
        match &self.phase {
            Phase::Searching { request } | Phase::QuickMatching { request, .. } => {
                Some(*request)
            }
            _ => None,
        }
    }

    // -- Starting --

    /// Starts a standard search with `filter` as given.
    pub fn start_search<B>(
        &mut self,
        filter: &SearchFilter,
        backend: &B,
    ) -> Result<RequestId, SearchError>
    where
        B: SearchBackend + ?Sized,
    {
        if !self.is_idle() {
            tracing::warn!(phase = ?self.phase(), "search rejected: another search is in progress");
            return Err(SearchError::Busy);
        }
        let request = backend.request_list(filter)?;
        self.phase = Phase::Searching { request };
        tracing::info!(%request, "search started");
        Ok(request)
    }

    /// Starts a quick match.
    ///
    /// The search runs on a copy of `filter` with the distance constraint
    /// forced to [`DistanceTier::Close`]. If every tier up to the ceiling
    /// comes back empty and `auto_create` is set, the caller is asked to
    /// create a session from the unmodified `filter` named `create_name`.
    pub fn start_quick_match<B>(
        &mut self,
        filter: &SearchFilter,
        create_name: impl Into<String>,
        auto_create: bool,
        backend: &B,
    ) -> Result<RequestId, SearchError>
    where
        B: SearchBackend + ?Sized,
    {
        if !self.is_idle() {
            tracing::warn!(phase = ?self.phase(), "quick match rejected: another search is in progress");
            return Err(SearchError::Busy);
        }
        let working = filter.clone().with_distance(DistanceTier::Close);
        let request = backend.request_list(&working)?;
        self.phase = Phase::QuickMatching {
            request,
            plan: QuickPlan {
                original: filter.clone(),
                working,
                create_name: create_name.into(),
                auto_create,
            },
        };
        tracing::info!(%request, tier = %DistanceTier::Close, auto_create, "quick match started");
        Ok(request)
    }

    // -- Cancelling --

    /// Abandons a standard search. Returns `true` if one was in flight.
    ///
    /// The directory can't cancel a request, so its result may still
    /// arrive; it will be treated as stale.
    pub fn cancel_search(&mut self) -> bool {
        match self.phase {
            Phase::Searching { request } => {
                self.phase = Phase::Idle;
                tracing::warn!(%request, "search cancelled; its result may still arrive and will be dropped");
                true
            }
            _ => false,
        }
    }

    /// Abandons a quick match. Returns `true` if one was underway.
    ///
    /// A late search result is dropped. A join or create that was already
    /// handed to the caller is not undone; only the matchmaker stops
    /// following it.
    pub fn cancel_quick_match(&mut self) -> bool {
        match &self.phase {
            Phase::QuickMatching { request, plan } => {
                tracing::warn!(
                    %request,
                    tier = %plan.tier(),
                    "quick match cancelled; its result may still arrive and will be dropped"
                );
            }
            Phase::Joining(session) => {
                tracing::warn!(%session, "quick match cancelled while its join is in flight");
            }
            Phase::CreatingOnFail => {
                tracing::warn!("quick match cancelled while its create is in flight");
            }
            Phase::Idle | Phase::Searching { .. } => return false,
        }
        self.phase = Phase::Idle;
        true
    }

    // -- Results --

    /// Feeds in a completed session list.
    pub fn on_results<B>(
        &mut self,
        request: RequestId,
        candidates: Vec<SessionCandidate>,
        backend: &B,
    ) -> SearchOutcome
    where
        B: SearchBackend + ?Sized,
    {
        if self.pending_request() != Some(request) {
            tracing::debug!(%request, "dropping stale search result");
            return SearchOutcome::Stale;
        }

        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Searching { .. } => {
                tracing::info!(%request, found = candidates.len(), "search finished");
                SearchOutcome::Results(candidates)
            }
            Phase::QuickMatching { plan, .. } => {
                self.on_quick_match_results(plan, candidates, backend)
            }
            other => {
                self.phase = other;
                SearchOutcome::Stale
            }
        }
    }

    fn on_quick_match_results<B>(
        &mut self,
        mut plan: QuickPlan,
        candidates: Vec<SessionCandidate>,
        backend: &B,
    ) -> SearchOutcome
    where
        B: SearchBackend + ?Sized,
    {
        // The directory ranks best match first.
        if let Some(best) = candidates.first() {
            tracing::info!(session = %best.id, tier = %plan.tier(), "quick match found a session");
            self.phase = Phase::Joining(best.id);
            return SearchOutcome::Join(best.id);
        }

        if let Some(next) = plan.tier().widen_within(self.max_distance) {
            plan.working.distance = Some(next);
            match backend.request_list(&plan.working) {
                Ok(request) => {
                    tracing::info!(%request, tier = %next, "quick match widening search");
                    self.phase = Phase::QuickMatching { request, plan };
                    return SearchOutcome::Escalated(next);
                }
                Err(e) => {
                    tracing::warn!(tier = %next, error = %e, "quick match could not widen search");
                    return SearchOutcome::QuickMatchFailed;
                }
            }
        }

        if plan.auto_create {
            tracing::info!(tier = %plan.tier(), "quick match exhausted; creating a session");
            self.phase = Phase::CreatingOnFail;
            SearchOutcome::Create {
                filter: plan.original,
                name: plan.create_name,
            }
        } else {
            tracing::info!(tier = %plan.tier(), "quick match exhausted");
            SearchOutcome::QuickMatchFailed
        }
    }

    /// Feeds in a failed session list.
    ///
    /// A failed quick-match search ends the quick match. It is not
    /// escalated and never leads to an auto-create.
    pub fn on_list_failed(&mut self, request: RequestId, reason: &str) -> SearchOutcome {
        if self.pending_request() != Some(request) {
            tracing::debug!(%request, "dropping stale search failure");
            return SearchOutcome::Stale;
        }
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::QuickMatching { .. } => {
                tracing::warn!(%request, reason, "quick match search failed");
                SearchOutcome::QuickMatchFailed
            }
            _ => {
                tracing::warn!(%request, reason, "search failed");
                SearchOutcome::SearchFailed(reason.to_string())
            }
        }
    }

    // -- Join / create follow-up --

    /// Reports how a join finished. Returns `true` if this ended a quick
    /// match unsuccessfully.
    pub fn resolve_join(&mut self, session: SessionId, entered: bool) -> bool {
        match self.phase {
            Phase::Joining(target) if target == session => {
                self.phase = Phase::Idle;
                if !entered {
                    tracing::info!(%session, "quick match join failed");
                }
                !entered
            }
            _ => false,
        }
    }

    /// Reports how an auto-create finished. Returns `true` if this ended a
    /// quick match unsuccessfully.
    pub fn resolve_create(&mut self, created: bool) -> bool {
        match self.phase {
            Phase::CreatingOnFail => {
                self.phase = Phase::Idle;
                !created
            }
            _ => false,
        }
    }

    /// Drops any search state without logging a cancellation.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
    }
}

impl Default for Matchmaker {
    fn default() -> Self {
        Self::new(DistanceTier::default())
    }
}
