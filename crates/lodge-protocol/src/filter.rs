//! Search criteria: what a caller asks the directory to look for.
//!
//! A [`SearchFilter`] is a plain value. Once a search using it has been
//! issued it is never mutated; the quick-match state machine clones it and
//! widens its own copy.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// DistanceTier
// ---------------------------------------------------------------------------

/// How far (geographically) the directory may look for sessions.
///
/// Tiers are ordered from narrowest to widest, so `Close < Worldwide`.
/// Quick match walks them in exactly this order:
///
/// ```text
/// Close → Default → Far → Worldwide
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
    Deserialize,
)]
#[serde(rename_all = "PascalCase")]
pub enum DistanceTier {
    /// Same region only.
    Close,
    /// Same or neighbouring regions.
    Default,
    /// Up to half the globe away.
    Far,
    /// No distance restriction.
    Worldwide,
}

impl DistanceTier {
    /// All tiers, narrowest first.
    pub const ALL: [DistanceTier; 4] =
        [Self::Close, Self::Default, Self::Far, Self::Worldwide];

    /// The next wider tier, or `None` at [`Worldwide`](Self::Worldwide).
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Close => Some(Self::Default),
            Self::Default => Some(Self::Far),
            Self::Far => Some(Self::Worldwide),
            Self::Worldwide => None,
        }
    }

    /// The next wider tier, but only if it does not exceed `ceiling`.
    pub fn widen_within(self, ceiling: Self) -> Option<Self> {
        self.next().filter(|next| *next <= ceiling)
    }
}

impl Default for DistanceTier {
    fn default() -> Self {
        Self::Default
    }
}

impl fmt::Display for DistanceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Close => "close",
            Self::Default => "default",
            Self::Far => "far",
            Self::Worldwide => "worldwide",
        };
        f.write_str(s)
    }
}

impl FromStr for DistanceTier {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "close" => Ok(Self::Close),
            "default" => Ok(Self::Default),
            "far" => Ok(Self::Far),
            "worldwide" => Ok(Self::Worldwide),
            _ => Err(ProtocolError::UnknownDistanceTier(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

/// How a session's attribute is compared against a filter value.
///
/// Reads as "the session's value is `<op>` the filter value", so
/// `GreaterThan` with value 3 matches sessions whose attribute is 4.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "PascalCase")]
pub enum Comparison {
    EqualOrLessThan,
    LessThan,
    #[default]
    Equal,
    GreaterThan,
    EqualOrGreaterThan,
    NotEqual,
}

impl Comparison {
    /// Applies the comparison to `actual` (the session's value) against
    /// `expected` (the filter's value).
    pub fn matches<T: Ord + ?Sized>(self, actual: &T, expected: &T) -> bool {
        let ord = actual.cmp(expected);
        match self {
            Self::EqualOrLessThan => ord != Ordering::Greater,
            Self::LessThan => ord == Ordering::Less,
            Self::Equal => ord == Ordering::Equal,
            Self::GreaterThan => ord == Ordering::Greater,
            Self::EqualOrGreaterThan => ord != Ordering::Less,
            Self::NotEqual => ord != Ordering::Equal,
        }
    }
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

/// "Attribute `key`, parsed as an integer, compares to `value`."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericFilter {
    pub key: String,
    pub value: i64,
    pub comparison: Comparison,
}

/// "Prefer sessions whose attribute `key` is close to `value`."
///
/// Near filters never exclude a session; they only affect ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NearFilter {
    pub key: String,
    pub value: i64,
}

/// "Attribute `key` compares to the string `value`."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringFilter {
    pub key: String,
    pub value: String,
    pub comparison: Comparison,
}

// ---------------------------------------------------------------------------
// SearchFilter
// ---------------------------------------------------------------------------

/// Everything a search asks of the directory.
///
/// Every constraint is optional. `None` means "don't constrain"; in
/// particular a `distance` of `None` leaves the directory's own default
/// in place, while `Some(tier)` enables the distance constraint.
///
/// Build one with the fluent helpers:
///
/// ```rust
/// use lodge_protocol::{Comparison, SearchFilter};
///
/// let filter = SearchFilter::new()
///     .with_slots_available(1)
///     .with_result_cap(20)
///     .string("mode", "ranked", Comparison::Equal)
///     .numeric("level", 10, Comparison::EqualOrGreaterThan)
///     .near("skill", 1500);
///
/// assert_eq!(filter.distance, None);
/// assert_eq!(filter.strings.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchFilter {
    /// Minimum number of free slots a session must have.
    pub slots_available: Option<u32>,
    /// Distance constraint, if enabled.
    pub distance: Option<DistanceTier>,
    /// Maximum number of candidates to return.
    pub result_cap: Option<u32>,
    /// Integer comparisons on session attributes.
    pub numeric: Vec<NumericFilter>,
    /// Ranking hints on integer session attributes.
    pub near: Vec<NearFilter>,
    /// String comparisons on session attributes.
    pub strings: Vec<StringFilter>,
}

impl SearchFilter {
    /// An unconstrained filter.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slots_available(mut self, slots: u32) -> Self {
        self.slots_available = Some(slots);
        self
    }

    pub fn with_distance(mut self, tier: DistanceTier) -> Self {
        self.distance = Some(tier);
        self
    }

    pub fn with_result_cap(mut self, cap: u32) -> Self {
        self.result_cap = Some(cap);
        self
    }

    /// Adds an integer comparison.
    pub fn numeric(
        mut self,
        key: impl Into<String>,
        value: i64,
        comparison: Comparison,
    ) -> Self {
        self.numeric.push(NumericFilter {
            key: key.into(),
            value,
            comparison,
        });
        self
    }

    /// Adds a ranking hint.
    pub fn near(mut self, key: impl Into<String>, value: i64) -> Self {
        self.near.push(NearFilter {
            key: key.into(),
            value,
        });
        self
    }

    /// Adds a string comparison.
    pub fn string(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
        comparison: Comparison,
    ) -> Self {
        self.strings.push(StringFilter {
            key: key.into(),
            value: value.into(),
            comparison,
        });
        self
    }

    /// The attributes a session created from this filter should advertise.
    ///
    /// String predicates first, then numeric predicates (rendered in
    /// decimal), in declaration order. Near filters are hints, not
    /// attributes, and are not included.
    pub fn advertised_attributes(&self) -> Vec<(String, String)> {
        let strings = self
            .strings
            .iter()
            .map(|f| (f.key.clone(), f.value.clone()));
        let numbers = self
            .numeric
            .iter()
            .map(|f| (f.key.clone(), f.value.to_string()));
        strings.chain(numbers).collect()
    }
}
