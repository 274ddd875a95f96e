//! Gate conditions: the four-dimensional activation predicate
//!
//! A gate combines up to four independent predicates — who, when, where,
//! state. Present dimensions AND together; an absent dimension always
//! passes, so the empty gate passes for every context.

use crate::{ActorId, SigilError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

// ── Temporal Specification ───────────────────────────────────────────

/// The `when` dimension of a gate.
///
/// Two forms: absolute (compare the context timestamp against a fixed
/// instant) and symbolic (look up a key in context state and test its
/// truthiness). Serialized as its literal string form, e.g.
/// `after:2024-01-01T00:00:00+00:00` or `before:deadline_reached`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TemporalSpec {
    /// Context timestamp must be strictly after the instant
    After(DateTime<Utc>),
    /// Context timestamp must be strictly before the instant
    Before(DateTime<Utc>),
    /// The named state value must be truthy
    AfterKey(String),
    /// The named state value must be absent or falsy
    BeforeKey(String),
}

impl TemporalSpec {
    /// Parse an `after:<reference>` / `before:<reference>` expression.
    ///
    /// A reference that starts with a digit must parse as an ISO-8601
    /// timestamp (date-only and naive forms are read as UTC); anything
    /// else is a symbolic state key.
    pub fn parse(expression: &str) -> Result<Self, SigilError> {
        let (operator, reference) = expression.split_once(':').ok_or_else(|| {
            SigilError::InvalidTemporal {
                expression: expression.to_string(),
                reason: "missing ':' separator".to_string(),
            }
        })?;

        let absolute = reference.chars().next().is_some_and(|c| c.is_ascii_digit());

        match (operator, absolute) {
            ("after", true) => Ok(Self::After(parse_instant(expression, reference)?)),
            ("before", true) => Ok(Self::Before(parse_instant(expression, reference)?)),
            ("after", false) => Ok(Self::AfterKey(reference.to_string())),
            ("before", false) => Ok(Self::BeforeKey(reference.to_string())),
            _ => Err(SigilError::InvalidTemporal {
                expression: expression.to_string(),
                reason: format!("operator must be 'after' or 'before', got '{}'", operator),
            }),
        }
    }

    /// Whether this is an absolute (timestamp-based) specification
    pub fn is_absolute(&self) -> bool {
        matches!(self, Self::After(_) | Self::Before(_))
    }
}

fn parse_instant(expression: &str, reference: &str) -> Result<DateTime<Utc>, SigilError> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(reference) {
        return Ok(instant.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(reference, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(reference, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }
    Err(SigilError::InvalidTemporal {
        expression: expression.to_string(),
        reason: format!("'{}' is not a valid ISO-8601 timestamp", reference),
    })
}

impl std::fmt::Display for TemporalSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::After(instant) => write!(f, "after:{}", instant.to_rfc3339()),
            Self::Before(instant) => write!(f, "before:{}", instant.to_rfc3339()),
            Self::AfterKey(key) => write!(f, "after:{}", key),
            Self::BeforeKey(key) => write!(f, "before:{}", key),
        }
    }
}

impl FromStr for TemporalSpec {
    type Err = SigilError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for TemporalSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TemporalSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let expression = String::deserialize(deserializer)?;
        expression.parse().map_err(serde::de::Error::custom)
    }
}

// ── Gate Condition ───────────────────────────────────────────────────

/// The activation predicate attached to a symbol.
///
/// Every present dimension must hold for the gate to pass. The `state`
/// dimension requires exact, type-sensitive equality per key.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GateCondition {
    /// Allowed actors, or unconstrained
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub who: Option<BTreeSet<ActorId>>,
    /// Temporal constraint, or unconstrained
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<TemporalSpec>,
    /// Allowed locations, or unconstrained
    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub location: Option<BTreeSet<String>>,
    /// Required key → exact-value pairs in context state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<BTreeMap<String, Value>>,
}

impl GateCondition {
    /// The empty gate — passes for every context
    pub fn open() -> Self {
        Self::default()
    }

    pub fn with_who<I, A>(mut self, actors: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<ActorId>,
    {
        self.who = Some(actors.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_when(mut self, when: TemporalSpec) -> Self {
        self.when = Some(when);
        self
    }

    pub fn with_location<I, L>(mut self, locations: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        self.location = Some(locations.into_iter().map(Into::into).collect());
        self
    }

    /// Require `state[key] == value` (exact equality)
    pub fn with_state(mut self, key: impl Into<String>, value: Value) -> Self {
        self.state
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value);
        self
    }

    /// Whether no dimension is constrained
    pub fn is_open(&self) -> bool {
        self.who.is_none() && self.when.is_none() && self.location.is_none() && self.state.is_none()
    }
}
