//! # Core Type Definitions
//!
//! This module contains the shared vocabulary of the lineage compiler:
//! - Identifiers (`VertexId`, `Category`)
//! - Field values (`FieldValue`, `FieldMap`, `LineageDate`, `Gender`)
//! - Graph edges (`Edge`, `EdgeLabel`)
//! - Error types (`LineageError`, `ValidationFailure`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Implement `Ord` where they are used as `BTreeMap`/`BTreeSet` keys

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// =============================================================================
// CATEGORIES
// =============================================================================

/// The fixed set of record categories, in load order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Zoos and other managed holding locations (`[zoo]`).
    ManagedLocation,
    /// Wild capture or rescue locations (`[wild]`).
    WildLocation,
    /// Individual animals (`[panda]`).
    Animal,
    /// Group photos and other media items (`[media]`).
    Media,
    /// Cross-reference link items (`[link]`).
    Link,
}

impl Category {
    /// All categories in the order the assembler loads them.
    ///
    /// Animal records reference locations, media reference animals, so the
    /// order is fixed.
    pub const LOAD_ORDER: [Category; 5] = [
        Category::ManagedLocation,
        Category::WildLocation,
        Category::Animal,
        Category::Media,
        Category::Link,
    ];

    /// Section header name used inside record files.
    #[must_use]
    pub fn section(&self) -> &'static str {
        match self {
            Category::ManagedLocation => "zoo",
            Category::WildLocation => "wild",
            Category::Animal => "panda",
            Category::Media => "media",
            Category::Link => "link",
        }
    }

    /// Resolve a category from a record section name.
    #[must_use]
    pub fn from_section(section: &str) -> Option<Self> {
        Self::LOAD_ORDER
            .into_iter()
            .find(|category| category.section() == section)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.section())
    }
}

// =============================================================================
// VERTEX IDENTIFIERS
// =============================================================================

/// Identifier of a vertex in the compiled graph.
///
/// Animals and managed locations share one integer namespace: a managed
/// location stored on disk as `7` is represented as `Entity(-7)`, so that
/// "animal #7" and "location #7" never collide. Wild locations, media and
/// links carry their own string schemes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VertexId {
    /// Animal (positive) or managed location (negative).
    Entity(i64),
    /// Wild location, `wild.<dotted id>`.
    Wild(String),
    /// Media item, `media.<relative path>`.
    Media(String),
    /// Link item, `link.<relative path>`.
    Link(String),
}

impl VertexId {
    /// Animal identifier. Animals always live on the positive side.
    #[must_use]
    pub const fn animal(id: i64) -> Self {
        Self::Entity(id)
    }

    /// Managed location identifier from its on-disk magnitude.
    #[must_use]
    pub const fn managed_location(magnitude: i64) -> Self {
        Self::Entity(-magnitude)
    }

    /// Wild location identifier; the `wild.` prefix is added if missing.
    #[must_use]
    pub fn wild(id: &str) -> Self {
        if id.starts_with("wild.") {
            Self::Wild(id.to_string())
        } else {
            Self::Wild(format!("wild.{}", id))
        }
    }

    /// Resolve a location reference as written in an animal record.
    ///
    /// Positive integers name managed locations, dotted `wild.` values name
    /// wild locations. Anything else is not a location reference.
    #[must_use]
    pub fn location_reference(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.starts_with("wild.") {
            return Some(Self::wild(value));
        }
        match value.parse::<i64>() {
            Ok(n) if n > 0 => Some(Self::managed_location(n)),
            _ => None,
        }
    }

    /// True for identifiers in the managed-location half of the namespace.
    #[must_use]
    pub fn is_managed_location(&self) -> bool {
        matches!(self, Self::Entity(n) if *n < 0)
    }

    /// True for identifiers in the animal half of the namespace.
    #[must_use]
    pub fn is_animal(&self) -> bool {
        matches!(self, Self::Entity(n) if *n > 0)
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity(n) => write!(f, "{}", n),
            Self::Wild(s) | Self::Media(s) | Self::Link(s) => f.write_str(s),
        }
    }
}

impl Serialize for VertexId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// =============================================================================
// DATES
// =============================================================================

/// A calendar-valid date written as `YYYY/MM/DD`.
///
/// Month and day may be unpadded on input (`2019/4/7`), as older
/// history-mined dates are. Output is always zero-padded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineageDate(pub NaiveDate);

impl LineageDate {
    /// Parse a `YYYY/MM/DD` date, rejecting impossible calendar days.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.trim().split('/');
        let (year, month, day) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() || year.len() != 4 {
            return None;
        }
        if !(1..=2).contains(&month.len()) || !(1..=2).contains(&day.len()) {
            return None;
        }
        let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(year) || !all_digits(month) || !all_digits(day) {
            return None;
        }
        NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
            .map(Self)
    }

    /// Build from calendar components.
    #[must_use]
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// Absolute distance in whole days.
    #[must_use]
    pub fn days_apart(&self, other: &Self) -> i64 {
        self.0.signed_duration_since(other.0).num_days().abs()
    }

    /// The calendar year.
    #[must_use]
    pub fn year(&self) -> i32 {
        self.0.year()
    }
}

impl fmt::Display for LineageDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}/{:02}/{:02}",
            self.0.year(),
            self.0.month(),
            self.0.day()
        )
    }
}

impl Serialize for LineageDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LineageDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {}", raw)))
    }
}

// =============================================================================
// GENDER
// =============================================================================

/// Canonical gender values. Record files accept a multilingual token set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Normalize a gender token; `None` for anything outside the fixed set.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim() {
            "m" | "M" | "male" | "Male" | "オス" | "雄" | "수컷" => Some(Self::Male),
            "f" | "F" | "female" | "Female" | "メス" | "雌" | "암컷" => Some(Self::Female),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
        }
    }
}

// =============================================================================
// FIELD VALUES
// =============================================================================

/// A normalized record field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Single string value.
    Text(String),
    /// Comma-delimited list, in file order.
    List(Vec<String>),
}

impl FieldValue {
    /// Text view; lists are joined back with `", "`.
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::List(items) => items.join(", "),
        }
    }

    /// List view; a text value becomes a single-element list.
    #[must_use]
    pub fn as_list(&self) -> Vec<String> {
        match self {
            Self::Text(s) => vec![s.clone()],
            Self::List(items) => items.clone(),
        }
    }
}

/// Ordered map of normalized fields for one record.
///
/// Keys that were written as `none` / `unknown` are absent entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldMap(BTreeMap<String, FieldValue>);

impl FieldMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: FieldValue) {
        self.0.insert(key.into(), value);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    /// Text value of a field, if present.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<String> {
        self.0.get(key).map(FieldValue::as_text)
    }

    /// List value of a field; empty when the field is absent.
    #[must_use]
    pub fn list(&self, key: &str) -> Vec<String> {
        self.0.get(key).map(FieldValue::as_list).unwrap_or_default()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// =============================================================================
// EDGES
// =============================================================================

/// Edge vocabulary. The graph supports no other labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeLabel {
    /// Parent -> child.
    Family,
    /// Sibling <-> sibling, stored in both directions.
    Litter,
    /// Animal -> location, sub-labelled by the source field.
    Placement,
}

/// A directed, labeled edge.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Edge {
    pub out: VertexId,
    #[serde(rename = "in")]
    pub into: VertexId,
    pub label: EdgeLabel,
    /// Source field for placement edges (`birthplace`, `zoo`, `location.2`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Confidence percentage for family edges.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
}

impl Edge {
    #[must_use]
    pub fn family(parent: VertexId, child: VertexId, confidence: Option<u8>) -> Self {
        Self {
            out: parent,
            into: child,
            label: EdgeLabel::Family,
            field: None,
            confidence,
        }
    }

    #[must_use]
    pub fn litter(from: VertexId, to: VertexId) -> Self {
        Self {
            out: from,
            into: to,
            label: EdgeLabel::Litter,
            field: None,
            confidence: None,
        }
    }

    #[must_use]
    pub fn placement(animal: VertexId, location: VertexId, field: impl Into<String>) -> Self {
        Self {
            out: animal,
            into: location,
            label: EdgeLabel::Placement,
            field: Some(field.into()),
            confidence: None,
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur while compiling or maintaining the dataset.
///
/// - No silent failures inside a compile: every error aborts the run
/// - Lifecycle operations signal "nothing to do" with booleans, not errors
/// - The core should never panic
#[derive(Debug, Error)]
pub enum LineageError {
    /// A field value is malformed (date, gender, name, or record syntax).
    #[error("{path}: field `{field}` has invalid value {value:?}: {reason}")]
    Format {
        path: String,
        field: String,
        value: String,
        reason: String,
    },

    /// A reference points at an entity that was never loaded, or an ID does
    /// not match the path it was found under.
    #[error("{path}: field `{field}` references {value:?}: {reason}")]
    Reference {
        path: String,
        field: String,
        value: String,
        reason: String,
    },

    /// Two records of the same category share an ID.
    #[error("duplicate {category} id {id}: {}", .names.join(", "))]
    DuplicateId {
        category: Category,
        id: String,
        names: Vec<String>,
    },

    /// Dates that must agree do not (litter mates, birth vs. first location,
    /// parent vs. child).
    #[error("date inconsistency for {subject}: {detail}")]
    DateConsistency { subject: String, detail: String },

    /// The family subgraph is not a valid family tree.
    #[error("invalid family tree at {subject}: {detail}")]
    Lineage { subject: String, detail: String },

    /// The requested commit is not part of the repository history.
    #[error("provenance error: {0}")]
    Provenance(String),

    /// The whole-dataset validation found one or more violations.
    #[error("validation failed with {} violation(s)", .0.errors.len())]
    Validation(ValidationFailure),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),

    /// The configuration could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Reading version-control history failed.
    #[error("history error: {0}")]
    History(String),
}

impl LineageError {
    /// Shorthand for building a `Format` error.
    pub fn format(
        path: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Format {
            path: path.into(),
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for building a `Reference` error.
    pub fn reference(
        path: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Reference {
            path: path.into(),
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// All violations collected by the validator in one run.
#[derive(Debug, Default)]
pub struct ValidationFailure {
    pub errors: Vec<LineageError>,
}

impl ValidationFailure {
    /// Render every violation, one per line.
    #[must_use]
    pub fn report(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// =============================================================================
// TESTS
// =============================================================================
