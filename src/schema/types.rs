//! Schema types

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Maximum number of suggestions in a rejection message
pub const MAX_SUGGESTIONS: usize = 5;

/// Number of valid fields listed in a rejection message
pub const LISTED_VALID_FIELDS: usize = 15;

/// Aggregate functions accepted in `func(field)` metric syntax
pub const AGGREGATE_FUNCTIONS: [&str; 6] = ["sum", "avg", "count", "min", "max", "median"];

/// Category of a field reference in a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Group-by / facet dimension
    Facet,
    /// Filterable field
    Filter,
    /// Field that can be requested in a select list
    Select,
    /// Aggregation metric
    Metric,
}

impl FieldKind {
    /// Every kind, in display order
    pub const ALL: [FieldKind; 4] = [
        FieldKind::Facet,
        FieldKind::Filter,
        FieldKind::Select,
        FieldKind::Metric,
    ];

    /// Plural label used in messages ("facets", "metrics", ...)
    pub fn plural(&self) -> &'static str {
        match self {
            FieldKind::Facet => "facets",
            FieldKind::Filter => "filters",
            FieldKind::Select => "select fields",
            FieldKind::Metric => "metrics",
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldKind::Facet => write!(f, "facet"),
            FieldKind::Filter => write!(f, "filter"),
            FieldKind::Select => write!(f, "select"),
            FieldKind::Metric => write!(f, "metric"),
        }
    }
}

impl std::str::FromStr for FieldKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "facet" | "group_by" => Ok(FieldKind::Facet),
            "filter" => Ok(FieldKind::Filter),
            "select" => Ok(FieldKind::Select),
            "metric" => Ok(FieldKind::Metric),
            other => Err(format!("unknown field kind '{other}'")),
        }
    }
}

/// Valid field names of one source, per kind
///
/// A permissive schema accepts everything. It is what gets cached when
/// discovery fails, so one unreachable describe endpoint does not block
/// queries against that source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSchema {
    /// Source name
    pub source: String,
    /// Valid names per kind
    #[serde(default)]
    pub fields: BTreeMap<FieldKind, BTreeSet<String>>,
    /// Accept every field regardless of `fields`
    #[serde(default)]
    pub permissive: bool,
}

impl SourceSchema {
    /// Create an empty schema for a source
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    /// Schema that accepts every field
    pub fn permissive(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            fields: BTreeMap::new(),
            permissive: true,
        }
    }

    /// Add valid names for a kind
    #[must_use]
    pub fn with_fields<I, S>(mut self, kind: FieldKind, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert_all(kind, names);
        self
    }

    /// Add valid names for a kind in place
    pub fn insert_all<I, S>(&mut self, kind: FieldKind, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = self.fields.entry(kind).or_default();
        for name in names {
            let name = name.into();
            let name = name.trim();
            if !name.is_empty() {
                set.insert(name.to_string());
            }
        }
    }

    /// Valid names for a kind, `None` when the kind is unconstrained
    pub fn valid_fields(&self, kind: FieldKind) -> Option<&BTreeSet<String>> {
        if self.permissive {
            return None;
        }
        self.fields.get(&kind).filter(|set| !set.is_empty())
    }

    /// Whether `field` is acceptable for `kind`
    pub fn allows(&self, kind: FieldKind, field: &str) -> bool {
        self.valid_fields(kind)
            .map_or(true, |set| set.contains(field))
    }

    /// Number of valid names for a kind
    pub fn count(&self, kind: FieldKind) -> usize {
        self.fields.get(&kind).map_or(0, BTreeSet::len)
    }

    /// Whether nothing is constrained
    pub fn is_permissive(&self) -> bool {
        self.permissive || self.fields.values().all(BTreeSet::is_empty)
    }
}

/// Valid fields that share the first token of `field`
///
/// Tokens are split on `_` and `.`, so `publisher_name` and
/// `primary_location.source` both match on their leading word.
pub fn suggestions(field: &str, valid: &BTreeSet<String>) -> Vec<String> {
    let base = field.split(['_', '.']).next().unwrap_or(field);
    if base.is_empty() {
        return Vec::new();
    }
    valid
        .iter()
        .filter(|candidate| candidate.contains(base))
        .take(MAX_SUGGESTIONS)
        .cloned()
        .collect()
}

/// Sorted, truncated listing of valid fields
pub fn valid_listing(valid: &BTreeSet<String>) -> String {
    let shown: Vec<&str> = valid
        .iter()
        .take(LISTED_VALID_FIELDS)
        .map(String::as_str)
        .collect();
    let mut listing = shown.join(", ");
    if valid.len() > LISTED_VALID_FIELDS {
        listing.push_str(", ...");
    }
    listing
}

/// Human-readable rejection for a set of invalid names
pub fn rejection_message(
    source: &str,
    kind: FieldKind,
    invalid: &[&str],
    valid: &BTreeSet<String>,
) -> String {
    let mut message = if invalid.len() == 1 {
        format!("Invalid {kind} '{}' for {source}.", invalid[0])
    } else {
        format!("Invalid {} for {source}: {}.", kind.plural(), invalid.join(", "))
    };

    let mut similar: Vec<String> = Vec::new();
    for field in invalid {
        for candidate in suggestions(field, valid) {
            if similar.len() < MAX_SUGGESTIONS && !similar.contains(&candidate) {
                similar.push(candidate);
            }
        }
    }
    if !similar.is_empty() {
        message.push_str(&format!(" Similar valid {}: {}.", kind.plural(), similar.join(", ")));
    }

    message.push_str(&format!(" Valid {}: {}", kind.plural(), valid_listing(valid)));
    message
}
