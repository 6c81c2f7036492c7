//! Search predicates over files.

use chrono::{DateTime, Utc};

use super::Node;

/// Conjunctive search filter. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    /// Case-insensitive substring of the name.
    pub name: Option<String>,
    /// Prefix of the MIME type, e.g. `image/`.
    pub mime_prefix: Option<String>,
    /// Inclusive lower bound on size.
    pub min_size: Option<u64>,
    /// Inclusive upper bound on size.
    pub max_size: Option<u64>,
    /// Inclusive lower bound on creation time.
    pub start_date: Option<DateTime<Utc>>,
    /// Inclusive upper bound on creation time.
    pub end_date: Option<DateTime<Utc>>,
}

impl SearchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn mime_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.mime_prefix = Some(prefix.into());
        self
    }

    pub fn min_size(mut self, bytes: u64) -> Self {
        self.min_size = Some(bytes);
        self
    }

    pub fn max_size(mut self, bytes: u64) -> Self {
        self.max_size = Some(bytes);
        self
    }

    pub fn start_date(mut self, at: DateTime<Utc>) -> Self {
        self.start_date = Some(at);
        self
    }

    pub fn end_date(mut self, at: DateTime<Utc>) -> Self {
        self.end_date = Some(at);
        self
    }

    /// Whether no predicate is set. An empty filter matches every file.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Whether `node` satisfies every set predicate. Folders never match.
    pub fn matches(&self, node: &Node) -> bool {
        if node.is_folder {
            return false;
        }
        self.matches_name(&node.name)
            && self
                .mime_prefix
                .as_deref()
                .map_or(true, |p| node.mime_type.starts_with(p))
            && self.min_size.map_or(true, |min| node.size >= min)
            && self.max_size.map_or(true, |max| node.size <= max)
            && self.start_date.map_or(true, |start| node.created_at >= start)
            && self.end_date.map_or(true, |end| node.created_at <= end)
    }

    /// Name predicate alone; the SQL backend evaluates the rest in the query.
    pub fn matches_name(&self, name: &str) -> bool {
        match self.name.as_deref() {
            Some(needle) => name.to_lowercase().contains(&needle.to_lowercase()),
            None => true,
        }
    }
}
