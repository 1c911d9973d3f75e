//! CTA position classification
//!
//! A CTA's position comes from the nearest inclusive ancestor carrying the
//! position attribute. Only values on the allow-list count, and the
//! allow-list's own casing is what gets reported.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dom::{self, Document};

/// Positions recognised when none are configured
pub const DEFAULT_POSITIONS: [&str; 5] = [
    "HEADER",
    "TOP",
    "MIDDLE",
    "DOWNLOAD-BUTTON",
    "DOWNLOAD-BUTTON-MODAL",
];

/// Ordered set of canonical position tags, compared case-insensitively
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct PositionAllowList {
    entries: Vec<String>,
}

impl PositionAllowList {
    /// Build from a list. Blank entries are skipped and the first spelling
    /// of a case-insensitive duplicate wins.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self {
            entries: Vec::new(),
        };
        for entry in entries {
            let entry = entry.as_ref().trim();
            if entry.is_empty() || list.canonical(entry).is_some() {
                continue;
            }
            list.entries.push(entry.to_string());
        }
        list
    }

    /// Build from the keys of a key-set object such as
    /// `{"HEADER": true, "TOP": true}`.
    pub fn from_keys<'a, K, V: 'a>(map: impl IntoIterator<Item = (&'a K, V)>) -> Self
    where
        K: AsRef<str> + 'a,
    {
        Self::new(map.into_iter().map(|(key, _)| key.as_ref()))
    }

    /// The allow-list's spelling of `value`, if it is on the list.
    pub fn canonical(&self, value: &str) -> Option<&str> {
        if value.is_empty() {
            return None;
        }
        let needle = value.to_uppercase();
        self.entries
            .iter()
            .find(|entry| entry.to_uppercase() == needle)
            .map(String::as_str)
    }

    pub fn contains(&self, value: &str) -> bool {
        self.canonical(value).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PositionAllowList {
    fn default() -> Self {
        Self::new(DEFAULT_POSITIONS)
    }
}

impl From<Vec<String>> for PositionAllowList {
    fn from(entries: Vec<String>) -> Self {
        Self::new(entries)
    }
}

impl From<PositionAllowList> for Vec<String> {
    fn from(list: PositionAllowList) -> Self {
        list.entries
    }
}

/// Outcome of a position lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Position {
    Resolved(String),
    #[default]
    Unresolved,
}

impl Position {
    /// Value reported in beacons: the canonical tag, or `""`.
    pub fn as_str(&self) -> &str {
        match self {
            Position::Resolved(tag) => tag,
            Position::Unresolved => "",
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Position::Resolved(_))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Resolved(tag) => f.write_str(tag),
            Position::Unresolved => f.write_str("unresolved"),
        }
    }
}

/// Resolve the position of `element`.
///
/// Only the nearest carrier of `attribute` is consulted; if its value is
/// not allowed the result is [`Position::Unresolved`] even when a farther
/// ancestor holds an allowed value.
pub fn resolve<D: Document + ?Sized>(
    document: &D,
    element: D::Node,
    attribute: &str,
    allow_list: &PositionAllowList,
) -> Position {
    let Some(host) = dom::closest(document, element, |node| {
        document.attribute(node, attribute).is_some()
    }) else {
        return Position::Unresolved;
    };

    let value = document.attribute(host, attribute).unwrap_or_default();
    match allow_list.canonical(&value) {
        Some(canonical) => Position::Resolved(canonical.to_string()),
        None => Position::Unresolved,
    }
}

/// Position attribute name bundled with its allow-list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionResolver {
    attribute: String,
    allow_list: PositionAllowList,
}

impl PositionResolver {
    pub fn new(attribute: impl Into<String>, allow_list: PositionAllowList) -> Self {
        Self {
            attribute: attribute.into(),
            allow_list,
        }
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn allow_list(&self) -> &PositionAllowList {
        &self.allow_list
    }

    pub fn resolve<D: Document + ?Sized>(&self, document: &D, element: D::Node) -> Position {
        resolve(document, element, &self.attribute, &self.allow_list)
    }
}
