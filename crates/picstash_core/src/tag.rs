//! Tag entities.

use crate::TagId;
use serde::{Deserialize, Serialize};

/// A `(label, color)` pair as supplied by a caller.
///
/// Tags are identified by value: resolving the same pair twice yields the same [`Tag`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TagValue {
    /// Display label
    pub label: String,
    /// Display color
    pub color: String,
}

impl TagValue {
    /// Create a tag value.
    pub fn new(label: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            color: color.into(),
        }
    }
}

/// A persisted tag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag {
    /// Tag identity
    pub id: TagId,
    /// Display label
    pub label: String,
    /// Display color
    pub color: String,
}

impl Tag {
    /// The by-value form of this tag.
    pub fn value(&self) -> TagValue {
        TagValue::new(self.label.clone(), self.color.clone())
    }

    /// Whether this tag carries the given value.
    pub fn matches(&self, value: &TagValue) -> bool {
        self.label == value.label && self.color == value.color
    }
}
