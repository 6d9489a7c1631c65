use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::purpose::PurposeCategory;

/// Opaque marker identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkerId(String);

impl MarkerId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MarkerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for MarkerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A labeled cable drop placed on a document page.
///
/// Coordinates are fractions of the rendered page size with the origin at the
/// top-left corner, so they survive zoom changes. The serialized shape uses
/// camelCase keys and epoch milliseconds for `createdAt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub id: MarkerId,
    pub x: f64,
    pub y: f64,
    pub page_index: usize,
    pub quantity: u32,
    #[serde(rename = "type")]
    pub kind: String,
    pub location: String,
    pub purpose: String,
    pub label: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Marker {
    pub fn category(&self) -> PurposeCategory {
        PurposeCategory::for_purpose(&self.purpose)
    }

    /// One-line description used for tooltips and status lines
    pub fn summary(&self) -> String {
        format!(
            "{}: {} ({}) - {} - {}",
            self.label, self.kind, self.quantity, self.location, self.purpose
        )
    }
}

/// Everything the user supplies for a new marker. Id, label and timestamp
/// are assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerDraft {
    pub x: f64,
    pub y: f64,
    pub page_index: usize,
    pub quantity: u32,
    pub kind: String,
    pub location: String,
    pub purpose: String,
}
