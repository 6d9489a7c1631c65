//! Marker purposes and their color categories.
//!
//! Purpose is a closed set, but markers store it as a plain string so that
//! snapshots written by older builds (or edited by hand) still load. Anything
//! outside the set lands in [`PurposeCategory::Default`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Purpose {
    #[default]
    Network,
    Power,
    Data,
    Audio,
    Voice,
    Security,
    Control,
    Other,
}

impl Purpose {
    pub const ALL: [Purpose; 8] = [
        Purpose::Network,
        Purpose::Power,
        Purpose::Data,
        Purpose::Audio,
        Purpose::Voice,
        Purpose::Security,
        Purpose::Control,
        Purpose::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::Network => "Network",
            Purpose::Power => "Power",
            Purpose::Data => "Data",
            Purpose::Audio => "Audio",
            Purpose::Voice => "Voice",
            Purpose::Security => "Security",
            Purpose::Control => "Control",
            Purpose::Other => "Other",
        }
    }

    pub fn category(&self) -> PurposeCategory {
        match self {
            Purpose::Network => PurposeCategory::Network,
            Purpose::Power => PurposeCategory::Power,
            Purpose::Data => PurposeCategory::Data,
            Purpose::Audio => PurposeCategory::Audio,
            Purpose::Voice => PurposeCategory::Voice,
            Purpose::Security => PurposeCategory::Security,
            Purpose::Control => PurposeCategory::Control,
            Purpose::Other => PurposeCategory::Other,
        }
    }

    /// Position in [`Purpose::ALL`]
    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|p| p == self).unwrap_or(0)
    }

    pub fn next(&self) -> Purpose {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(&self) -> Purpose {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown purpose: {0}")]
pub struct UnknownPurpose(pub String);

impl FromStr for Purpose {
    type Err = UnknownPurpose;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownPurpose(s.to_string()))
    }
}

/// Display category used for color coding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PurposeCategory {
    Network,
    Power,
    Data,
    Audio,
    Voice,
    Security,
    Control,
    Other,
    Default,
}

impl PurposeCategory {
    /// Never fails: unmapped purposes get `Default`.
    pub fn for_purpose(purpose: &str) -> Self {
        purpose
            .parse::<Purpose>()
            .map(|p| p.category())
            .unwrap_or(PurposeCategory::Default)
    }
}
