//! Per-consumer status state machine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InvalidStateError;

/// Lifecycle status of one consumer's request cycle.
///
/// Moves forward only: `Inert` → `LoadStarted` → `Loaded` → `Decoded` →
/// `Painted`. A new request restarts the cycle at `LoadStarted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Status {
    /// No source applied yet.
    #[serde(rename = "inert")]
    Inert,
    /// Source applied; load has started.
    #[serde(rename = "loadstarted")]
    LoadStarted,
    /// Bytes fetched but not decoded.
    #[serde(rename = "load")]
    Loaded,
    /// Decoded but not painted.
    #[serde(rename = "decoded")]
    Decoded,
    /// Painted onto the target.
    #[serde(rename = "painted")]
    Painted,
}

impl Status {
    /// Every status in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Inert,
        Self::LoadStarted,
        Self::Loaded,
        Self::Decoded,
        Self::Painted,
    ];

    /// Event name of this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inert => "inert",
            Self::LoadStarted => "loadstarted",
            Self::Loaded => "load",
            Self::Decoded => "decoded",
            Self::Painted => "painted",
        }
    }

    /// Whether this status ends a request cycle.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Painted)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = InvalidStateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| InvalidStateError {
                value: value.to_string(),
            })
    }
}

impl TryFrom<&str> for Status {
    type Error = InvalidStateError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for status in Status::ALL {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
        }
    }

    #[test]
    fn unknown_name_is_invalid_state() {
        let err = "exploded".parse::<Status>().unwrap_err();
        assert_eq!(err.value, "exploded");
        assert_eq!(err.to_string(), "Unknown status: exploded");
    }

    #[test]
    fn names_are_case_sensitive() {
        assert!(Status::try_from("Decoded").is_err());
    }

    #[test]
    fn lifecycle_order_is_forward() {
        assert!(Status::ALL.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(Status::Painted.is_terminal());
        assert!(!Status::Decoded.is_terminal());
    }

    #[test]
    fn serde_uses_event_names() {
        let json = serde_json::to_string(&Status::Loaded).unwrap();
        assert_eq!(json, "\"load\"");
        let back: Status = serde_json::from_str("\"loadstarted\"").unwrap();
        assert_eq!(back, Status::LoadStarted);
    }
}
