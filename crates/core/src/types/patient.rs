//! Enumerations collected on the patient and scheduling steps of checkout.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a string does not name a known variant.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {value}")]
pub struct ParseEnumError {
    /// Which enumeration was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

/// Relation of the patient to the account holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// The account holder themself.
    #[serde(rename = "self")]
    Myself,
    Child,
    Spouse,
    Parent,
    Sibling,
    Other,
}

impl Relation {
    /// All relations in display order.
    pub const ALL: [Self; 6] = [
        Self::Myself,
        Self::Child,
        Self::Spouse,
        Self::Parent,
        Self::Sibling,
        Self::Other,
    ];

    /// Wire name of the relation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Myself => "self",
            Self::Child => "child",
            Self::Spouse => "spouse",
            Self::Parent => "parent",
            Self::Sibling => "sibling",
            Self::Other => "other",
        }
    }

    /// Whether the patient is somebody other than the account holder.
    #[must_use]
    pub const fn is_family_member(&self) -> bool {
        !matches!(self, Self::Myself)
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relation {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == lower)
            .ok_or_else(|| ParseEnumError::new("relation", s))
    }
}

/// Patient gender as recorded for sample collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    /// Wire name of the gender.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            "other" => Ok(Self::Other),
            _ => Err(ParseEnumError::new("gender", s)),
        }
    }
}

/// Home sample collection window.
///
/// Collections run from 08:00 to 18:00 in five two-hour windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimeSlot {
    #[serde(rename = "08:00 AM - 10:00 AM")]
    EarlyMorning,
    #[serde(rename = "10:00 AM - 12:00 PM")]
    LateMorning,
    #[serde(rename = "12:00 PM - 02:00 PM")]
    Midday,
    #[serde(rename = "02:00 PM - 04:00 PM")]
    Afternoon,
    #[serde(rename = "04:00 PM - 06:00 PM")]
    Evening,
}

impl TimeSlot {
    /// All slots in chronological order.
    pub const ALL: [Self; 5] = [
        Self::EarlyMorning,
        Self::LateMorning,
        Self::Midday,
        Self::Afternoon,
        Self::Evening,
    ];

    /// Human-readable window, identical to the wire representation.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::EarlyMorning => "08:00 AM - 10:00 AM",
            Self::LateMorning => "10:00 AM - 12:00 PM",
            Self::Midday => "12:00 PM - 02:00 PM",
            Self::Afternoon => "02:00 PM - 04:00 PM",
            Self::Evening => "04:00 PM - 06:00 PM",
        }
    }

    /// Start hour of the window on a 24-hour clock.
    #[must_use]
    pub const fn start_hour(&self) -> u8 {
        match self {
            Self::EarlyMorning => 8,
            Self::LateMorning => 10,
            Self::Midday => 12,
            Self::Afternoon => 14,
            Self::Evening => 16,
        }
    }

    /// End hour of the window on a 24-hour clock.
    #[must_use]
    pub const fn end_hour(&self) -> u8 {
        self.start_hour() + 2
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TimeSlot {
    type Err = ParseEnumError;

    /// Accepts either the full label or the 24-hour start, e.g. `"14"` or
    /// `"14:00"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(slot) = Self::ALL.into_iter().find(|t| t.label() == trimmed) {
            return Ok(slot);
        }
        let hour = trimmed.strip_suffix(":00").unwrap_or(trimmed);
        hour.parse::<u8>()
            .ok()
            .and_then(|h| Self::ALL.into_iter().find(|t| t.start_hour() == h))
            .ok_or_else(|| ParseEnumError::new("time slot", s))
    }
}
