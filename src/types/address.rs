// ABOUTME: Validated resource addresses of the form `kind.name`.
// ABOUTME: An address is the stable identity of a resource across runs.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address cannot be empty")]
    Empty,

    #[error("address must be `kind.name`, found {0} segment(s)")]
    WrongSegmentCount(usize),

    #[error("address segment cannot be empty")]
    EmptySegment,

    #[error("address segment cannot start or end with '-'")]
    EdgeHyphen,

    #[error("invalid character in address: '{0}'")]
    InvalidChar(char),
}

/// A resource address: a `kind.name` pair identifying one resource.
///
/// Addresses are lowercase, with segments built from letters, digits,
/// hyphens, and underscores. They sort lexicographically, which the
/// planner relies on for deterministic tie-breaking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(String);

impl Address {
    pub fn parse(value: &str) -> Result<Self, AddressError> {
        if value.is_empty() {
            return Err(AddressError::Empty);
        }

        let segments: Vec<&str> = value.split('.').collect();
        if segments.len() != 2 {
            return Err(AddressError::WrongSegmentCount(segments.len()));
        }

        for segment in &segments {
            if segment.is_empty() {
                return Err(AddressError::EmptySegment);
            }
            if segment.starts_with('-') || segment.ends_with('-') {
                return Err(AddressError::EdgeHyphen);
            }
            for c in segment.chars() {
                if !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_') {
                    return Err(AddressError::InvalidChar(c));
                }
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The kind segment, e.g. `storage_bucket` in `storage_bucket.site`.
    pub fn kind_part(&self) -> &str {
        self.0.split_once('.').map(|(k, _)| k).unwrap_or(&self.0)
    }

    /// The name segment, e.g. `site` in `storage_bucket.site`.
    pub fn name_part(&self) -> &str {
        self.0.split_once('.').map(|(_, n)| n).unwrap_or("")
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(serde::de::Error::custom)
    }
}
