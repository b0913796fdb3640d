//! Storage-assigned record version.
//!
//! # Responsibility
//! - Wrap the integer revision kept by storage in a typed token.
//! - Accept and render the token as a string for callers that round-trip it
//!   through external representations.
//!
//! # Invariants
//! - Tokens are compared as integers, never as formatted strings.
//! - Storage starts every record at `VersionToken::INITIAL` and increments by
//!   one per successful write.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Optimistic concurrency token attached to every stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionToken(i64);

impl VersionToken {
    /// Version of a freshly inserted record.
    pub const INITIAL: VersionToken = VersionToken(1);

    pub(crate) fn from_storage(value: i64) -> Self {
        Self(value)
    }

    pub(crate) fn as_storage(self) -> i64 {
        self.0
    }

    /// Version storage assigns after one more successful write.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for VersionToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller-supplied version text that is not a storage revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidVersionToken(pub String);

impl Display for InvalidVersionToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid version token `{}`", self.0)
    }
}

impl Error for InvalidVersionToken {}

impl FromStr for VersionToken {
    type Err = InvalidVersionToken;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        match trimmed.parse::<i64>() {
            Ok(parsed) if parsed > 0 => Ok(Self(parsed)),
            _ => Err(InvalidVersionToken(value.to_string())),
        }
    }
}

impl TryFrom<String> for VersionToken {
    type Error = InvalidVersionToken;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VersionToken> for String {
    fn from(value: VersionToken) -> Self {
        value.to_string()
    }
}
