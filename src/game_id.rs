//! Session id generation and formatting
//!
//! Session ids are random values displayed in octal so they are short and
//! easy to communicate verbally. Uniqueness against live sessions is the
//! registry's job at creation time.

use std::{fmt::Display, num::ParseIntError, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};

/// Minimum value for generated session ids (in octal: 10000)
const MIN_VALUE: u16 = 0o10_000;
/// Maximum value for generated session ids (in octal: 100000)
const MAX_VALUE: u16 = 0o100_000;

/// A unique identifier for a game session
///
/// Displayed as a 5-digit octal number to reduce confusion when sharing
/// ids verbally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GameId(u16);

impl GameId {
    /// Creates a new random session id
    ///
    /// The value is drawn from the range that always renders as five
    /// octal digits.
    pub fn new() -> Self {
        Self(fastrand::u16(MIN_VALUE..MAX_VALUE))
    }
}

impl Default for GameId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for GameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:05o}", self.0)
    }
}

impl Serialize for GameId {
    /// Serializes the session id as an octal string
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for GameId {
    /// Deserializes a session id from an octal string
    fn deserialize<D>(deserializer: D) -> Result<GameId, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        GameId::from_str(&s).map_err(|e| serde::de::Error::custom(e.to_string()))
    }
}

impl FromStr for GameId {
    type Err = ParseIntError;

    /// Parses a session id from its octal string representation
    ///
    /// # Errors
    ///
    /// Returns a `ParseIntError` if the string is not a valid octal
    /// number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(u16::from_str_radix(s, 8)?))
    }
}
