//! Match codes
//!
//! Every running match is addressed by a short code that players type in
//! to join. Codes are four decimal digits so they can be read out loud.

use std::{fmt::Display, num::ParseIntError, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::constants::game_id::{MAX_VALUE, MIN_VALUE};

/// A four digit code identifying a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GameId(u16);

/// Reasons a string is not a match code
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Not a decimal number
    #[error("match code is not a number: {0}")]
    NotANumber(#[from] ParseIntError),
    /// A number without four digits
    #[error("match code must be between {MIN_VALUE} and {MAX_VALUE}")]
    OutOfRange,
}

impl GameId {
    /// Creates a random match code
    pub fn new() -> Self {
        Self(fastrand::u16(MIN_VALUE..=MAX_VALUE))
    }

    /// Creates a random match code from the given source
    pub fn with_rng(rng: &mut fastrand::Rng) -> Self {
        Self(rng.u16(MIN_VALUE..=MAX_VALUE))
    }
}

impl Default for GameId {
    /// Creates a new random match code (same as `new()`)
    fn default() -> Self {
        Self::new()
    }
}

impl Display for GameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

impl Serialize for GameId {
    /// Serializes the code as a string
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for GameId {
    fn deserialize<D>(deserializer: D) -> Result<GameId, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        GameId::from_str(&s).map_err(|e| serde::de::Error::custom(e.to_string()))
    }
}

impl FromStr for GameId {
    type Err = ParseError;

    /// Parses a code typed in by a player
    ///
    /// Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// * `ParseError::NotANumber` - the string is not a decimal number
    /// * `ParseError::OutOfRange` - the number does not have four digits
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().parse::<u16>()?;
        if (MIN_VALUE..=MAX_VALUE).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ParseError::OutOfRange)
        }
    }
}
