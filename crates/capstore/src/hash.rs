//! ValueHash: a 32-bit polynomial hash of a stored value.
//!
//! Computed over the UTF-16 code units of the value as
//! `s[0]*31^(n-1) + s[1]*31^(n-2) + ... + s[n-1]` with wrapping `i32`
//! arithmetic, so stores written by older field units produce the same
//! decimal strings. Not cryptographic; only used to spot divergence.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueHash(i32);

impl ValueHash {
    /// Hash a stored value.
    pub fn of(value: &str) -> Self {
        let hash = value
            .encode_utf16()
            .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)));
        Self(hash)
    }

    pub fn as_i32(&self) -> i32 {
        self.0
    }

    /// Hash export for a possibly-absent value: `""` when absent.
    pub fn export(value: Option<&str>) -> String {
        value.map(|v| Self::of(v).to_string()).unwrap_or_default()
    }
}

impl fmt::Display for ValueHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ValueHash {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}
