//! Typed ID wrappers for fault entries.
//!
//! Entry identifiers are positive integers assigned by the record store. They
//! are drawn at random below 2^53 so they survive a round trip through JSON
//! consumers that only have doubles, and so a merged entry does not end up
//! reusing the id it had in the source bundle.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Unique identifier for a fault entry. `0` means "not yet stored".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(i64);

impl EntryId {
    /// Largest id the store hands out.
    pub const MAX: i64 = (1 << 53) - 1;

    /// Placeholder id for entries that have not been inserted yet.
    pub const NEW: EntryId = EntryId(0);

    /// Generate a new random entry ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(rand::thread_rng().gen_range(1..=Self::MAX))
    }

    /// Raw integer value.
    #[must_use]
    pub fn get(self) -> i64 {
        self.0
    }

    /// Whether this id marks an entry that has not been stored.
    #[must_use]
    pub fn is_new(self) -> bool {
        self.0 <= 0
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::NEW
    }
}

impl From<i64> for EntryId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<EntryId> for i64 {
    fn from(id: EntryId) -> Self {
        id.0
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for EntryId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| format!("Invalid entry id: {}", s))
    }
}
