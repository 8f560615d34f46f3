use std::fmt;

use serde::{Deserialize, Serialize};

/// The other party in a conversation, as seen from the local user.
///
/// Raw counterpart identities arrive as loosely typed JSON numbers; only
/// finite, positive, integral values are accepted (see [`CounterpartId::from_raw`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CounterpartId(pub u64);

/// Largest integral value that survives the f64 round-trip without rounding.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

impl CounterpartId {
    /// Validate a raw numeric identity.
    ///
    /// Returns `None` for NaN, infinities, zero, negatives, fractional values,
    /// and anything beyond the exactly representable integer range.
    pub fn from_raw(raw: f64) -> Option<Self> {
        if !raw.is_finite() || raw <= 0.0 || raw.fract() != 0.0 || raw > MAX_SAFE_INTEGER {
            return None;
        }
        Some(CounterpartId(raw as u64))
    }
}

impl From<u64> for CounterpartId {
    fn from(id: u64) -> Self {
        CounterpartId(id)
    }
}

impl fmt::Display for CounterpartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
