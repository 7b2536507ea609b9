//! Call identifiers

use std::fmt;

use serde::{Deserialize, Serialize};

/// Engine-assigned identifier of a single tool invocation
///
/// Every invocation gets a fresh id, even when the same client calls the
/// same tool twice. Session state is keyed by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(pub u64);

impl CallId {
    /// Raw numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call-{}", self.0)
    }
}

impl From<u64> for CallId {
    fn from(value: u64) -> Self {
        CallId(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_id_display() {
        assert_eq!(CallId(7).to_string(), "call-7");
        assert_eq!(CallId::from(3).as_u64(), 3);
    }

    #[test]
    fn test_call_id_serializes_as_number() {
        let json = serde_json::to_string(&CallId(42)).unwrap();
        assert_eq!(json, "42");
    }
}
