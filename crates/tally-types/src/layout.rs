use std::fmt;

use serde::{Deserialize, Serialize};

/// Memory and concurrency strategy of a booked aggregate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    /// One instance. Writers are not arbitrated beyond a plain lock.
    Single,
    /// One instance per writer slot, combined on read.
    #[serde(alias = "replicated")]
    ReplicatedCopies,
    /// One shared instance fed through per-handle write buffers.
    #[serde(alias = "shared")]
    SharedBuffered,
}

impl LayoutKind {
    /// Short lowercase label used in logs and exported metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::ReplicatedCopies => "replicated",
            Self::SharedBuffered => "shared",
        }
    }
}

impl fmt::Display for LayoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_short_aliases() {
        let kind: LayoutKind = serde_json::from_str("\"shared\"").unwrap();
        assert_eq!(kind, LayoutKind::SharedBuffered);
        let kind: LayoutKind = serde_json::from_str("\"replicated_copies\"").unwrap();
        assert_eq!(kind, LayoutKind::ReplicatedCopies);
    }
}
