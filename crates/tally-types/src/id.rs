use std::fmt;

use serde::{Deserialize, Serialize};

/// Dense identifier of a registry slot.
///
/// `index` is the position in the registry's entry table and is never
/// reused. `generation` changes when the slot's entry is removed, so an id
/// captured before removal no longer resolves.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId {
    pub index: u32,
    pub generation: u32,
}

impl EntryId {
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// The slot position as a `usize`, for indexing the entry table.
    pub fn slot(&self) -> usize {
        self.index as usize
    }
}

impl fmt::Debug for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryId({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

/// Domain separation context for key hashing.
const KEY_HASH_CONTEXT: &str = "tally 2024 entry key";

/// BLAKE3 hash of a `(path, name)` pair.
///
/// Used as the registry's index key. Distinct pairs can in principle share a
/// hash, so lookups still compare path and name exactly.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyHash([u8; 32]);

impl KeyHash {
    /// Hash a path and name. The path length is mixed in first so that
    /// `("/a/", "bc")` and `("/a/b", "c")` never collide by concatenation.
    pub fn of(path: &str, name: &str) -> Self {
        let mut hasher = blake3::Hasher::new_derive_key(KEY_HASH_CONTEXT);
        hasher.update(&(path.len() as u64).to_le_bytes());
        hasher.update(path.as_bytes());
        hasher.update(name.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Debug for KeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyHash({})", self.short_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn same_pair_same_hash() {
        assert_eq!(KeyHash::of("/m/", "events"), KeyHash::of("/m/", "events"));
    }

    #[test]
    fn split_point_matters() {
        assert_ne!(KeyHash::of("/a/", "bc"), KeyHash::of("/a/b", "c"));
    }

    #[test]
    fn entry_id_display() {
        let id = EntryId::new(7, 2);
        assert_eq!(id.to_string(), "#7");
        assert_eq!(format!("{id:?}"), "EntryId(7v2)");
        assert_eq!(id.slot(), 7);
    }

    proptest! {
        #[test]
        fn distinct_pairs_hash_differently(
            p1 in "/[a-z]{0,6}/", n1 in "[a-z]{1,6}",
            p2 in "/[a-z]{0,6}/", n2 in "[a-z]{1,6}",
        ) {
            prop_assume!((p1.as_str(), n1.as_str()) != (p2.as_str(), n2.as_str()));
            prop_assert_ne!(KeyHash::of(&p1, &n1), KeyHash::of(&p2, &n2));
        }
    }
}
