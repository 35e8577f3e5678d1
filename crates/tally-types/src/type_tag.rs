use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Serialize, Serializer};

/// Runtime tag of an aggregate's value type.
///
/// Two tags are equal exactly when they were created from the same Rust
/// type. The type name is carried along for diagnostics and export; it is
/// not used for comparison.
#[derive(Clone, Copy)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    /// Tag for the type `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Returns `true` if this tag was created from `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    /// Fully qualified type name, e.g. `tally_hist::counter::Counter`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path, e.g. `Counter`.
    ///
    /// Generic parameters are kept as written after the last path segment
    /// of the outer type.
    pub fn short_name(&self) -> &'static str {
        let outer_end = self.name.find('<').unwrap_or(self.name.len());
        let start = self.name[..outer_end].rfind("::").map_or(0, |i| i + 2);
        &self.name[start..]
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

impl Hash for TypeTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({})", self.short_name())
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl Serialize for TypeTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Local;

    #[test]
    fn tags_compare_by_type() {
        assert_eq!(TypeTag::of::<u64>(), TypeTag::of::<u64>());
        assert_ne!(TypeTag::of::<u64>(), TypeTag::of::<i64>());
        assert!(TypeTag::of::<Local>().is::<Local>());
        assert!(!TypeTag::of::<Local>().is::<u8>());
    }

    #[test]
    fn short_name_strips_module_path() {
        let tag = TypeTag::of::<Local>();
        assert_eq!(tag.short_name(), "Local");
        assert!(tag.name().ends_with("::Local"));

        let generic = TypeTag::of::<Vec<Local>>();
        assert!(generic.short_name().starts_with("Vec<"));
    }

    #[test]
    fn serializes_as_type_name() {
        let json = serde_json::to_string(&TypeTag::of::<u32>()).unwrap();
        assert_eq!(json, "\"u32\"");
    }
}
