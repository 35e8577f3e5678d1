use std::fmt;

use serde::Serialize;

use crate::id::EntryId;
use crate::layout::LayoutKind;
use crate::type_tag::TypeTag;

/// Identity and metadata of one booked aggregate.
///
/// `(path, name)` is unique within a registry. The remaining fields are
/// fixed at booking time and never change for the lifetime of the entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EntryKey {
    /// Canonical directory-like path, always ending in `/`.
    pub path: String,
    /// Leaf name within `path`.
    pub name: String,
    /// Value type held by the entry's layout.
    #[serde(rename = "type")]
    pub type_tag: TypeTag,
    pub layout: LayoutKind,
    /// Number of physical instances (1 unless `ReplicatedCopies`).
    pub instance_count: usize,
    /// Whether the drain should export this entry automatically.
    pub store_on_exit: bool,
    /// Registry slot assigned at booking.
    pub id: EntryId,
}

impl EntryKey {
    /// `path` and `name` joined, e.g. `/metrics/events`.
    pub fn full_name(&self) -> String {
        format!("{}{}", self.path, self.name)
    }

    /// Dense registry index of this entry.
    pub fn index(&self) -> u32 {
        self.id.index
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{} [{}, {} x{}]",
            self.path,
            self.name,
            self.type_tag.short_name(),
            self.layout,
            self.instance_count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> EntryKey {
        EntryKey {
            path: "/metrics/".into(),
            name: "events".into(),
            type_tag: TypeTag::of::<u64>(),
            layout: LayoutKind::ReplicatedCopies,
            instance_count: 3,
            store_on_exit: true,
            id: EntryId::new(0, 0),
        }
    }

    #[test]
    fn full_name_joins_path_and_name() {
        assert_eq!(key().full_name(), "/metrics/events");
    }

    #[test]
    fn display_names_type_and_layout() {
        assert_eq!(key().to_string(), "/metrics/events [u64, replicated x3]");
    }

    #[test]
    fn serializes_type_under_type_field() {
        let json = serde_json::to_value(key()).unwrap();
        assert_eq!(json["type"], "u64");
        assert_eq!(json["layout"], "replicated_copies");
        assert_eq!(json["id"]["index"], 0);
    }
}
