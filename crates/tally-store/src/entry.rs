//! Type-erased entries and typed access to them.
//!
//! The registry owns every layout as an `Arc<dyn ErasedLayout>`. Callers only
//! ever see [`Entry`] values, which hold a weak reference: once the registry
//! drops the layout, every `Entry` and [`Handle`] bound to it reports
//! [`StoreError::EntryRemoved`] instead of reaching freed state.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use tally_types::{EntryId, EntryKey, LayoutKind, TypeTag};

use crate::aggregate::Aggregate;
use crate::error::{StoreError, StoreResult};
use crate::handle::Handle;
use crate::layout::LayoutCell;

/// The operations the registry needs without knowing the value type.
pub(crate) trait ErasedLayout: Send + Sync {
    fn type_tag(&self) -> TypeTag;
    fn kind(&self) -> LayoutKind;
    fn instance_count(&self) -> usize;
    fn flush_all(&self) -> usize;
    fn merged_json(&self) -> StoreResult<serde_json::Value>;
    fn merged_bytes(&self) -> StoreResult<Vec<u8>>;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<V: Aggregate> ErasedLayout for LayoutCell<V> {
    fn type_tag(&self) -> TypeTag {
        TypeTag::of::<V>()
    }

    fn kind(&self) -> LayoutKind {
        LayoutCell::kind(self)
    }

    fn instance_count(&self) -> usize {
        LayoutCell::instance_count(self)
    }

    fn flush_all(&self) -> usize {
        LayoutCell::flush_all(self)
    }

    fn merged_json(&self) -> StoreResult<serde_json::Value> {
        serde_json::to_value(self.merged()).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn merged_bytes(&self) -> StoreResult<Vec<u8>> {
        bincode::serialize(&self.merged()).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A booked aggregate as seen from outside the registry.
///
/// Cheap to clone. Does not keep the layout alive.
#[derive(Clone)]
pub struct Entry {
    key: Arc<EntryKey>,
    layout: Weak<dyn ErasedLayout>,
}

impl Entry {
    pub(crate) fn new(key: Arc<EntryKey>, layout: &Arc<dyn ErasedLayout>) -> Self {
        Self {
            key,
            layout: Arc::downgrade(layout),
        }
    }

    pub fn key(&self) -> &EntryKey {
        &self.key
    }

    pub fn id(&self) -> EntryId {
        self.key.id
    }

    /// Returns `false` once the entry has been removed from its store.
    pub fn is_live(&self) -> bool {
        self.layout.strong_count() > 0
    }

    /// Acquire a handle for writing and reading the entry as `V`.
    ///
    /// `slot` selects the instance for `ReplicatedCopies` entries and must be
    /// below the instance count. It is ignored by `Single` entries and only
    /// recorded by `SharedBuffered` entries, where every call returns a
    /// handle with its own fresh write buffer.
    pub fn handle<V: Aggregate>(&self, slot: usize) -> StoreResult<Handle<V>> {
        let layout = self.typed::<V>()?;
        let (slot, buffer) = match layout.kind() {
            LayoutKind::Single => (0, None),
            LayoutKind::ReplicatedCopies => {
                let len = layout.instance_count();
                if slot >= len {
                    return Err(StoreError::IndexOutOfRange {
                        what: "slot",
                        index: slot,
                        len,
                    });
                }
                (slot, None)
            }
            LayoutKind::SharedBuffered => (slot, layout.issue_buffer()),
        };
        Ok(Handle::new(Arc::clone(&self.key), &layout, slot, buffer))
    }

    /// Merged snapshot of the entry as `V`.
    pub fn merged<V: Aggregate>(&self) -> StoreResult<V> {
        Ok(self.typed::<V>()?.merged())
    }

    /// Run `f` against the typed layout without retaining it.
    pub fn with_layout<V, R, F>(&self, f: F) -> StoreResult<R>
    where
        V: Aggregate,
        F: FnOnce(&LayoutCell<V>) -> R,
    {
        let layout = self.typed::<V>()?;
        Ok(f(&layout))
    }

    /// Merged snapshot serialized to JSON, without naming the value type.
    pub fn merged_json(&self) -> StoreResult<serde_json::Value> {
        self.upgrade()?.merged_json()
    }

    /// Merged snapshot serialized with bincode, without naming the value type.
    pub fn merged_bytes(&self) -> StoreResult<Vec<u8>> {
        self.upgrade()?.merged_bytes()
    }

    /// Force every outstanding write buffer of the entry to flush.
    pub fn flush(&self) -> StoreResult<usize> {
        Ok(self.upgrade()?.flush_all())
    }

    fn upgrade(&self) -> StoreResult<Arc<dyn ErasedLayout>> {
        self.layout.upgrade().ok_or_else(|| StoreError::EntryRemoved {
            entry: self.key.full_name(),
        })
    }

    fn typed<V: Aggregate>(&self) -> StoreResult<Arc<LayoutCell<V>>> {
        let layout = self.upgrade()?;
        let recorded = layout.type_tag();
        let mismatch = || StoreError::TypeMismatch {
            path: self.key.path.clone(),
            name: self.key.name.clone(),
            expected: recorded.name(),
            requested: std::any::type_name::<V>(),
        };
        if !recorded.is::<V>() {
            return Err(mismatch());
        }
        layout
            .into_any()
            .downcast::<LayoutCell<V>>()
            .map_err(|_| mismatch())
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("key", &self.key.full_name())
            .field("id", &self.key.id)
            .field("live", &self.is_live())
            .finish()
    }
}
