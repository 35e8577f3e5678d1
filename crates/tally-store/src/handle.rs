//! Typed write/read capabilities bound to one entry.

use std::fmt;
use std::sync::{Arc, Weak};

use tally_types::{EntryKey, LayoutKind};
use tracing::trace;

use crate::aggregate::Aggregate;
use crate::buffer::{BufferState, SharedBuffer};
use crate::error::{StoreError, StoreResult};
use crate::layout::LayoutCell;

/// Fill and snapshot access to one entry as value type `V`.
///
/// A handle does not own the entry. Every operation first checks that the
/// entry is still booked and fails with [`StoreError::EntryRemoved`]
/// otherwise.
///
/// Handles of `SharedBuffered` entries own a private write buffer. It is
/// flushed when full, on [`Handle::flush`], on [`Handle::merged`], when any
/// snapshot of the entry is taken, and when the handle is dropped.
pub struct Handle<V: Aggregate> {
    key: Arc<EntryKey>,
    layout: Weak<LayoutCell<V>>,
    slot: usize,
    buffer: Option<SharedBuffer<V::Point>>,
}

impl<V: Aggregate> Handle<V> {
    pub(crate) fn new(
        key: Arc<EntryKey>,
        layout: &Arc<LayoutCell<V>>,
        slot: usize,
        buffer: Option<SharedBuffer<V::Point>>,
    ) -> Self {
        Self {
            key,
            layout: Arc::downgrade(layout),
            slot,
            buffer,
        }
    }

    pub fn key(&self) -> &EntryKey {
        &self.key
    }

    /// Instance slot this handle writes to (always 0 for `Single`).
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn layout_kind(&self) -> LayoutKind {
        self.key.layout
    }

    pub fn is_live(&self) -> bool {
        self.layout.strong_count() > 0
    }

    /// Record one measurement.
    pub fn fill(&self, point: V::Point) -> StoreResult<()> {
        let layout = self.upgrade()?;
        match &self.buffer {
            Some(buffer) => layout.fill_buffered(buffer, point),
            None => layout.fill_slot(self.slot, point),
        }
        Ok(())
    }

    /// Record several measurements in order.
    pub fn fill_n<I>(&self, points: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = V::Point>,
    {
        let layout = self.upgrade()?;
        match &self.buffer {
            Some(buffer) => layout.fill_buffered_n(buffer, points),
            None => layout.fill_slot_n(self.slot, points),
        }
        Ok(())
    }

    /// Apply this handle's pending fills. Returns the number applied.
    pub fn flush(&self) -> StoreResult<usize> {
        let layout = self.upgrade()?;
        Ok(match &self.buffer {
            Some(buffer) => layout.flush_buffer(buffer),
            None => 0,
        })
    }

    /// Merged snapshot of the whole entry.
    ///
    /// This handle's own buffer is flushed first, so the caller always sees
    /// its own writes; the layout then flushes every other buffer.
    pub fn merged(&self) -> StoreResult<V> {
        let layout = self.upgrade()?;
        if let Some(buffer) = &self.buffer {
            layout.flush_buffer(buffer);
        }
        Ok(layout.merged())
    }

    /// Number of fills waiting in this handle's buffer.
    pub fn buffered(&self) -> usize {
        self.buffer
            .as_ref()
            .map_or(0, |b| b.lock().expect("fill buffer lock poisoned").len())
    }

    pub fn buffer_state(&self) -> BufferState {
        self.buffer.as_ref().map_or(BufferState::Empty, |b| {
            b.lock().expect("fill buffer lock poisoned").state()
        })
    }

    fn upgrade(&self) -> StoreResult<Arc<LayoutCell<V>>> {
        self.layout.upgrade().ok_or_else(|| StoreError::EntryRemoved {
            entry: self.key.full_name(),
        })
    }
}

impl<V: Aggregate> Drop for Handle<V> {
    fn drop(&mut self) {
        let Some(buffer) = &self.buffer else {
            return;
        };
        match self.layout.upgrade() {
            Some(layout) => {
                let applied = layout.flush_buffer(buffer);
                if applied > 0 {
                    trace!(entry = %self.key.full_name(), applied, "flushed buffer on handle drop");
                }
            }
            None => {
                trace!(entry = %self.key.full_name(), "dropping buffer of removed entry");
            }
        }
    }
}

impl<V: Aggregate> fmt::Debug for Handle<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("entry", &self.key.full_name())
            .field("slot", &self.slot)
            .field("buffered", &self.buffer.is_some())
            .field("live", &self.is_live())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Entry, ErasedLayout};
    use crate::layout::LayoutSpec;
    use tally_types::{EntryId, TypeTag};

    fn booked(spec: LayoutSpec<i64>) -> (Arc<dyn ErasedLayout>, Entry) {
        let kind = spec.kind();
        let cell = LayoutCell::<i64>::create(spec, (), 1024).unwrap();
        let key = Arc::new(EntryKey {
            path: "/h/".into(),
            name: "count".into(),
            type_tag: TypeTag::of::<i64>(),
            layout: kind,
            instance_count: cell.instance_count(),
            store_on_exit: false,
            id: EntryId::new(0, 0),
        });
        let owned: Arc<dyn ErasedLayout> = Arc::new(cell);
        let entry = Entry::new(key, &owned);
        (owned, entry)
    }

    #[test]
    fn handle_reads_back_own_writes() {
        let (_owned, entry) = booked(LayoutSpec::shared_with_capacity(100));
        let handle = entry.handle::<i64>(0).unwrap();
        handle.fill(2).unwrap();
        handle.fill_n([3, 4]).unwrap();
        assert_eq!(handle.buffered(), 3);
        assert_eq!(handle.buffer_state(), BufferState::Accumulating);
        assert_eq!(handle.merged().unwrap(), 9);
        assert_eq!(handle.buffered(), 0);
    }

    #[test]
    fn explicit_flush_reports_count() {
        let (_owned, entry) = booked(LayoutSpec::shared_with_capacity(100));
        let handle = entry.handle::<i64>(0).unwrap();
        handle.fill_n(vec![1; 5]).unwrap();
        assert_eq!(handle.flush().unwrap(), 5);
        assert_eq!(handle.flush().unwrap(), 0);
        assert_eq!(handle.buffer_state(), BufferState::Empty);
    }

    #[test]
    fn dropping_handle_flushes_buffer() {
        let (_owned, entry) = booked(LayoutSpec::shared_with_capacity(100));
        {
            let handle = entry.handle::<i64>(0).unwrap();
            handle.fill(11).unwrap();
        }
        let peek = entry
            .with_layout::<i64, _, _>(|cell| *cell.at(0).unwrap())
            .unwrap();
        assert_eq!(peek, 11);
    }

    #[test]
    fn removed_entry_is_reported() {
        let (owned, entry) = booked(LayoutSpec::replicated_combined(2));
        let handle = entry.handle::<i64>(1).unwrap();
        handle.fill(1).unwrap();
        drop(owned);
        assert!(!handle.is_live());
        assert!(matches!(handle.fill(1), Err(StoreError::EntryRemoved { .. })));
        assert!(matches!(handle.merged(), Err(StoreError::EntryRemoved { .. })));
        assert!(matches!(handle.flush(), Err(StoreError::EntryRemoved { .. })));
    }

    #[test]
    fn unbuffered_handles_have_nothing_pending() {
        let (_owned, entry) = booked(LayoutSpec::single());
        let handle = entry.handle::<i64>(0).unwrap();
        handle.fill(5).unwrap();
        assert_eq!(handle.buffered(), 0);
        assert_eq!(handle.flush().unwrap(), 0);
        assert_eq!(handle.merged().unwrap(), 5);
    }
}
