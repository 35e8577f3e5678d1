//! Batched writes into a shared aggregate instance.
//!
//! Every handle drawn from a `SharedBuffered` entry owns a [`FillBuffer`].
//! Fills append to the buffer without touching the shared instance; once the
//! buffer reaches its capacity the whole batch is applied under a single
//! acquisition of the shared lock. The [`FillManager`] remembers every buffer
//! it issued (weakly) so that a snapshot can force-flush all of them first.
//!
//! Lock order is always buffer, then shared instance. The manager's buffer
//! list is never held while a buffer lock is taken.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::trace;

use crate::aggregate::Aggregate;

/// Observable state of a write buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferState {
    /// No pending points.
    Empty,
    /// At least one point is waiting to be flushed.
    Accumulating,
    /// The pending batch is being applied to the shared instance.
    Flushing,
}

/// A private batch of pending points owned by one handle.
#[derive(Debug)]
pub struct FillBuffer<P> {
    points: Vec<P>,
    capacity: usize,
    state: BufferState,
}

impl<P> FillBuffer<P> {
    fn new(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
            capacity,
            state: BufferState::Empty,
        }
    }

    /// Queue a point. Returns `true` once the buffer is full.
    pub(crate) fn push(&mut self, point: P) -> bool {
        self.points.push(point);
        self.state = BufferState::Accumulating;
        self.points.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn state(&self) -> BufferState {
        self.state
    }
}

/// Shared handle to one issued buffer.
pub(crate) type SharedBuffer<P> = Arc<Mutex<FillBuffer<P>>>;

/// Owns the shared instance of a `SharedBuffered` layout and tracks the
/// buffers feeding it.
pub(crate) struct FillManager<V: Aggregate> {
    shared: Mutex<V>,
    capacity: usize,
    issued: Mutex<Vec<Weak<Mutex<FillBuffer<V::Point>>>>>,
}

impl<V: Aggregate> FillManager<V> {
    pub(crate) fn new(value: V, capacity: usize) -> Self {
        Self {
            shared: Mutex::new(value),
            capacity,
            issued: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Allocate a fresh buffer and remember it for forced flushes.
    pub(crate) fn issue(&self) -> SharedBuffer<V::Point> {
        let buffer = Arc::new(Mutex::new(FillBuffer::new(self.capacity)));
        let mut issued = self.issued.lock().expect("buffer list lock poisoned");
        issued.retain(|weak| weak.strong_count() > 0);
        issued.push(Arc::downgrade(&buffer));
        buffer
    }

    /// Number of issued buffers whose handles are still alive.
    pub(crate) fn outstanding(&self) -> usize {
        self.issued
            .lock()
            .expect("buffer list lock poisoned")
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Append a point to `buffer`, flushing the batch when it fills up.
    pub(crate) fn fill(&self, buffer: &Mutex<FillBuffer<V::Point>>, point: V::Point) {
        let mut buf = buffer.lock().expect("fill buffer lock poisoned");
        if buf.push(point) {
            self.apply(&mut buf);
        }
    }

    /// Append several points, flushing each time the buffer fills up.
    pub(crate) fn fill_n<I>(&self, buffer: &Mutex<FillBuffer<V::Point>>, points: I)
    where
        I: IntoIterator<Item = V::Point>,
    {
        let mut buf = buffer.lock().expect("fill buffer lock poisoned");
        for point in points {
            if buf.push(point) {
                self.apply(&mut buf);
            }
        }
    }

    /// Flush one buffer. Returns the number of points applied.
    pub(crate) fn flush(&self, buffer: &Mutex<FillBuffer<V::Point>>) -> usize {
        let mut buf = buffer.lock().expect("fill buffer lock poisoned");
        self.apply(&mut buf)
    }

    /// Flush every live buffer this manager issued, pruning dead ones.
    pub(crate) fn flush_all(&self) -> usize {
        let live: Vec<SharedBuffer<V::Point>> = {
            let mut issued = self.issued.lock().expect("buffer list lock poisoned");
            issued.retain(|weak| weak.strong_count() > 0);
            issued.iter().filter_map(Weak::upgrade).collect()
        };
        live.iter().map(|buffer| self.flush(buffer)).sum()
    }

    /// Read the shared instance without flushing.
    pub(crate) fn shared(&self) -> MutexGuard<'_, V> {
        self.shared.lock().expect("shared instance lock poisoned")
    }

    /// Replace the shared instance.
    pub(crate) fn replace(&self, value: V) {
        *self.shared() = value;
    }

    fn apply(&self, buf: &mut FillBuffer<V::Point>) -> usize {
        let count = buf.points.len();
        if count == 0 {
            return 0;
        }
        buf.state = BufferState::Flushing;
        self.shared().fill_n(buf.points.drain(..));
        buf.state = BufferState::Empty;
        trace!(count, "flushed fill buffer");
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_flushes_at_capacity() {
        let manager = FillManager::new(0i64, 3);
        let buffer = manager.issue();

        manager.fill(&buffer, 1);
        manager.fill(&buffer, 1);
        assert_eq!(*manager.shared(), 0);
        assert_eq!(buffer.lock().unwrap().state(), BufferState::Accumulating);

        manager.fill(&buffer, 1);
        assert_eq!(*manager.shared(), 3);
        assert!(buffer.lock().unwrap().is_empty());
        assert_eq!(buffer.lock().unwrap().state(), BufferState::Empty);
    }

    #[test]
    fn flushing_empty_buffer_is_noop() {
        let manager = FillManager::new(0i64, 4);
        let buffer = manager.issue();
        assert_eq!(manager.flush(&buffer), 0);
        assert_eq!(*manager.shared(), 0);
    }

    #[test]
    fn fill_n_crosses_capacity_boundaries() {
        let manager = FillManager::new(0i64, 4);
        let buffer = manager.issue();
        manager.fill_n(&buffer, vec![1; 10]);
        // Two full batches applied, two points pending.
        assert_eq!(*manager.shared(), 8);
        assert_eq!(buffer.lock().unwrap().len(), 2);
    }

    #[test]
    fn flush_all_reaches_every_live_buffer() {
        let manager = FillManager::new(0i64, 100);
        let a = manager.issue();
        let b = manager.issue();
        manager.fill(&a, 5);
        manager.fill(&b, 7);

        assert_eq!(manager.flush_all(), 2);
        assert_eq!(*manager.shared(), 12);
    }

    #[test]
    fn dropped_buffers_are_pruned() {
        let manager = FillManager::new(0i64, 8);
        let kept = manager.issue();
        drop(manager.issue());
        assert_eq!(manager.outstanding(), 1);
        drop(kept);
        assert_eq!(manager.outstanding(), 0);
        assert_eq!(manager.flush_all(), 0);
    }
}
