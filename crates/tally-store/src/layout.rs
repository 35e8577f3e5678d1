//! Physical storage of one booked aggregate.
//!
//! A [`LayoutCell`] owns every instance of an entry's value under one of
//! three strategies:
//!
//! - **Single**: one instance behind a lock. Several concurrent writers are
//!   not arbitrated beyond that lock; the layout is meant for one writer.
//! - **ReplicatedCopies**: one instance per writer slot. Each slot has its
//!   own lock, which is uncontended as long as every slot has a single
//!   writer. Snapshots fold the instances with the booked combine function.
//! - **SharedBuffered**: one shared instance fed by per-handle buffers (see
//!   [`crate::buffer`]). Snapshots force-flush every buffer first.
//!
//! Instances never move or shrink after creation.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tally_types::LayoutKind;

use crate::aggregate::{Aggregate, Combine, CombineFn};
use crate::buffer::{FillBuffer, FillManager, SharedBuffer};
use crate::error::{LayoutError, StoreError, StoreResult};

/// The layout requested at booking time.
pub enum LayoutSpec<V> {
    Single,
    ReplicatedCopies {
        instances: usize,
        combine: CombineFn<V>,
    },
    /// `capacity: None` falls back to the store's default buffer capacity.
    SharedBuffered { capacity: Option<usize> },
}

impl<V: Aggregate> LayoutSpec<V> {
    pub fn single() -> Self {
        Self::Single
    }

    /// One instance per slot, merged with `combine`.
    pub fn replicated<F>(instances: usize, combine: F) -> Self
    where
        F: Fn(&V, &V) -> V + Send + Sync + 'static,
    {
        Self::ReplicatedCopies {
            instances,
            combine: Arc::new(combine),
        }
    }

    pub fn shared() -> Self {
        Self::SharedBuffered { capacity: None }
    }

    pub fn shared_with_capacity(capacity: usize) -> Self {
        Self::SharedBuffered {
            capacity: Some(capacity),
        }
    }

    pub fn kind(&self) -> LayoutKind {
        match self {
            Self::Single => LayoutKind::Single,
            Self::ReplicatedCopies { .. } => LayoutKind::ReplicatedCopies,
            Self::SharedBuffered { .. } => LayoutKind::SharedBuffered,
        }
    }

    /// Physical instance count this request produces.
    pub fn instance_count(&self) -> usize {
        match self {
            Self::ReplicatedCopies { instances, .. } => *instances,
            _ => 1,
        }
    }
}

impl<V: Combine> LayoutSpec<V> {
    /// One instance per slot, merged with [`Combine::combine`].
    pub fn replicated_combined(instances: usize) -> Self {
        Self::replicated(instances, |a: &V, b: &V| a.combine(b))
    }
}

impl<V> fmt::Debug for LayoutSpec<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => f.write_str("Single"),
            Self::ReplicatedCopies { instances, .. } => f
                .debug_struct("ReplicatedCopies")
                .field("instances", instances)
                .finish_non_exhaustive(),
            Self::SharedBuffered { capacity } => f
                .debug_struct("SharedBuffered")
                .field("capacity", capacity)
                .finish(),
        }
    }
}

enum Storage<V: Aggregate> {
    Single(Mutex<V>),
    Replicated {
        instances: Vec<Mutex<V>>,
        combine: CombineFn<V>,
    },
    Shared(FillManager<V>),
}

/// Storage for every instance of one entry.
pub struct LayoutCell<V: Aggregate> {
    args: V::Args,
    storage: Storage<V>,
}

impl<V: Aggregate> LayoutCell<V> {
    /// Build the instances for `spec` from `args`.
    ///
    /// `default_capacity` applies to `SharedBuffered` requests that do not
    /// name a capacity.
    pub fn create(
        spec: LayoutSpec<V>,
        args: V::Args,
        default_capacity: usize,
    ) -> Result<Self, LayoutError> {
        let storage = match spec {
            LayoutSpec::Single => Storage::Single(Mutex::new(V::create(&args))),
            LayoutSpec::ReplicatedCopies { instances, combine } => {
                if instances == 0 {
                    return Err(LayoutError::ZeroInstances);
                }
                Storage::Replicated {
                    instances: (0..instances).map(|_| Mutex::new(V::create(&args))).collect(),
                    combine,
                }
            }
            LayoutSpec::SharedBuffered { capacity } => {
                let capacity = capacity.unwrap_or(default_capacity);
                if capacity == 0 {
                    return Err(LayoutError::ZeroCapacity);
                }
                Storage::Shared(FillManager::new(V::create(&args), capacity))
            }
        };
        Ok(Self { args, storage })
    }

    pub fn kind(&self) -> LayoutKind {
        match &self.storage {
            Storage::Single(_) => LayoutKind::Single,
            Storage::Replicated { .. } => LayoutKind::ReplicatedCopies,
            Storage::Shared(_) => LayoutKind::SharedBuffered,
        }
    }

    pub fn instance_count(&self) -> usize {
        match &self.storage {
            Storage::Replicated { instances, .. } => instances.len(),
            _ => 1,
        }
    }

    /// Buffer capacity for `SharedBuffered` layouts.
    pub fn buffer_capacity(&self) -> Option<usize> {
        match &self.storage {
            Storage::Shared(manager) => Some(manager.capacity()),
            _ => None,
        }
    }

    /// Lock instance `slot` for direct access.
    ///
    /// For `SharedBuffered` the shared instance is returned as is; pending
    /// buffered fills are not applied.
    pub fn at(&self, slot: usize) -> StoreResult<MutexGuard<'_, V>> {
        let len = self.instance_count();
        if slot >= len {
            return Err(StoreError::IndexOutOfRange {
                what: "slot",
                index: slot,
                len,
            });
        }
        Ok(match &self.storage {
            Storage::Single(value) => value.lock().expect("instance lock poisoned"),
            Storage::Replicated { instances, .. } => {
                instances[slot].lock().expect("instance lock poisoned")
            }
            Storage::Shared(manager) => manager.shared(),
        })
    }

    /// Snapshot of the logical content of this layout.
    ///
    /// Replicated layouts fold every instance left to right with the booked
    /// combine function; the cost is linear in the instance count and the
    /// result is not cached. Buffered layouts flush every outstanding buffer
    /// into the shared instance before reading it.
    pub fn merged(&self) -> V {
        match &self.storage {
            Storage::Single(value) => value.lock().expect("instance lock poisoned").clone(),
            Storage::Replicated { instances, combine } => {
                let mut iter = instances.iter();
                let first = iter
                    .next()
                    .map(|m| m.lock().expect("instance lock poisoned").clone())
                    .unwrap_or_else(|| V::create(&self.args));
                // The slot lock is released before `combine` runs, so a
                // panicking combine cannot poison a writer's instance.
                iter.fold(first, |acc, m| {
                    let value = m.lock().expect("instance lock poisoned").clone();
                    combine(&acc, &value)
                })
            }
            Storage::Shared(manager) => {
                manager.flush_all();
                manager.shared().clone()
            }
        }
    }

    /// Flush every outstanding write buffer. Returns the number of points
    /// applied; always zero for unbuffered layouts.
    pub fn flush_all(&self) -> usize {
        match &self.storage {
            Storage::Shared(manager) => manager.flush_all(),
            _ => 0,
        }
    }

    /// Rebuild every instance from the stored constructor arguments.
    ///
    /// Buffered fills pending at the time of the call are applied first and
    /// then discarded along with everything else.
    pub fn reset(&self) {
        match &self.storage {
            Storage::Single(value) => {
                *value.lock().expect("instance lock poisoned") = V::create(&self.args);
            }
            Storage::Replicated { instances, .. } => {
                for instance in instances {
                    *instance.lock().expect("instance lock poisoned") = V::create(&self.args);
                }
            }
            Storage::Shared(manager) => {
                manager.flush_all();
                manager.replace(V::create(&self.args));
            }
        }
    }

    /// Number of live write buffers issued by a `SharedBuffered` layout.
    pub fn outstanding_buffers(&self) -> usize {
        match &self.storage {
            Storage::Shared(manager) => manager.outstanding(),
            _ => 0,
        }
    }

    pub(crate) fn issue_buffer(&self) -> Option<SharedBuffer<V::Point>> {
        match &self.storage {
            Storage::Shared(manager) => Some(manager.issue()),
            _ => None,
        }
    }

    /// Direct write into `slot`. Callers validate `slot` when the handle is
    /// created.
    pub(crate) fn fill_slot(&self, slot: usize, point: V::Point) {
        self.direct(slot).fill(point);
    }

    pub(crate) fn fill_slot_n<I>(&self, slot: usize, points: I)
    where
        I: IntoIterator<Item = V::Point>,
    {
        self.direct(slot).fill_n(points);
    }

    pub(crate) fn fill_buffered(&self, buffer: &Mutex<FillBuffer<V::Point>>, point: V::Point) {
        self.manager().fill(buffer, point);
    }

    pub(crate) fn fill_buffered_n<I>(&self, buffer: &Mutex<FillBuffer<V::Point>>, points: I)
    where
        I: IntoIterator<Item = V::Point>,
    {
        self.manager().fill_n(buffer, points);
    }

    pub(crate) fn flush_buffer(&self, buffer: &Mutex<FillBuffer<V::Point>>) -> usize {
        match &self.storage {
            Storage::Shared(manager) => manager.flush(buffer),
            _ => 0,
        }
    }

    /// Write buffers are only issued by `SharedBuffered` layouts, so a
    /// buffered fill reaching any other storage is a bug.
    fn manager(&self) -> &FillManager<V> {
        match &self.storage {
            Storage::Shared(manager) => manager,
            _ => unreachable!("buffered fill on a {} layout", self.kind()),
        }
    }

    fn direct(&self, slot: usize) -> MutexGuard<'_, V> {
        match &self.storage {
            Storage::Single(value) => value.lock().expect("instance lock poisoned"),
            Storage::Replicated { instances, .. } => {
                instances[slot].lock().expect("instance lock poisoned")
            }
            Storage::Shared(manager) => manager.shared(),
        }
    }
}

impl<V: Aggregate> fmt::Debug for LayoutCell<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutCell")
            .field("kind", &self.kind())
            .field("instances", &self.instance_count())
            .finish()
    }
}
