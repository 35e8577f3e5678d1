//! The booking registry.
//!
//! [`BookStore`] owns every booked layout in an arena indexed by
//! [`EntryId::index`]. A hash index keyed by [`KeyHash`] maps `(path, name)`
//! to arena slots. Arena slots are never reused: removal drops the layout,
//! bumps the slot's generation and unlinks the slot from the index.
//!
//! Mutations (`book`, `remove`, `clear`) are restricted to the thread that
//! constructed the store unless [`StoreConfig::allow_cross_thread_booking`]
//! is set. Queries may run from any thread that can borrow the store.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use tally_types::{normalize_path, validate_name, EntryId, EntryKey, KeyHash, TypeTag};
use tracing::{debug, info};

use crate::aggregate::Aggregate;
use crate::condition::Condition;
use crate::config::StoreConfig;
use crate::entry::{Entry, ErasedLayout};
use crate::error::{StoreError, StoreResult};
use crate::layout::{LayoutCell, LayoutSpec};
use crate::selection::Selection;

/// Per-booking options.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BookOptions {
    /// Export this entry at the end of the run. `None` uses
    /// [`StoreConfig::store_on_exit_default`].
    pub store_on_exit: Option<bool>,
}

impl BookOptions {
    pub fn store_on_exit(store_on_exit: bool) -> Self {
        Self {
            store_on_exit: Some(store_on_exit),
        }
    }
}

struct Slot {
    generation: u32,
    key: Arc<EntryKey>,
    layout: Option<Arc<dyn ErasedLayout>>,
}

impl Slot {
    fn entry(&self) -> Option<Entry> {
        self.layout
            .as_ref()
            .map(|layout| Entry::new(Arc::clone(&self.key), layout))
    }
}

/// Registry of booked aggregates.
pub struct BookStore {
    config: StoreConfig,
    owner: ThreadId,
    slots: Vec<Slot>,
    index: HashMap<KeyHash, Vec<u32>>,
}

impl BookStore {
    /// Create an empty store owned by the calling thread.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            owner: thread::current().id(),
            slots: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The thread allowed to mutate this store.
    pub fn owner_thread(&self) -> ThreadId {
        self.owner
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.layout.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ---------------------------------------------------------------
    // Booking
    // ---------------------------------------------------------------

    /// Book `(path, name)` or fetch the existing entry.
    ///
    /// See [`BookStore::book_with`].
    pub fn book<V: Aggregate>(
        &mut self,
        path: &str,
        name: &str,
        spec: LayoutSpec<V>,
        args: V::Args,
    ) -> StoreResult<Entry> {
        self.book_with(path, name, spec, args, BookOptions::default())
    }

    /// Book `(path, name)` or fetch the existing entry.
    ///
    /// Re-booking with the same value type, layout and instance count returns
    /// the existing entry; the new `spec`, `args` and `options` are ignored.
    /// Any other difference fails with [`StoreError::ConflictingBooking`].
    pub fn book_with<V: Aggregate>(
        &mut self,
        path: &str,
        name: &str,
        spec: LayoutSpec<V>,
        args: V::Args,
        options: BookOptions,
    ) -> StoreResult<Entry> {
        self.ensure_owner("book", || format!("{path}{name}"))?;
        let path = normalize_path(path)?;
        validate_name(name)?;

        let type_tag = TypeTag::of::<V>();
        let kind = spec.kind();
        let instances = spec.instance_count();
        let hash = KeyHash::of(&path, name);

        if let Some(slot) = self.lookup_slot(hash, &path, name) {
            let existing = &self.slots[slot];
            let key = &existing.key;
            if key.type_tag != type_tag || key.layout != kind || key.instance_count != instances {
                return Err(StoreError::ConflictingBooking {
                    path,
                    name: name.to_string(),
                    existing_type: key.type_tag.name(),
                    existing_layout: key.layout,
                    existing_instances: key.instance_count,
                    requested_type: type_tag.name(),
                    requested_layout: kind,
                    requested_instances: instances,
                });
            }
            debug!(entry = %key, "re-booked existing entry");
            return existing
                .entry()
                .ok_or_else(|| StoreError::EntryRemoved { entry: key.full_name() });
        }

        let cell = LayoutCell::<V>::create(spec, args, self.config.default_buffer_capacity)
            .map_err(|source| StoreError::InvalidLayout {
                path: path.clone(),
                name: name.to_string(),
                layout: kind,
                source,
            })?;

        let index = u32::try_from(self.slots.len()).expect("entry table exceeds u32::MAX slots");
        let key = Arc::new(EntryKey {
            path,
            name: name.to_string(),
            type_tag,
            layout: kind,
            instance_count: cell.instance_count(),
            store_on_exit: options
                .store_on_exit
                .unwrap_or(self.config.store_on_exit_default),
            id: EntryId::new(index, 0),
        });
        let layout: Arc<dyn ErasedLayout> = Arc::new(cell);
        let entry = Entry::new(Arc::clone(&key), &layout);

        debug!(entry = %key, id = ?key.id, "booked entry");
        self.slots.push(Slot {
            generation: 0,
            key,
            layout: Some(layout),
        });
        self.index.entry(hash).or_default().push(index);
        Ok(entry)
    }

    // ---------------------------------------------------------------
    // Lookup and queries
    // ---------------------------------------------------------------

    /// Exact lookup by path and name.
    pub fn get(&self, path: &str, name: &str) -> Option<Entry> {
        let path = normalize_path(path).ok()?;
        let slot = self.lookup_slot(KeyHash::of(&path, name), &path, name)?;
        self.slots[slot].entry()
    }

    /// Resolve an id handed out earlier.
    pub fn entry(&self, id: EntryId) -> StoreResult<Entry> {
        let slot = self.slots.get(id.slot()).ok_or(StoreError::IndexOutOfRange {
            what: "entry",
            index: id.slot(),
            len: self.slots.len(),
        })?;
        if slot.generation != id.generation {
            return Err(StoreError::EntryRemoved {
                entry: slot.key.full_name(),
            });
        }
        slot.entry().ok_or_else(|| StoreError::EntryRemoved {
            entry: slot.key.full_name(),
        })
    }

    /// Every live entry matching `condition`, in booking order.
    pub fn find(&self, condition: &Condition) -> Selection {
        let entries = self
            .slots
            .iter()
            .filter(|slot| slot.layout.is_some() && condition.matches(&slot.key))
            .filter_map(Slot::entry)
            .collect();
        Selection::new(entries, condition.clone())
    }

    /// The single entry matching `condition`.
    pub fn find_one(&self, condition: &Condition) -> StoreResult<Entry> {
        let mut selection = self.find(condition);
        match selection.len() {
            1 => selection.remove(0),
            count => Err(StoreError::NoMatch {
                condition: condition.to_string(),
                count,
            }),
        }
    }

    /// Every live entry.
    pub fn selection(&self) -> Selection {
        self.find(&Condition::all())
    }

    /// Flush every buffered layout. Returns the number of points applied.
    pub fn flush_all(&self) -> usize {
        self.slots
            .iter()
            .filter_map(|slot| slot.layout.as_ref())
            .map(|layout| layout.flush_all())
            .sum()
    }

    // ---------------------------------------------------------------
    // Removal
    // ---------------------------------------------------------------

    /// Remove the entry described by `key`.
    pub fn remove(&mut self, key: &EntryKey) -> StoreResult<()> {
        self.remove_id(key.id)
    }

    /// Remove the entry with the given id. Outstanding handles observe
    /// [`StoreError::EntryRemoved`] on their next use.
    pub fn remove_id(&mut self, id: EntryId) -> StoreResult<()> {
        self.ensure_owner("remove", || id.to_string())?;
        // Validates the id and its generation.
        self.entry(id)?;

        let slot = &mut self.slots[id.slot()];
        slot.layout = None;
        slot.generation = slot.generation.wrapping_add(1);
        let hash = KeyHash::of(&slot.key.path, &slot.key.name);
        debug!(entry = %slot.key, "removed entry");

        if let Some(bucket) = self.index.get_mut(&hash) {
            bucket.retain(|&i| i != id.index);
            if bucket.is_empty() {
                self.index.remove(&hash);
            }
        }
        Ok(())
    }

    /// Remove every live entry of `selection` from the store. Returns the
    /// number removed.
    pub fn remove_selection(&mut self, selection: &Selection) -> StoreResult<usize> {
        self.ensure_owner("remove", || format!("selection {}", selection.condition()))?;
        let mut removed = 0;
        for entry in selection.iter().filter(|e| e.is_live()) {
            self.remove_id(entry.id())?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Remove every entry. Unflushed buffered fills are discarded.
    pub fn clear(&mut self) -> StoreResult<()> {
        self.ensure_owner("clear", || "all entries".to_string())?;
        let mut cleared = 0usize;
        for slot in &mut self.slots {
            if slot.layout.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                cleared += 1;
            }
        }
        self.index.clear();
        info!(cleared, "cleared book store");
        Ok(())
    }

    fn lookup_slot(&self, hash: KeyHash, path: &str, name: &str) -> Option<usize> {
        self.index
            .get(&hash)?
            .iter()
            .map(|&i| i as usize)
            .find(|&i| {
                let key = &self.slots[i].key;
                key.path == path && key.name == name
            })
    }

    fn ensure_owner(
        &self,
        operation: &'static str,
        target: impl FnOnce() -> String,
    ) -> StoreResult<()> {
        let current = thread::current().id();
        if current == self.owner || self.config.allow_cross_thread_booking {
            return Ok(());
        }
        Err(StoreError::WrongThread {
            operation,
            target: target(),
            owner: self.owner,
            current,
        })
    }
}

impl Default for BookStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BookStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BookStore")
            .field("entries", &self.len())
            .field("slots", &self.slots.len())
            .field("owner", &self.owner)
            .finish()
    }
}
