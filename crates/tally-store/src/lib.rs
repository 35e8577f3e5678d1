//! Concurrent aggregate store.
//!
//! Worker threads record measurements into named, typed aggregates; at the
//! end of a run every aggregate yields one merged snapshot that reflects the
//! contributions of all threads.
//!
//! # Flow
//!
//! 1. During single-threaded setup, [`BookStore::book`] creates (or fetches)
//!    an [`Entry`] for a `(path, name)` pair with a [`LayoutSpec`].
//! 2. Each worker obtains a [`Handle`] from the entry and calls
//!    [`Handle::fill`] while processing events. No registry access is
//!    needed after booking.
//! 3. At drain time, [`BookStore::find`] selects entries by [`Condition`]
//!    and each entry produces its merged snapshot.
//!
//! # Layouts
//!
//! - `Single`: one instance.
//! - `ReplicatedCopies`: one instance per worker slot, folded with a combine
//!   function supplied at booking.
//! - `SharedBuffered`: one shared instance fed through per-handle batches.
//!
//! # Design Rules
//!
//! 1. `(path, name)` identifies at most one live entry.
//! 2. Only the constructing thread mutates the registry unless configured
//!    otherwise.
//! 3. Handles never keep an entry alive; removal is observed as
//!    [`StoreError::EntryRemoved`].
//! 4. A snapshot never loses a buffered fill.

pub mod aggregate;
pub mod buffer;
pub mod condition;
pub mod config;
pub mod entry;
pub mod error;
pub mod handle;
pub mod layout;
pub mod selection;
pub mod store;

pub use aggregate::{Aggregate, Combine, CombineFn};
pub use buffer::{BufferState, FillBuffer};
pub use condition::{Condition, ConditionBuilder};
pub use config::{StoreConfig, DEFAULT_BUFFER_CAPACITY};
pub use entry::Entry;
pub use error::{LayoutError, StoreError, StoreResult};
pub use handle::Handle;
pub use layout::{LayoutCell, LayoutSpec};
pub use selection::{ComposeStrategy, Selection};
pub use store::{BookOptions, BookStore};

// Re-export metadata types so downstream crates need a single import.
pub use tally_types::{EntryId, EntryKey, LayoutKind, TypeTag};
