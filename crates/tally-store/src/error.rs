use std::thread::ThreadId;

use tally_types::{LayoutKind, TypeError};

/// Reasons a layout request cannot be turned into storage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    /// A replicated layout needs at least one instance.
    #[error("replicated layout requires at least one instance")]
    ZeroInstances,

    /// A buffered layout needs room for at least one pending fill.
    #[error("buffer capacity must be at least 1")]
    ZeroCapacity,
}

/// Errors from booking, handle acquisition and queries.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A registry mutation was attempted off the construction thread.
    #[error("{operation} of {target} called from thread {current:?}, but the store belongs to {owner:?}")]
    WrongThread {
        operation: &'static str,
        target: String,
        owner: ThreadId,
        current: ThreadId,
    },

    /// `(path, name)` is already booked with another type or layout.
    #[error(
        "conflicting booking for {path}{name}: booked as ({existing_type}, {existing_layout} x{existing_instances}), \
         requested ({requested_type}, {requested_layout} x{requested_instances})"
    )]
    ConflictingBooking {
        path: String,
        name: String,
        existing_type: &'static str,
        existing_layout: LayoutKind,
        existing_instances: usize,
        requested_type: &'static str,
        requested_layout: LayoutKind,
        requested_instances: usize,
    },

    /// A handle was requested for a value type the entry does not hold.
    #[error("type mismatch for {path}{name}: entry holds {expected}, requested {requested}")]
    TypeMismatch {
        path: String,
        name: String,
        expected: &'static str,
        requested: &'static str,
    },

    /// A slot or selection position is outside its valid range.
    #[error("{what} index {index} out of range (len {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    /// The entry was removed from the store; the handle or id is stale.
    #[error("value removed: {entry}")]
    EntryRemoved { entry: String },

    /// A query required exactly one entry.
    #[error("expected exactly one entry matching {condition}, found {count}")]
    NoMatch { condition: String, count: usize },

    /// The layout request was rejected at booking.
    #[error("invalid {layout} layout for {path}{name}: {source}")]
    InvalidLayout {
        path: String,
        name: String,
        layout: LayoutKind,
        #[source]
        source: LayoutError,
    },

    /// A condition regex failed to compile.
    #[error("invalid regex: {0}")]
    InvalidRegex(#[from] regex::Error),

    /// The path or name failed validation.
    #[error(transparent)]
    Key(#[from] TypeError),

    /// A merged snapshot could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
