//! Foundation types for the tally aggregate store.
//!
//! Every booked aggregate is described by an [`EntryKey`]: where it lives
//! (`path` + `name`), what value type it holds ([`TypeTag`]), how its
//! instances are laid out in memory ([`LayoutKind`]), and the dense
//! [`EntryId`] the registry assigned to it.
//!
//! # Key Types
//!
//! - [`EntryKey`]: identity and metadata of one booked aggregate
//! - [`EntryId`]: arena index plus generation, stable for a store's lifetime
//! - [`KeyHash`]: BLAKE3 hash of a `(path, name)` pair, used as index key
//! - [`LayoutKind`]: Single, ReplicatedCopies or SharedBuffered
//! - [`TypeTag`]: runtime tag of an aggregate's value type

pub mod error;
pub mod id;
pub mod key;
pub mod layout;
pub mod names;
pub mod type_tag;

pub use error::{TypeError, TypeResult};
pub use id::{EntryId, KeyHash};
pub use key::EntryKey;
pub use layout::LayoutKind;
pub use names::{normalize_path, path_components, validate_name};
pub use type_tag::TypeTag;
