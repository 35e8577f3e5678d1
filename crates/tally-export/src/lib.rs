//! Export sinks for merged aggregates.
//!
//! An [`Exporter`] consumes a [`Selection`](tally_store::Selection) and
//! writes each live entry's merged value somewhere. [`export_on_exit`] is
//! the end-of-run drain over every entry booked with `store_on_exit`.

pub mod directory;
pub mod error;
pub mod exporter;
pub mod memory;

pub use directory::{DirectoryExporter, ExportFormat};
pub use error::{ExportError, ExportResult};
pub use exporter::{export_on_exit, ExportReport, Exporter};
pub use memory::MemoryExporter;
